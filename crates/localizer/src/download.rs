//! Raw byte downloads of provider-hosted media

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::error::LocalizeError;

/// Upper bound on a single asset download
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// A fetched remote resource
#[derive(Debug, Clone)]
pub struct Download {
    /// Response body
    pub bytes: Vec<u8>,
    /// `Content-Type` reported by the remote host, if any
    pub content_type: Option<String>,
}

/// HTTP client wrapper used to fetch remote assets
#[derive(Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Create a downloader with the default 120 second timeout
    pub fn new() -> crate::Result<Self> {
        Self::with_timeout(DOWNLOAD_TIMEOUT)
    }

    /// Create a downloader with a custom timeout
    pub fn with_timeout(timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LocalizeError::Client)?;
        Ok(Self { client })
    }

    /// Fetch `url` as raw bytes
    ///
    /// # Errors
    /// Returns `DownloadFailed` on connection errors, timeouts and non-success statuses
    pub async fn fetch(&self, url: &str) -> crate::Result<Download> {
        let failed = |source| LocalizeError::DownloadFailed {
            url: url.to_string(),
            source,
        };

        tracing::debug!("Downloading remote asset: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                tracing::error!("Download failed for {}: {}", url, e);
                failed(e)
            })?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| {
            tracing::error!("Reading download body failed for {}: {}", url, e);
            failed(e)
        })?;

        Ok(Download {
            bytes: Vec::from(bytes),
            content_type,
        })
    }
}
