//! Localizer error types

use fileserver::FileServerError;
use thiserror::Error;

/// Error raised while downloading or storing a remote asset
#[derive(Error, Debug)]
pub enum LocalizeError {
    /// The remote fetch failed, timed out or returned a non-success status
    #[error("failed to download {url}: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Storage(#[from] FileServerError),

    #[error("failed to write asset: {0}")]
    Io(#[from] std::io::Error),
}

impl LocalizeError {
    /// Remote URL of a failed download
    pub fn url(&self) -> Option<&str> {
        match self {
            LocalizeError::DownloadFailed { url, .. } => Some(url),
            _ => None,
        }
    }
}
