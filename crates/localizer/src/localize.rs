//! Download-and-store of remote assets under a storage root

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use fileserver::{public_asset_url, StorageRoot};
use futures::future::try_join_all;
use uuid::Uuid;

use crate::download::{Download, Downloader};
use crate::extension::{mime_to_extension, resolve_extension};

/// Extra leading segment used for assets stored in the long-lived public root
pub const PUBLIC_PARTITION: &str = "generated";

/// Kind of media being localized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Images,
    Videos,
}

impl AssetType {
    /// Directory name for this asset type
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Images => "images",
            AssetType::Videos => "videos",
        }
    }

    /// Extension used when neither the response nor the URL names one
    pub fn fallback_extension(&self) -> &'static str {
        match self {
            AssetType::Images => "png",
            AssetType::Videos => "mp4",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "images" => Ok(AssetType::Images),
            "videos" => Ok(AssetType::Videos),
            _ => Err(format!("Unknown asset type: {}", s)),
        }
    }
}

/// A remote asset persisted on local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedAsset {
    /// Absolute path of the written file
    pub output_path: PathBuf,
    /// Posix-style path relative to the storage root
    pub relative_path: String,
    /// MIME type of the stored content
    pub content_type: String,
}

/// Build the `<asset type>/<yyyyMMdd>/<id>.<ext>` partition key
pub fn partition_key(asset_type: AssetType, date: NaiveDate, id: &str, ext: &str) -> String {
    format!("{}/{}/{}.{}", asset_type, date.format("%Y%m%d"), id, ext)
}

/// Downloads remote assets into a storage root
#[derive(Clone)]
pub struct Localizer {
    downloader: Downloader,
    root: StorageRoot,
    partition: Option<String>,
}

impl Localizer {
    /// Create a localizer writing directly under `root`
    pub fn new(downloader: Downloader, root: StorageRoot) -> Self {
        Self {
            downloader,
            root,
            partition: None,
        }
    }

    /// Create a localizer for the long-lived public root (`<root>/generated/...`)
    pub fn public(downloader: Downloader, root: StorageRoot) -> Self {
        Self {
            downloader,
            root,
            partition: Some(PUBLIC_PARTITION.to_string()),
        }
    }

    /// Get the storage root
    pub fn root(&self) -> &StorageRoot {
        &self.root
    }

    /// Download `remote_url` and store it under the root
    ///
    /// # Errors
    /// * `DownloadFailed` when the fetch fails or times out
    /// * `Storage` / `Io` when the file cannot be written
    pub async fn localize(
        &self,
        remote_url: &str,
        asset_type: AssetType,
    ) -> crate::Result<LocalizedAsset> {
        let download = self.downloader.fetch(remote_url).await?;
        let asset = self.store(remote_url, asset_type, download).await?;

        tracing::info!(
            "asset localized: {} -> {}",
            remote_url,
            asset.output_path.display()
        );
        Ok(asset)
    }

    /// Localize every URL concurrently, preserving input order
    ///
    /// Fails as a whole if any single download fails.
    pub async fn localize_all(
        &self,
        remote_urls: &[String],
        asset_type: AssetType,
    ) -> crate::Result<Vec<LocalizedAsset>> {
        try_join_all(
            remote_urls
                .iter()
                .map(|url| self.localize(url, asset_type)),
        )
        .await
    }

    /// Localize and return a shareable `<base>/public/<relative path>` URL
    pub async fn localize_to_url(
        &self,
        remote_url: &str,
        asset_type: AssetType,
        base_url: &str,
    ) -> crate::Result<String> {
        let asset = self.localize(remote_url, asset_type).await?;
        Ok(public_asset_url(base_url, &asset.relative_path))
    }

    /// Batch form of [`Localizer::localize_to_url`], preserving input order
    pub async fn localize_all_to_urls(
        &self,
        remote_urls: &[String],
        asset_type: AssetType,
        base_url: &str,
    ) -> crate::Result<Vec<String>> {
        let assets = self.localize_all(remote_urls, asset_type).await?;
        Ok(assets
            .iter()
            .map(|asset| public_asset_url(base_url, &asset.relative_path))
            .collect())
    }

    async fn store(
        &self,
        remote_url: &str,
        asset_type: AssetType,
        download: Download,
    ) -> crate::Result<LocalizedAsset> {
        let ext = resolve_extension(
            remote_url,
            download.content_type.as_deref(),
            asset_type.fallback_extension(),
        );
        let id = Uuid::new_v4().simple().to_string();
        let key = partition_key(asset_type, Utc::now().date_naive(), &id, &ext);
        let relative_path = match &self.partition {
            Some(partition) => format!("{}/{}", partition, key),
            None => key,
        };

        let output_path = self.root.resolve_decoded(&relative_path)?;
        let staging_path = self
            .root
            .resolve_decoded(&staging_name(&relative_path))?;

        if let Some(dir) = output_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        write_atomically(&staging_path, &output_path, &download.bytes).await?;

        // A reported type is kept only when it names a known media type
        let content_type = download
            .content_type
            .as_deref()
            .filter(|ct| mime_to_extension(ct).is_some())
            .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .unwrap_or_else(|| {
                mime_guess::from_ext(&ext)
                    .first_or_octet_stream()
                    .to_string()
            });

        Ok(LocalizedAsset {
            output_path,
            relative_path,
            content_type,
        })
    }
}

/// Hidden sibling the payload is written to before being renamed into place
fn staging_name(relative_path: &str) -> String {
    match relative_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/.{}.part", dir, file),
        None => format!(".{}.part", relative_path),
    }
}

/// Write through a staging file so a reader never sees a partial asset and an
/// existing file at `target` is replaced whole
async fn write_atomically(staging: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let written = match tokio::fs::write(staging, bytes).await {
        Ok(()) => tokio::fs::rename(staging, target).await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        let _ = tokio::fs::remove_file(staging).await;
    }
    written
}
