//! Localization of provider-hosted media
//!
//! Downloads remote images and videos, picks a file extension, and writes
//! them under a storage root using an `<asset type>/<yyyyMMdd>/<id>.<ext>`
//! partition so concurrent downloads never collide.

pub mod download;
mod error;
pub mod extension;
mod localize;

pub use download::{Download, Downloader, DOWNLOAD_TIMEOUT};
pub use error::LocalizeError;
pub use localize::{partition_key, AssetType, LocalizedAsset, Localizer, PUBLIC_PARTITION};

/// Result type alias for localizer operations
pub type Result<T> = std::result::Result<T, LocalizeError>;
