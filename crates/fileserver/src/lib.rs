//! Static file serving for localized generation assets
//!
//! This crate provides the two serving paths for files written by the
//! localizer: a long-lived `/public/` handler mounted on the main HTTP server,
//! and an ephemeral loopback server with range request support used to hand
//! MCP callers fetchable URLs. Both resolve every path through [`StorageRoot`].

pub mod base_url;
mod error;
pub mod guard;
mod public;
pub mod range;
mod server;
mod state;

pub use base_url::{fallback_base_url, normalize_prefix, public_asset_url, resolve_base_url};
pub use error::FileServerError;
pub use guard::{resolve_contained, StorageRoot};
pub use public::{open_public, public_router, IMMUTABLE_CACHE_CONTROL};
pub use range::RangeOutcome;
pub use server::{asset_router, EphemeralServer, APP_NAMESPACE};
pub use state::{ServerState, ASSET_ROUTE_PREFIX};

/// Result type alias for file server operations
pub type Result<T> = std::result::Result<T, FileServerError>;
