//! Bound state of the ephemeral static server

use std::path::Path;

use crate::guard::StorageRoot;

/// Reserved top-level segment every ephemeral asset URL starts with
pub const ASSET_ROUTE_PREFIX: &str = "/assets/";

/// State of a ready ephemeral server, shared with request handlers
#[derive(Debug, Clone)]
pub struct ServerState {
    /// OS-assigned loopback port
    port: u16,
    /// Canonical root all served files live under
    root: StorageRoot,
}

impl ServerState {
    /// Create state for a listener bound to `port` serving `root`
    pub fn new(port: u16, root: StorageRoot) -> Self {
        Self { port, root }
    }

    /// Get the bound port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the storage root
    pub fn root(&self) -> &StorageRoot {
        &self.root
    }

    /// Base URL of the listener, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Build a fetchable URL for a file under the root
    ///
    /// Containment is re-checked and every path segment is percent-encoded on
    /// its own so that encoded separators survive a round trip.
    pub fn local_url(&self, absolute: &Path) -> crate::Result<String> {
        let relative = self.root.relative_path(absolute)?;
        let encoded = relative
            .components()
            .map(|c| urlencoding::encode(&c.as_os_str().to_string_lossy()).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(format!("{}{}{}", self.base_url(), ASSET_ROUTE_PREFIX, encoded))
    }
}
