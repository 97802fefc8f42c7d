//! Process configuration, read once at startup

use std::path::PathBuf;

use axum::http::HeaderMap;
use fileserver::{fallback_base_url, resolve_base_url};
use rand::seq::SliceRandom;
use thiserror::Error;

/// Default HTTP port of the main server
pub const DEFAULT_PORT: u16 = 5100;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("cannot determine working directory: {0}")]
    WorkingDir(#[source] std::io::Error),
}

/// Provider session ids the proxy may use for upstream calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPool {
    ids: Vec<String>,
}

impl SessionPool {
    /// Parse a comma-separated list, dropping blank entries
    pub fn parse(raw: &str) -> Self {
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        Self { ids }
    }

    /// Get count of configured sessions
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Pick a session id uniformly at random
    pub fn pick(&self) -> Option<&str> {
        self.ids.choose(&mut rand::thread_rng()).map(String::as_str)
    }
}

/// Immutable process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface the main HTTP server binds to
    pub host: String,
    /// Port the main HTTP server binds to
    pub port: u16,
    /// Absolute path of the long-lived public directory
    pub public_dir_path: PathBuf,
    /// Static URL of the public directory, used when requests carry no host
    pub public_dir_url: String,
    /// Prefix the service is mounted under, e.g. `/jimeng`
    pub url_prefix: String,
    /// Session ids for upstream generation calls
    pub sessions: SessionPool,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let public_dir_path = match var("PUBLIC_DIR_PATH") {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.is_absolute() {
                    return Err(ConfigError::Invalid {
                        name: "PUBLIC_DIR_PATH",
                        value: path.display().to_string(),
                    });
                }
                path
            }
            None => std::env::current_dir()
                .map_err(ConfigError::WorkingDir)?
                .join("public"),
        };

        let public_dir_url = var("PUBLIC_DIR_URL")
            .unwrap_or_else(|| format!("http://127.0.0.1:{}/public", port));
        let url_prefix = var("URL_PREFIX").unwrap_or_default();

        let sessions = var("JIMENG_SESSION_ID")
            .or_else(|| var("JIMENG_TOKEN"))
            .map(|raw| SessionPool::parse(&raw))
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            public_dir_path,
            public_dir_url,
            url_prefix,
            sessions,
        })
    }

    /// Base URL for public asset links, preferring what the caller reached us through
    pub fn public_base_url(&self, headers: &HeaderMap) -> String {
        resolve_base_url(headers, &self.url_prefix)
            .unwrap_or_else(|| fallback_base_url(&self.public_dir_url, &self.url_prefix))
    }
}
