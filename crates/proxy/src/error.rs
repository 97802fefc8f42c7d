//! Proxy error types

use fileserver::FileServerError;
use localizer::LocalizeError;
use thiserror::Error;

use crate::config::ConfigError;

/// Error raised while starting or running the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] FileServerError),

    #[error(transparent)]
    Localize(#[from] LocalizeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
