//! Generation proxy surfaces
//!
//! Wires the file server and localizer crates into the main HTTP server and
//! into the MCP tool bridge.

pub mod app;
pub mod config;
mod error;
pub mod mcp;

pub use config::{Config, ConfigError, SessionPool};
pub use error::ProxyError;
pub use mcp::{AssetTool, AssetToolBridge, ToolOutput, Upstream};

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;
