//! Error types shared by both serving paths

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// File server error type
#[derive(Error, Debug)]
pub enum FileServerError {
    /// The requested path resolves outside of its storage root
    #[error("path escapes storage root: {path}")]
    PathTraversal { path: String },

    #[error("file path is empty")]
    EmptyPath,

    #[error("file not found: {path}")]
    NotFound { path: String },

    /// A local URL was requested before the ephemeral server finished starting
    #[error("ephemeral static server is not ready")]
    ServerNotReady,

    #[error("failed to bind static server: {0}")]
    Bind(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl FileServerError {
    /// HTTP status this error maps to at the serving boundary
    pub fn status(&self) -> StatusCode {
        match self {
            FileServerError::PathTraversal { .. } | FileServerError::EmptyPath => {
                StatusCode::BAD_REQUEST
            }
            FileServerError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            FileServerError::PathTraversal { .. } => "Invalid path".to_string(),
            FileServerError::NotFound { .. } => "Not Found".to_string(),
            FileServerError::EmptyPath => self.to_string(),
            other => {
                tracing::error!("Static file request failed: {}", other);
                "Internal Server Error".to_string()
            }
        };

        (status, message).into_response()
    }
}
