//! Long-lived public directory handler mounted on the main HTTP server

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode, Uri},
    response::Response,
    routing::get,
    Router,
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::base_url::PUBLIC_ROUTE;
use crate::error::FileServerError;
use crate::guard::{decode_request_path, StorageRoot};

/// Cache policy for generated assets; every write lands on a fresh unique path
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Router serving `GET /public/<path>` from `root`
pub fn public_router(root: StorageRoot) -> Router {
    Router::new()
        .route("/public", get(serve_public))
        .route("/public/", get(serve_public))
        .route("/public/*path", get(serve_public))
        .with_state(Arc::new(root))
}

/// Serve a file from the public root
async fn serve_public(
    State(root): State<Arc<StorageRoot>>,
    uri: Uri,
) -> Result<Response, FileServerError> {
    let raw = uri
        .path()
        .strip_prefix(&format!("/{}", PUBLIC_ROUTE))
        .unwrap_or_default();
    open_public(&root, raw).await
}

/// Resolve `raw` under the public root and stream it back
pub async fn open_public(root: &StorageRoot, raw: &str) -> Result<Response, FileServerError> {
    let relative = decode_request_path(raw)?;
    if relative.is_empty() {
        return Err(FileServerError::EmptyPath);
    }

    let file_path = root.resolve_decoded(&relative)?;
    let (file, file_size) = open_regular_file(&file_path).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&file_path))
        .header(header::CONTENT_LENGTH, file_size)
        .header(header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| FileServerError::Internal(format!("Failed to build response: {}", e)))
}

/// Open an existing regular file, mapping absence to `NotFound`
pub(crate) async fn open_regular_file(path: &Path) -> Result<(File, u64), FileServerError> {
    let not_found = || FileServerError::NotFound {
        path: path.display().to_string(),
    };

    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Err(not_found());
    }

    let file = File::open(path).await?;
    Ok((file, metadata.len()))
}

/// MIME type inferred from the file extension
pub(crate) fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}
