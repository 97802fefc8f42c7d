//! Ephemeral loopback static server with range request support
//!
//! Started lazily on first use, bound to an OS-assigned port on 127.0.0.1,
//! and serves files from a private temp root under `/assets/`.

use std::io::SeekFrom;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, OnceCell};
use tokio_util::io::ReaderStream;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::FileServerError;
use crate::guard::StorageRoot;
use crate::public::{content_type_for, open_regular_file, IMMUTABLE_CACHE_CONTROL};
use crate::range::{content_range, unsatisfied_range, RangeOutcome};
use crate::state::{ServerState, ASSET_ROUTE_PREFIX};

/// Directory name used under the OS temp dir for the process-wide server
pub const APP_NAMESPACE: &str = "jimeng-free-api-mcp";

static GLOBAL_SERVER: OnceLock<EphemeralServer> = OnceLock::new();

/// A started listener and the channel that stops it
struct Running {
    state: ServerState,
    shutdown_tx: watch::Sender<bool>,
}

/// Lazily started static server for locally fetchable asset URLs
///
/// `ensure_started` is single-flight: concurrent first callers all wait on
/// the same bind and observe the same port. Once ready the server stays
/// ready for the life of the value.
pub struct EphemeralServer {
    root_dir: PathBuf,
    running: OnceCell<Running>,
}

impl EphemeralServer {
    /// Create an unstarted server that will serve files under `root_dir`
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            running: OnceCell::new(),
        }
    }

    /// Get the process-wide server rooted at `<temp dir>/jimeng-free-api-mcp`
    pub fn global() -> &'static EphemeralServer {
        GLOBAL_SERVER.get_or_init(|| EphemeralServer::new(std::env::temp_dir().join(APP_NAMESPACE)))
    }

    /// Directory the server was configured with (not canonicalized)
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the ready state, if the server has started
    pub fn state(&self) -> Option<&ServerState> {
        self.running.get().map(|running| &running.state)
    }

    /// Get the bound port, if the server has started
    pub fn port(&self) -> Option<u16> {
        self.state().map(ServerState::port)
    }

    /// Start the server if it is not running yet and return its state
    pub async fn ensure_started(&self) -> crate::Result<&ServerState> {
        let running = self.running.get_or_try_init(|| self.start()).await?;
        Ok(&running.state)
    }

    async fn start(&self) -> crate::Result<Running> {
        tokio::fs::create_dir_all(&self.root_dir).await?;
        let root = StorageRoot::from_canonical(
            tokio::fs::canonicalize(&self.root_dir).await?,
            &self.root_dir,
        );

        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .map_err(FileServerError::Bind)?;
        let addr = listener.local_addr().map_err(FileServerError::Bind)?;

        let state = ServerState::new(addr.port(), root);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let router = asset_router(state.clone());
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.wait_for(|stopped| *stopped).await;
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!("Ephemeral static server stopped with error: {}", e);
            }
            tracing::info!("Ephemeral static server on {} stopped", addr);
        });

        tracing::info!(
            "Ephemeral static server started at http://{} serving {}",
            addr,
            state.root().path().display()
        );

        Ok(Running { state, shutdown_tx })
    }

    /// Build a fetchable URL for a file stored under the server root
    ///
    /// Fails with `ServerNotReady` before `ensure_started` has completed.
    pub fn to_local_url(&self, absolute: &Path) -> crate::Result<String> {
        self.state()
            .ok_or(FileServerError::ServerNotReady)?
            .local_url(absolute)
    }

    /// Stop accepting connections
    ///
    /// The state stays bound; this exists so tests can release the listener.
    pub fn shutdown(&self) {
        if let Some(running) = self.running.get() {
            let _ = running.shutdown_tx.send(true);
        }
    }
}

impl Drop for EphemeralServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Create the router for the ephemeral server
pub fn asset_router(state: ServerState) -> Router {
    serving_layers(
        Router::new()
            .route("/assets/*path", get(serve_asset))
            .fallback(not_found)
            .with_state(state),
    )
}

/// Panics become 500 responses as long as no headers have gone out
fn serving_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Serve an asset with range request support
async fn serve_asset(
    State(state): State<ServerState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, FileServerError> {
    let raw = uri
        .path()
        .strip_prefix(ASSET_ROUTE_PREFIX)
        .ok_or_else(|| FileServerError::NotFound {
            path: uri.path().to_string(),
        })?;

    let file_path = state.root().resolve(raw)?;
    let (mut file, file_size) = open_regular_file(&file_path).await?;
    let mime_type = content_type_for(&file_path);

    let range = headers.get(header::RANGE).and_then(|value| value.to_str().ok());
    let response = match RangeOutcome::evaluate(range, file_size) {
        RangeOutcome::Full => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime_type)
            .header(header::CONTENT_LENGTH, file_size)
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL)
            .body(Body::from_stream(ReaderStream::new(file))),

        RangeOutcome::Partial { start, end } => {
            let content_length = end - start + 1;
            file.seek(SeekFrom::Start(start)).await?;

            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, mime_type)
                .header(header::CONTENT_LENGTH, content_length)
                .header(header::CONTENT_RANGE, content_range(start, end, file_size))
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL)
                .body(Body::from_stream(ReaderStream::new(file.take(content_length))))
        }

        RangeOutcome::Unsatisfiable => {
            tracing::debug!(
                "Unsatisfiable range {:?} for {} ({} bytes)",
                range,
                file_path.display(),
                file_size
            );
            Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, unsatisfied_range(file_size))
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::empty())
        }
    };

    response.map_err(|e| FileServerError::Internal(format!("Failed to build response: {}", e)))
}
