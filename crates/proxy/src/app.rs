//! Main HTTP server assembly

use axum::{http::HeaderMap, routing::get, Json, Router};
use fileserver::{public_router, StorageRoot};
use localizer::{AssetType, Downloader, Localizer};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;

/// Localizes generation results into the public directory for HTTP callers
#[derive(Clone)]
pub struct PublicAssets {
    localizer: Localizer,
    config: Config,
}

impl PublicAssets {
    /// Open the configured public directory, creating it if missing
    pub async fn open(config: Config, downloader: Downloader) -> crate::Result<Self> {
        tokio::fs::create_dir_all(&config.public_dir_path).await?;
        let root = StorageRoot::open(&config.public_dir_path)?;
        Ok(Self {
            localizer: Localizer::public(downloader, root),
            config,
        })
    }

    /// Get the public storage root
    pub fn root(&self) -> &StorageRoot {
        self.localizer.root()
    }

    /// Replace provider URLs with `/public/` URLs reachable the way the caller reached us
    pub async fn localize_urls(
        &self,
        headers: &HeaderMap,
        remote_urls: &[String],
        asset_type: AssetType,
    ) -> localizer::Result<Vec<String>> {
        let base_url = self.config.public_base_url(headers);
        self.localizer
            .localize_all_to_urls(remote_urls, asset_type, &base_url)
            .await
    }
}

/// Create the main router: health probe plus the `/public/` file handler
pub fn router(assets: &PublicAssets) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(public_router(assets.root().clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Bind the configured address and serve until ctrl-c
pub async fn serve(config: Config) -> crate::Result<()> {
    let assets = PublicAssets::open(config.clone(), Downloader::new()?).await?;
    let app = router(&assets);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(
        "Server listening on {} serving {}",
        listener.local_addr()?,
        assets.root().path().display()
    );
    if config.sessions.is_empty() {
        tracing::warn!("No session IDs configured; generation tools will fail");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, HeaderValue, Request, StatusCode},
    };
    use std::collections::HashMap;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_config(dir: &TempDir) -> Config {
        let vars = HashMap::from([
            (
                "PUBLIC_DIR_PATH".to_string(),
                dir.path().join("public").display().to_string(),
            ),
            ("URL_PREFIX".to_string(), "/jimeng".to_string()),
        ]);
        Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    async fn spawn_origin() -> String {
        let app = Router::new().route(
            "/out.webp",
            get(|| async { ([(header::CONTENT_TYPE, "image/webp")], "webp") }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let assets = PublicAssets::open(test_config(&dir), Downloader::new().unwrap())
            .await
            .unwrap();

        let response = router(&assets)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_open_creates_public_dir() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        assert!(!config.public_dir_path.exists());

        PublicAssets::open(config.clone(), Downloader::new().unwrap())
            .await
            .unwrap();
        assert!(config.public_dir_path.is_dir());
    }

    #[tokio::test]
    async fn test_localized_url_is_served_by_router() {
        let origin = spawn_origin().await;
        let dir = TempDir::new().unwrap();
        let assets = PublicAssets::open(test_config(&dir), Downloader::new().unwrap())
            .await
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-host", HeaderValue::from_static("api.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));

        let urls = assets
            .localize_urls(&headers, &[format!("{}/out.webp", origin)], AssetType::Images)
            .await
            .unwrap();
        let prefix = "https://api.example.com/jimeng/public/generated/images/";
        assert!(urls[0].starts_with(prefix), "{}", urls[0]);
        assert!(urls[0].ends_with(".webp"));

        let path = &urls[0]["https://api.example.com/jimeng".len()..];
        let response = router(&assets)
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"webp");
    }

    #[tokio::test]
    async fn test_public_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let assets = PublicAssets::open(test_config(&dir), Downloader::new().unwrap())
            .await
            .unwrap();
        std::fs::write(dir.path().join("secret.txt"), "secret").unwrap();

        let response = router(&assets)
            .oneshot(
                Request::get("/public/..%2Fsecret.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
