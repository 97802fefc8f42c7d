//! Tool-call bridge that hands generated media to agents as loopback URLs

use async_trait::async_trait;
use fileserver::EphemeralServer;
use localizer::{AssetType, Downloader, Localizer};
use serde_json::{json, Value};

use crate::config::SessionPool;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Generation backend producing remote media URLs
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Run `tool` with `args` on behalf of `session_id`
    async fn generate(
        &self,
        tool: &str,
        args: &Value,
        session_id: &str,
    ) -> Result<Vec<String>, BoxError>;
}

/// Tools whose output is localized before being returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetTool {
    GenerateImage,
    ComposeImages,
    GenerateVideo,
    GenerateSeedance,
}

impl AssetTool {
    pub const ALL: [AssetTool; 4] = [
        AssetTool::GenerateImage,
        AssetTool::ComposeImages,
        AssetTool::GenerateVideo,
        AssetTool::GenerateSeedance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AssetTool::GenerateImage => "generate_image",
            AssetTool::ComposeImages => "compose_images",
            AssetTool::GenerateVideo => "generate_video",
            AssetTool::GenerateSeedance => "generate_seedance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn asset_type(&self) -> AssetType {
        match self {
            AssetTool::GenerateImage | AssetTool::ComposeImages => AssetType::Images,
            AssetTool::GenerateVideo | AssetTool::GenerateSeedance => AssetType::Videos,
        }
    }
}

/// Text result of a tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    /// Render as an MCP `CallToolResult`
    pub fn to_json(&self) -> Value {
        let mut result = json!({
            "content": [{ "type": "text", "text": self.text }],
        });
        if self.is_error {
            result["isError"] = Value::Bool(true);
        }
        result
    }
}

/// Runs asset tools and rewrites their remote URLs to the ephemeral server
pub struct AssetToolBridge<'a, U> {
    upstream: U,
    sessions: SessionPool,
    server: &'a EphemeralServer,
    downloader: Downloader,
}

impl<U: Upstream> AssetToolBridge<'static, U> {
    /// Bridge backed by the process-wide ephemeral server
    pub fn global(upstream: U, sessions: SessionPool) -> localizer::Result<Self> {
        Ok(Self::new(
            upstream,
            sessions,
            EphemeralServer::global(),
            Downloader::new()?,
        ))
    }
}

impl<'a, U: Upstream> AssetToolBridge<'a, U> {
    pub fn new(
        upstream: U,
        sessions: SessionPool,
        server: &'a EphemeralServer,
        downloader: Downloader,
    ) -> Self {
        Self {
            upstream,
            sessions,
            server,
            downloader,
        }
    }

    /// Execute a tool call, turning every failure into an error result
    pub async fn call_tool(&self, name: &str, args: &Value) -> ToolOutput {
        match self.try_call(name, args).await {
            Ok(text) => ToolOutput {
                text,
                is_error: false,
            },
            Err(e) => {
                tracing::error!("Tool call {} failed: {}", name, e);
                ToolOutput {
                    text: format!("Error: {}", e),
                    is_error: true,
                }
            }
        }
    }

    async fn try_call(&self, name: &str, args: &Value) -> Result<String, BoxError> {
        let state = self.server.ensure_started().await?;

        let tool = AssetTool::from_name(name).ok_or_else(|| format!("Unknown tool: {}", name))?;
        if tool == AssetTool::ComposeImages {
            let has_images = args
                .get("images")
                .and_then(Value::as_array)
                .is_some_and(|images| !images.is_empty());
            if !has_images {
                return Err("images must be a non-empty array".into());
            }
        }

        let session_id = self
            .sessions
            .pick()
            .ok_or("No session ID configured. Set JIMENG_SESSION_ID")?;
        let remote_urls = self.upstream.generate(name, args, session_id).await?;

        let localizer = Localizer::new(self.downloader.clone(), state.root().clone());
        let body = match tool.asset_type() {
            AssetType::Images => {
                let assets = localizer
                    .localize_all(&remote_urls, AssetType::Images)
                    .await?;
                let mut urls = Vec::with_capacity(assets.len());
                let mut local_paths = Vec::with_capacity(assets.len());
                for asset in &assets {
                    urls.push(self.server.to_local_url(&asset.output_path)?);
                    local_paths.push(asset.output_path.display().to_string());
                }
                json!({ "urls": urls, "local_paths": local_paths })
            }
            AssetType::Videos => {
                let remote = remote_urls
                    .first()
                    .ok_or("Upstream returned no video URL")?;
                let asset = localizer.localize(remote, AssetType::Videos).await?;
                json!({
                    "url": self.server.to_local_url(&asset.output_path)?,
                    "local_path": asset.output_path.display().to_string(),
                })
            }
        };

        Ok(serde_json::to_string_pretty(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FixedUpstream {
        urls: Vec<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Upstream for FixedUpstream {
        async fn generate(
            &self,
            _tool: &str,
            _args: &Value,
            session_id: &str,
        ) -> Result<Vec<String>, BoxError> {
            assert_eq!(session_id, "session-1");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.urls.clone())
        }
    }

    struct FailingUpstream;

    #[async_trait]
    impl Upstream for FailingUpstream {
        async fn generate(&self, _: &str, _: &Value, _: &str) -> Result<Vec<String>, BoxError> {
            Err("generation rejected".into())
        }
    }

    async fn spawn_origin() -> String {
        let app = Router::new()
            .route(
                "/a.png",
                get(|| async { ([(header::CONTENT_TYPE, "image/png")], "first") }),
            )
            .route(
                "/b.jpg",
                get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], "second") }),
            )
            .route(
                "/clip.mp4",
                get(|| async { ([(header::CONTENT_TYPE, "video/mp4")], "video") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    fn bridge<'a, U: Upstream>(server: &'a EphemeralServer, upstream: U) -> AssetToolBridge<'a, U> {
        AssetToolBridge::new(
            upstream,
            SessionPool::parse("session-1"),
            server,
            Downloader::new().unwrap(),
        )
    }

    fn fixed(urls: Vec<String>) -> (FixedUpstream, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let upstream = FixedUpstream {
            urls,
            calls: calls.clone(),
        };
        (upstream, calls)
    }

    #[test]
    fn test_tool_names() {
        for tool in AssetTool::ALL {
            assert_eq!(AssetTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(AssetTool::from_name("get_points"), None);
        assert_eq!(AssetTool::GenerateSeedance.asset_type(), AssetType::Videos);
    }

    #[test]
    fn test_tool_output_json() {
        let ok = ToolOutput {
            text: "{}".to_string(),
            is_error: false,
        };
        assert_eq!(ok.to_json(), json!({ "content": [{ "type": "text", "text": "{}" }] }));

        let failed = ToolOutput {
            text: "Error: boom".to_string(),
            is_error: true,
        };
        assert_eq!(failed.to_json()["isError"], json!(true));
    }

    #[test]
    fn test_global_bridge_uses_process_server() {
        let (upstream, _) = fixed(Vec::new());
        let bridge = AssetToolBridge::global(upstream, SessionPool::parse("session-1")).unwrap();

        assert!(std::ptr::eq(bridge.server, EphemeralServer::global()));
        assert_eq!(bridge.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_image_returns_local_urls_in_order() {
        let origin = spawn_origin().await;
        let dir = TempDir::new().unwrap();
        let server = EphemeralServer::new(dir.path());
        let (upstream, _) = fixed(vec![format!("{}/a.png", origin), format!("{}/b.jpg", origin)]);

        let output = bridge(&server, upstream)
            .call_tool("generate_image", &json!({ "prompt": "cat" }))
            .await;
        assert!(!output.is_error, "{}", output.text);

        let body: Value = serde_json::from_str(&output.text).unwrap();
        let urls = body["urls"].as_array().unwrap();
        let paths = body["local_paths"].as_array().unwrap();
        assert_eq!(urls.len(), 2);

        let base = format!("{}/assets/images/", server.state().unwrap().base_url());
        assert!(urls[0].as_str().unwrap().starts_with(&base));
        assert!(urls[0].as_str().unwrap().ends_with(".png"));
        assert!(urls[1].as_str().unwrap().ends_with(".jpg"));
        assert_eq!(std::fs::read(paths[0].as_str().unwrap()).unwrap(), b"first");
        assert_eq!(std::fs::read(paths[1].as_str().unwrap()).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_generate_video_returns_single_url() {
        let origin = spawn_origin().await;
        let dir = TempDir::new().unwrap();
        let server = EphemeralServer::new(dir.path());
        let (upstream, _) = fixed(vec![
            format!("{}/clip.mp4", origin),
            format!("{}/a.png", origin),
        ]);

        let output = bridge(&server, upstream)
            .call_tool("generate_video", &json!({ "prompt": "waves" }))
            .await;
        assert!(!output.is_error, "{}", output.text);

        let body: Value = serde_json::from_str(&output.text).unwrap();
        let url = body["url"].as_str().unwrap();
        assert!(url.contains("/assets/videos/"));
        assert!(url.ends_with(".mp4"));
        assert_eq!(std::fs::read(body["local_path"].as_str().unwrap()).unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_compose_images_requires_images() {
        let dir = TempDir::new().unwrap();
        let server = EphemeralServer::new(dir.path());
        let (upstream, calls) = fixed(Vec::new());
        let bridge = bridge(&server, upstream);

        for args in [json!({}), json!({ "images": [] }), json!({ "images": "a.png" })] {
            let output = bridge.call_tool("compose_images", &args).await;
            assert!(output.is_error);
            assert!(output.text.starts_with("Error: "), "{}", output.text);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_session_is_an_error_result() {
        let dir = TempDir::new().unwrap();
        let server = EphemeralServer::new(dir.path());
        let (upstream, calls) = fixed(Vec::new());
        let bridge = AssetToolBridge::new(
            upstream,
            SessionPool::default(),
            &server,
            Downloader::new().unwrap(),
        );

        let output = bridge.call_tool("generate_image", &json!({})).await;
        assert!(output.is_error);
        assert!(output.text.contains("No session ID configured"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dir = TempDir::new().unwrap();
        let server = EphemeralServer::new(dir.path());
        let (upstream, _) = fixed(Vec::new());

        let output = bridge(&server, upstream).call_tool("get_points", &json!({})).await;
        assert_eq!(
            output,
            ToolOutput {
                text: "Error: Unknown tool: get_points".to_string(),
                is_error: true,
            }
        );
    }

    #[tokio::test]
    async fn test_upstream_and_download_failures() {
        let origin = spawn_origin().await;
        let dir = TempDir::new().unwrap();
        let server = EphemeralServer::new(dir.path());

        let output = bridge(&server, FailingUpstream)
            .call_tool("generate_image", &json!({}))
            .await;
        assert_eq!(output.text, "Error: generation rejected");
        assert!(output.is_error);

        let missing = format!("{}/gone.png", origin);
        let (upstream, _) = fixed(vec![format!("{}/a.png", origin), missing.clone()]);
        let output = bridge(&server, upstream)
            .call_tool("generate_image", &json!({}))
            .await;
        assert!(output.is_error);
        assert!(output.text.contains(&missing), "{}", output.text);
    }
}
