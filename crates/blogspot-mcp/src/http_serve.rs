//! HTTP transport for the MCP server.
//!
//! # Endpoints
//!
//! - `POST /mcp` - JSON-RPC request in, JSON-RPC response out
//!   (`202 Accepted` with an empty body for notifications)
//! - `GET /health` - liveness probe, never authenticated

use crate::dispatch::Dispatcher;
use crate::protocol::JsonRpcRequest;
use crate::transport::TransportError;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// State for the MCP HTTP server.
#[derive(Clone)]
pub struct McpHttpState {
    dispatcher: Arc<Dispatcher>,
    /// Optional API key for authentication.
    /// If set, clients must provide this key in the `X-API-Key` header
    /// or `Authorization: Bearer <key>` header.
    api_key: Option<String>,
}

impl McpHttpState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            api_key: None,
        }
    }

    /// Require an API key on `/mcp`. Empty keys are ignored.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Check if authentication is enabled.
    pub fn has_auth(&self) -> bool {
        self.api_key.is_some()
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Extract API key from request headers.
///
/// Supports both `X-API-Key` header and `Authorization: Bearer <key>` format.
fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key);
    }

    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(key) = auth.strip_prefix("Bearer ") {
            return Some(key.trim());
        }
    }

    None
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Middleware to validate API key.
async fn api_key_auth(
    State(state): State<McpHttpState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<serde_json::Value>)> {
    let Some(ref expected_key) = state.api_key else {
        return Ok(next.run(request).await);
    };

    match extract_api_key(request.headers()) {
        Some(key) if constant_time_eq(key.as_bytes(), expected_key.as_bytes()) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            warn!("Invalid API key provided for MCP endpoint");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid API key" })),
            ))
        }
        None => {
            warn!("Missing API key for MCP endpoint");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication required" })),
            ))
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the MCP HTTP router.
pub fn create_mcp_router(state: McpHttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mcp = Router::new().route("/mcp", post(mcp_message));
    let mcp = if state.has_auth() {
        info!("MCP API key authentication enabled");
        mcp.layer(axum::middleware::from_fn_with_state(
            state.clone(),
            api_key_auth,
        ))
    } else {
        mcp
    };

    Router::new()
        .route("/health", get(health))
        .merge(mcp)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve_http<S>(
    state: McpHttpState,
    addr: SocketAddr,
    shutdown: S,
) -> Result<(), TransportError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "MCP HTTP server listening");

    axum::serve(listener, create_mcp_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(state): State<McpHttpState>) -> impl IntoResponse {
    let info = state.dispatcher.info();
    Json(json!({
        "status": "ok",
        "name": info.name,
        "version": info.version,
    }))
}

async fn mcp_message(
    State(state): State<McpHttpState>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    debug!(method = %request.method, "Received MCP message");

    match state.dispatcher.handle_request(request).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::Value;
    use tower::ServiceExt;

    fn create_test_state() -> McpHttpState {
        McpHttpState::new(Arc::new(Dispatcher::new("test-server", "1.0.0")))
    }

    fn post_mcp() -> axum::http::request::Builder {
        HttpRequest::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const PING: &str = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;

    #[tokio::test]
    async fn test_post_request() {
        let router = create_mcp_router(create_test_state());
        let response = router
            .oneshot(post_mcp().body(Body::from(PING)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"], json!({}));
    }

    #[tokio::test]
    async fn test_post_notification_is_accepted() {
        let router = create_mcp_router(create_test_state());
        let note = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let response = router
            .oneshot(post_mcp().body(Body::from(note)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_mcp_router(create_test_state().with_api_key(Some("k".into())));
        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["name"], "test-server");
    }

    #[tokio::test]
    async fn test_api_key_required() {
        let state = create_test_state().with_api_key(Some("secret".into()));

        let response = create_mcp_router(state.clone())
            .oneshot(post_mcp().body(Body::from(PING)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = create_mcp_router(state.clone())
            .oneshot(
                post_mcp()
                    .header("x-api-key", "wrong")
                    .body(Body::from(PING))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = create_mcp_router(state)
            .oneshot(
                post_mcp()
                    .header("authorization", "Bearer secret")
                    .body(Body::from(PING))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_state_has_auth() {
        let state = create_test_state();
        assert!(!state.has_auth());
        assert!(!state.clone().with_api_key(Some(String::new())).has_auth());
        assert!(state.with_api_key(Some("test-secret".into())).has_auth());
    }

    #[test]
    fn test_extract_api_key_from_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "test-key".parse().unwrap());
        assert_eq!(extract_api_key(&headers), Some("test-key"));
    }

    #[test]
    fn test_extract_api_key_bearer_with_whitespace() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer   my-token  ".parse().unwrap());
        assert_eq!(extract_api_key(&headers), Some("my-token"));
    }

    #[test]
    fn test_extract_api_key_invalid_auth_format() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc123".parse().unwrap());
        assert_eq!(extract_api_key(&headers), None);
    }

    #[test]
    fn test_extract_api_key_x_api_key_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "key-from-header".parse().unwrap());
        headers.insert("authorization", "Bearer key-from-bearer".parse().unwrap());
        assert_eq!(extract_api_key(&headers), Some("key-from-header"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"test", b"test"));
        assert!(!constant_time_eq(b"test", b"wrong"));
        assert!(!constant_time_eq(b"test", b"test-longer"));
        assert!(constant_time_eq(b"", b""));
    }
}
