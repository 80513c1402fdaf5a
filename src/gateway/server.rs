//! HTTP server for the clinic-assistant Gateway.
//!
//! Serves the chat page and a small JSON API the page talks to.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::session::SessionInfo;
use super::{ChatReply, Gateway, HistoryEntry};
use crate::error::GatewayError;

const CHAT_PAGE: &str = include_str!("../../static/chat.html");

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::SessionError(m) => Self::new(StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", m),
            GatewayError::AgentError(m) => Self::new(StatusCode::BAD_GATEWAY, "AGENT_ERROR", m),
            GatewayError::ServerError(m) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR", m)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Shared server state.
pub struct ServerState {
    pub gateway: Gateway,

    /// Server version
    version: String,
}

impl ServerState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Build the application router.
pub fn router(state: Arc<ServerState>, cors: bool) -> Router {
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions", get(sessions_handler))
        .route("/api/sessions/:id/messages", get(messages_handler))
        .layer(TraceLayer::new_for_http());

    let app = if cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    };

    app.with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn chat_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "EMPTY_MESSAGE",
            "message must not be empty",
        ));
    }

    let reply = state
        .gateway
        .process_message(request.session_id.as_deref(), message)
        .await?;
    Ok(Json(reply))
}

async fn sessions_handler(State(state): State<Arc<ServerState>>) -> Json<Vec<SessionInfo>> {
    Json(state.gateway.sessions().await)
}

async fn messages_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    Ok(Json(state.gateway.history(&id).await?))
}

/// Gateway HTTP server.
pub struct GatewayServer {
    /// Server state
    state: Arc<ServerState>,

    /// Server configuration
    host: String,
    port: u16,
    cors: bool,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(gateway: Gateway, host: &str, port: u16, cors: bool) -> Self {
        Self {
            state: Arc::new(ServerState::new(gateway)),
            host: host.to_string(),
            port,
            cors,
        }
    }

    /// Get a reference to the server state.
    pub fn state(&self) -> Arc<ServerState> {
        self.state.clone()
    }

    /// Start the server.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let app = router(self.state.clone(), self.cors);

        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| GatewayError::ServerError(format!("Invalid address: {}", e)))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))?;

        tracing::info!(
            "Gateway v{} listening on http://{}",
            self.state.version(),
            listener.local_addr().unwrap_or(addr)
        );

        axum::serve(listener, app)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentConfig, MemoryCheckpointer};
    use crate::gateway::SessionManagerConfig;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::ChatMessage;
    use crate::tools::ToolRegistry;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(replies: Vec<ChatMessage>) -> Router {
        let agent = Agent::new(
            Arc::new(ScriptedModel::new(replies)),
            ToolRegistry::new(),
            Arc::new(MemoryCheckpointer::new()),
            AgentConfig::default(),
        );
        let gateway = Gateway::new(Arc::new(agent), SessionManagerConfig::default());
        router(Arc::new(ServerState::new(gateway)), true)
    }

    fn chat(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let app = app(vec![]);

        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("/api/chat"));
    }

    #[tokio::test]
    async fn test_chat_then_history() {
        let app = app(vec![ChatMessage::assistant("Dr. Brown is free at 9 AM.")]);

        let response = app
            .clone()
            .oneshot(chat(serde_json::json!({"message": "Is Dr. Brown free?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reply = json_body(response).await;
        assert_eq!(reply["reply"], "Dr. Brown is free at 9 AM.");
        let session_id = reply["session_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/sessions/{}/messages", session_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let history = json_body(response).await;
        assert_eq!(history.as_array().unwrap().len(), 2);
        assert_eq!(history[0]["role"], "user");
        assert_eq!(history[1]["content"], "Dr. Brown is free at 9 AM.");

        let sessions = json_body(app.oneshot(get("/api/sessions")).await.unwrap()).await;
        assert_eq!(sessions[0]["id"], session_id.as_str());
        assert_eq!(sessions[0]["turns"], 1);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let response = app(vec![])
            .oneshot(chat(serde_json::json!({"message": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "EMPTY_MESSAGE");
    }

    #[tokio::test]
    async fn test_unknown_session_messages_is_404() {
        let response = app(vec![])
            .oneshot(get("/api/sessions/nope/messages"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_agent_failure_is_bad_gateway() {
        let response = app(vec![])
            .oneshot(chat(serde_json::json!({"message": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
