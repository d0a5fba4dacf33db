//! HTTP request handlers

use super::types::{ChatRequest, ErrorResponse, IncomingMessage, ModelsResponse};
use super::AppState;
use crate::continuation::TurnError;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat turn (streams the relay body)
        .route("/api/chat", post(chat))
        // Models
        .route("/api/models", get(list_models))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    if req.messages.is_empty() {
        return Err(AppError::BadRequest("messages must not be empty".to_string()));
    }

    let start = std::time::Instant::now();
    let log = req
        .messages
        .into_iter()
        .map(IncomingMessage::into_chat_message)
        .collect();

    let turn = state
        .runner
        .run_turn(log, req.provider.as_ref())
        .await
        .map_err(AppError::from)?;

    tracing::info!(
        duration_ms = %start.elapsed().as_millis(),
        "Chat response started"
    );

    // The report task logs its own outcome
    let (stream, _report) = turn.into_parts();
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

// ============================================================
// Models
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_model_info(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("chat-relay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl From<TurnError> for AppError {
    fn from(err: TurnError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::llm::{LlmError, ModelRegistry, Provider};
    use crate::testing::{MockLlmService, ScriptedSegment};
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(mock: MockLlmService, config: RelayConfig) -> Router {
        let mut registry = ModelRegistry::new_empty("mock-model");
        registry.register(Arc::new(mock));
        create_router(AppState::new(Arc::new(registry), config))
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Collect a response body, failing instead of hanging on a stalled stream
    async fn read_body(response: Response) -> Result<axum::body::Bytes, axum::Error> {
        tokio::time::timeout(
            Duration::from_secs(5),
            axum::body::to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("response body should end")
    }

    const HELLO: &str = r#"{"messages":[{"role":"user","parts":[{"type":"text","text":"hi"}]}]}"#;

    #[tokio::test]
    async fn test_chat_streams_all_segments() {
        let mock = MockLlmService::new("mock-model");
        mock.queue_segment(ScriptedSegment::truncated(&["Hello "]));
        mock.queue_segment(ScriptedSegment::truncated(&["world"]));
        mock.queue_segment(ScriptedSegment::completed(&["!"]));
        let config = RelayConfig {
            max_segments: 3,
            ..RelayConfig::default()
        };

        let response = app(mock, config).oneshot(chat_request(HELLO)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );

        let body = read_body(response).await.unwrap();
        assert_eq!(&body[..], b"Hello world!");
    }

    #[tokio::test]
    async fn test_segment_limit_aborts_body() {
        let mock = MockLlmService::new("mock-model");
        mock.queue_segment(ScriptedSegment::truncated(&["partial"]));
        let config = RelayConfig {
            max_segments: 1,
            ..RelayConfig::default()
        };

        let response = app(mock, config).oneshot(chat_request(HELLO)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // Body ends with an error rather than a clean EOF
        assert!(read_body(response).await.is_err());
    }

    #[tokio::test]
    async fn test_setup_failure_is_500() {
        let mock = MockLlmService::new("mock-model");
        mock.queue_error(LlmError::auth("invalid x-api-key"));

        let response = app(mock, RelayConfig::default())
            .oneshot(chat_request(HELLO))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = read_body(response).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("invalid x-api-key"));
    }

    #[tokio::test]
    async fn test_empty_messages_rejected() {
        let response = app(MockLlmService::new("mock-model"), RelayConfig::default())
            .oneshot(chat_request(r#"{"messages":[]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let response = app(MockLlmService::new("mock-model"), RelayConfig::default())
            .oneshot(chat_request("{not json"))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_provider_uses_default() {
        let mock = MockLlmService::new("mock-model");
        mock.queue_segment(ScriptedSegment::completed(&["ok"]));
        let body = r#"{"messages":[{"role":"user","content":"hi"}],
                       "provider":{"type":"openai","model":{"id":"gpt-4o"}}}"#;

        let response = app(mock, RelayConfig::default())
            .oneshot(chat_request(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_list_models() {
        let mock = MockLlmService::new("mock-model").with_provider(Provider::Ollama);
        let response = app(mock, RelayConfig::default())
            .oneshot(Request::get("/api/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_body(response).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["default"], "mock-model");
        assert_eq!(json["models"][0]["id"], "mock-model");
        assert_eq!(json["models"][0]["provider"], "ollama");
    }
}
