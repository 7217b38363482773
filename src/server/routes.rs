//! HTTP route handlers for the completion backend API.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tracing::{debug, error};

use crate::chat::client::{SendRequest, SendResponse};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/chat/send", post(send_message))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "empathy-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Error response carrying a `detail` body, as clients expect.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status to respond with.
    pub status: StatusCode,
    /// Display message placed in the `detail` field.
    pub detail: String,
}

impl ApiError {
    fn unauthorized(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            detail: detail.into(),
        }
    }

    fn forbidden(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail }));
        (self.status, body).into_response()
    }
}

/// Extract the bearer token from the `Authorization` header, if any.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Handle one chat turn: verify the caller, relay to the LLM, and wrap the
/// assistant's reply.
async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let token = bearer_token(&headers);
    let claims = state
        .verifier
        .verify(token)
        .await
        .map_err(|err| ApiError::unauthorized(err.to_string()))?;

    if request.user_id != claims.uid {
        return Err(ApiError::forbidden(
            "User ID in request does not match authenticated user",
        ));
    }

    debug!(
        "Chat turn for {} with {} prior turns",
        claims.uid,
        request.conversation_history.len()
    );

    let reply = state
        .backend
        .complete(&request.conversation_history, &request.message)
        .await
        .map_err(|err| {
            error!("Completion relay failed: {err}");
            ApiError::internal("Error communicating with the AI service. Please try again later.")
        })?;

    Ok(Json(SendResponse { ai_response: reply }))
}
