//! HTTP implementation of the completion client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::chat::core::config::ApiConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::RequestId;

use super::{AiReply, CompletionClient, SendRequest, SendResponse};

/// Path of the send endpoint, relative to the configured base URL.
const SEND_PATH: &str = "/api/v1/chat/send";

/// Message surfaced when the credential is missing at call time.
const TOKEN_MISSING: &str = "Authentication token not available. Please log in.";

/// Message surfaced when an error body cannot be decoded.
const UNEXPECTED_API_ERROR: &str = "An unexpected API error occurred.";

/// Structured error payload returned by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    message: Option<String>,
}

/// Completion client speaking the `POST /api/v1/chat/send` protocol.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    send_url: Url,
}

impl HttpCompletionClient {
    /// Build a client for the given API settings.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be constructed.
    pub fn new(config: &ApiConfig) -> ChatResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|err| ChatError::InvalidConfig(format!("api.base_url: {err}")))?;
        let send_url = base
            .join(SEND_PATH)
            .map_err(|err| ChatError::InvalidConfig(format!("api.base_url: {err}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| ChatError::InvalidConfig(format!("http client: {err}")))?;

        Ok(Self { http, send_url })
    }

    /// Extract a display message from a non-2xx response.
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => body
                .detail
                .or(body.message)
                .unwrap_or_else(|| format!("API Error: {status}")),
            Err(_) => UNEXPECTED_API_ERROR.to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn send(&self, request: SendRequest, token: &str) -> ChatResult<AiReply> {
        if token.trim().is_empty() {
            return Err(ChatError::AuthTokenUnavailable(TOKEN_MISSING.to_string()));
        }

        let request_id = RequestId::new();
        debug!(
            "Sending completion request {} with {} prior turns",
            request_id,
            request.conversation_history.len()
        );

        let response = self
            .http
            .post(self.send_url.clone())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|err| ChatError::UpstreamRequestFailed(err.to_string()))?;

        if !response.status().is_success() {
            let message = Self::error_message(response).await;
            debug!("Completion request {} failed: {}", request_id, message);
            return Err(ChatError::UpstreamRequestFailed(message));
        }

        let decoded: SendResponse = response
            .json()
            .await
            .map_err(|err| ChatError::UpstreamRequestFailed(format!("malformed response: {err}")))?;

        debug!("Completion request {} resolved", request_id);
        Ok(decoded.ai_response)
    }
}
