//! Completion backend contract and its OpenAI-compatible implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::chat::client::{AiReply, ApiMessage};
use crate::chat::core::message::MessageRole;

use super::justification::JustificationSplitter;

/// Fixed system prompt framing every completion.
pub const SYSTEM_PROMPT: &str = "You are an AI assistant designed to help users solve their problems iteratively or provide empathetic support. \
If the user presents a problem, try to break it down and offer actionable suggestions. Ask clarifying questions if needed. \
If the user seems distressed or is sharing a personal issue, respond with empathy, validate their feelings, and offer consolation. \
Avoid giving unsolicited advice unless specifically asked for problem-solving. \
For every main suggestion or solution you provide, also give a short justification for why you are suggesting it. \
Structure your response clearly. The main response should be distinct from the justification, which should be prefixed with 'Justification:'.";

/// Environment variable for the chat-completions base URL.
pub const LLM_BASE_URL_ENV: &str = "EMPATHY_LLM_BASE_URL";
/// Environment variable for the model name.
pub const LLM_MODEL_ENV: &str = "EMPATHY_LLM_MODEL";
/// Environment variable for the upstream API key.
pub const LLM_API_KEY_ENV: &str = "EMPATHY_LLM_API_KEY";

/// Default chat-completions endpoint (local Ollama, OpenAI-compatible mode).
const DEFAULT_LLM_BASE_URL: &str = "http://127.0.0.1:11434/v1";
/// Default model name.
const DEFAULT_MODEL: &str = "mistral:7b-instruct-q8_0";

/// Errors produced by the completion backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The upstream LLM request failed.
    #[error("llm request failed: {0}")]
    Request(String),
    /// The upstream response could not be interpreted.
    #[error("llm response malformed: {0}")]
    MalformedResponse(String),
}

/// Settings for the upstream chat-completions API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API (ends before `/chat/completions`).
    pub base_url: String,
    /// Model name to request.
    pub model: String,
    /// Optional bearer key for the upstream API.
    pub api_key: Option<String>,
    /// Token budget per completion.
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            max_tokens: 1024,
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Build settings from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_url: std::env::var(LLM_BASE_URL_ENV).unwrap_or(default.base_url),
            model: std::env::var(LLM_MODEL_ENV).unwrap_or(default.model),
            api_key: std::env::var(LLM_API_KEY_ENV).ok(),
            ..default
        }
    }
}

/// Contract for producing one assistant turn from a conversation.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Produce the assistant's reply for `message` given prior `history`.
    ///
    /// # Errors
    /// Returns an error if the upstream request fails or its response cannot
    /// be interpreted.
    async fn complete(&self, history: &[ApiMessage], message: &str)
    -> Result<AiReply, BackendError>;
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiChatBackend {
    http: reqwest::Client,
    config: LlmConfig,
    completions_url: Url,
    splitter: JustificationSplitter,
}

impl OpenAiChatBackend {
    /// Build a backend for the given settings.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be constructed.
    pub fn new(config: LlmConfig) -> Result<Self, BackendError> {
        let completions_url = Url::parse(&format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        ))
        .map_err(|err| BackendError::InvalidConfig(format!("base_url: {err}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| BackendError::InvalidConfig(format!("http client: {err}")))?;

        let splitter = JustificationSplitter::new()
            .map_err(|err| BackendError::InvalidConfig(format!("marker pattern: {err}")))?;

        Ok(Self {
            http,
            config,
            completions_url,
            splitter,
        })
    }

    /// Assemble the outbound message list: system prompt, prior turns with
    /// justifications folded back into their content, then the new message.
    fn build_messages<'a>(history: &'a [ApiMessage], message: &'a str) -> Vec<WireMessage<'a>> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(WireMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        });

        for turn in history {
            let mut content = turn.content.clone();
            if turn.role == MessageRole::Assistant
                && let Some(justification) = &turn.justification
            {
                content.push_str(&format!(
                    "\n[Context: My justification for the above response was: {justification}]"
                ));
            }
            messages.push(WireMessage {
                role: turn.role.as_str(),
                content,
            });
        }

        messages.push(WireMessage {
            role: "user",
            content: message.to_string(),
        });
        messages
    }
}

#[async_trait]
impl CompletionBackend for OpenAiChatBackend {
    async fn complete(
        &self,
        history: &[ApiMessage],
        message: &str,
    ) -> Result<AiReply, BackendError> {
        let messages = Self::build_messages(history, message);
        debug!(
            "Relaying completion to {} with {} messages",
            self.config.model,
            messages.len()
        );

        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let mut request = self.http.post(self.completions_url.clone()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| BackendError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Request(format!("status {status}")));
        }

        let decoded: CompletionResponse = response
            .json()
            .await
            .map_err(|err| BackendError::MalformedResponse(err.to_string()))?;

        let full = decoded
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::MalformedResponse("no choices returned".to_string()))?;

        let (content, justification) = self.splitter.split(&full);
        Ok(AiReply {
            role: MessageRole::Assistant,
            content,
            justification: Some(justification),
        })
    }
}
