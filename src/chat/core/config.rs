//! Configuration for the conversation subsystem.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};

/// Environment variable overriding the completion API base URL.
pub const API_BASE_URL_ENV: &str = "EMPATHY_API_BASE_URL";

/// Default completion API base URL.
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Top-level configuration for the conversation controller.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Completion API settings.
    pub api: ApiConfig,
    /// Initial-greeting settings.
    pub greeting: GreetingConfig,
    /// Suggested-title settings.
    pub title: TitleConfig,
}

impl ChatConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        Url::parse(&self.api.base_url)
            .map_err(|err| ChatError::InvalidConfig(format!("api.base_url: {err}")))?;

        if self.api.request_timeout_secs == 0 {
            return Err(ChatError::InvalidConfig(
                "api.request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.greeting.prompt.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "greeting.prompt must not be empty".to_string(),
            ));
        }

        if self.greeting.fallback.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "greeting.fallback must not be empty".to_string(),
            ));
        }

        if self.title.max_chars == 0 {
            return Err(ChatError::InvalidConfig(
                "title.max_chars must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Completion API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the completion backend.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Build settings from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(API_BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        Self {
            base_url,
            ..Self::default()
        }
    }
}

/// Initial-greeting settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GreetingConfig {
    /// Fixed prompt sent when a session with no history is activated.
    pub prompt: String,
    /// Fixed assistant greeting used when the greeting fetch fails.
    pub fallback: String,
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            prompt: "User has started a new chat session.".to_string(),
            fallback: "Hello! I'm Empathy.AI. How can I help you today?".to_string(),
        }
    }
}

/// Suggested-title settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TitleConfig {
    /// Maximum length of a suggested title, in characters.
    pub max_chars: usize,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self { max_chars: 40 }
    }
}
