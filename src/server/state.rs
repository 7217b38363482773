//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::llm::backend::{CompletionBackend, LlmConfig, OpenAiChatBackend};

use super::auth::{DevTokenVerifier, TokenVerifier};

/// Environment variable enabling the development-mode verifier.
pub const DEV_MODE_ENV: &str = "EMPATHY_DEV_MODE";

/// Shared application state.
pub struct AppState {
    /// Token verifier for incoming requests.
    pub verifier: Arc<dyn TokenVerifier>,
    /// LLM relay answering completions.
    pub backend: Arc<dyn CompletionBackend>,
}

impl AppState {
    /// Create application state from the environment.
    ///
    /// Token verification against the hosted identity provider lives outside
    /// this crate, so the environment path requires `EMPATHY_DEV_MODE=true`;
    /// production embedders supply their own verifier via
    /// [`Self::with_collaborators`].
    ///
    /// # Errors
    /// Returns an error if the LLM backend cannot be created or no verifier
    /// is configured.
    pub fn new() -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let backend = OpenAiChatBackend::new(LlmConfig::from_env())
            .map_err(|e| format!("Failed to create LLM backend: {e}"))?;

        let dev_mode = std::env::var(DEV_MODE_ENV)
            .is_ok_and(|value| value.eq_ignore_ascii_case("true"));
        if !dev_mode {
            return Err(format!(
                "no token verifier configured: set {DEV_MODE_ENV}=true or build the state \
                 with a custom verifier"
            )
            .into());
        }

        Ok(Arc::new(Self {
            verifier: Arc::new(DevTokenVerifier),
            backend: Arc::new(backend),
        }))
    }

    /// Create application state from explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        verifier: Arc<dyn TokenVerifier>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Arc<Self> {
        Arc::new(Self { verifier, backend })
    }
}
