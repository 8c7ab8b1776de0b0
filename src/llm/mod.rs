//! Hosted LLM access.

mod gemini;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::GeminiProvider;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider asked us to slow down.
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("{0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Single-turn completion. `Ok(None)` when the provider returned no text.
    async fn generate(&self, prompt: &str) -> Result<Option<String>, ProviderError>;
}
