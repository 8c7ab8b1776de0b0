use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::cache::ContentCache;
use crate::error::ChatError;
use crate::llm::{LlmProvider, ProviderError};
use crate::metrics::{CACHE_ERRORS, CACHE_HITS, CACHE_MISSES, LLM_RETRIES, REQUEST_LATENCY};
use crate::prompts::{Prompt, PromptBuilder};
use crate::rate_limit::{MAX_ATTEMPTS, RetryPolicy};

pub const NO_RESPONSE: &str = "No response generated.";

// Cache lookup -> prompt -> provider, one request at a time. Holds no mutable state.
pub struct ChatService {
    cache: Arc<dyn ContentCache>,
    provider: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
    retry: RetryPolicy,
}

impl ChatService {
    pub fn new(
        cache: Arc<dyn ContentCache>,
        provider: Arc<dyn LlmProvider>,
        prompts: PromptBuilder,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            provider,
            prompts,
            retry,
        }
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub async fn handle(&self, message: &str) -> Result<String, ChatError> {
        let start_time = Instant::now();

        let message = message.trim();
        if message.is_empty() {
            warn!("no message provided");
            return Err(ChatError::EmptyMessage);
        }
        let query = message.to_lowercase();

        let cached = self.lookup(&query).await;

        let result = match self.prompts.plan(message, &cached) {
            Prompt::Direct(reply) => {
                debug!("no cached content, answering with the fallback reply");
                Ok(reply)
            }
            Prompt::Llm(prompt) => {
                debug!(prompt_len = prompt.len(), "prompt built");
                self.generate(&prompt).await
            }
        };

        let latency = start_time.elapsed();
        REQUEST_LATENCY.observe(latency.as_secs_f64());
        match &result {
            Ok(text) => info!(
                query_len = query.len(),
                response_len = text.len(),
                latency_ms = latency.as_millis() as u64,
                "chat request served"
            ),
            Err(e) => error!(
                query_len = query.len(),
                latency_ms = latency.as_millis() as u64,
                error = %e,
                "chat request failed"
            ),
        }
        result
    }

    // Store failures degrade to "no cached content".
    async fn lookup(&self, query: &str) -> String {
        match self.cache.find_by_substring(query).await {
            Ok(Some(content)) => {
                CACHE_HITS.inc();
                debug!(content_len = content.len(), "cache HIT");
                content
            }
            Ok(None) => {
                CACHE_MISSES.inc();
                debug!("cache MISS");
                String::new()
            }
            Err(e) => {
                CACHE_ERRORS.inc();
                warn!(
                    backend = self.cache.backend(),
                    query_len = query.len(),
                    error = %e,
                    "cache lookup failed, continuing without cached content"
                );
                String::new()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        let mut attempt = 1;
        loop {
            match self.provider.generate(prompt).await {
                Ok(text) => {
                    return Ok(text
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| NO_RESPONSE.to_string()));
                }
                Err(ProviderError::RateLimited { message, retry_after }) => {
                    if attempt >= MAX_ATTEMPTS {
                        error!(
                            provider = self.provider.name(),
                            attempts = attempt,
                            "rate limited on every attempt, giving up"
                        );
                        return Err(ChatError::RateLimited(message));
                    }
                    let delay = self.retry.delay_for(retry_after);
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, retrying"
                    );
                    LLM_RETRIES.inc();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(ProviderError::Unavailable(message)) => {
                    return Err(ChatError::Upstream(message));
                }
            }
        }
    }
}
