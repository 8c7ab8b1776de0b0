//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde_json::{Value, json};
use tracing::debug;

use super::{LlmProvider, ProviderError};
use crate::config::{ApiKey, LlmConfig};

pub struct GeminiProvider {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &self.api_key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
        })
    }

    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }]
        }]
    })
}

/// Join the non-thought text parts of the first candidate.
fn extract_text(response: &Value) -> Option<String> {
    let parts = response["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter(|p| !p["thought"].as_bool().unwrap_or(false))
        .filter_map(|p| p["text"].as_str())
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Map a non-2xx reply to a [`ProviderError`].
fn classify_error(status: u16, retry_after: Option<Duration>, body: &str) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().map(|v| &v["error"]);

    let message = error
        .and_then(|e| e["message"].as_str())
        .map(|m| format!("Gemini API error: {m}"))
        .unwrap_or_else(|| format!("Gemini API error ({status}): {}", body.trim()));

    let exhausted = status == 429
        || error
            .and_then(|e| e["status"].as_str())
            .is_some_and(|s| s == "RESOURCE_EXHAUSTED");

    if exhausted {
        ProviderError::RateLimited {
            message,
            retry_after: error.and_then(retry_info_delay).or(retry_after),
        }
    } else {
        ProviderError::Unavailable(message)
    }
}

// `google.rpc.RetryInfo` detail, e.g. {"retryDelay": "37s"}
fn retry_info_delay(error: &Value) -> Option<Duration> {
    error["details"]
        .as_array()?
        .iter()
        .find(|d| {
            d["@type"]
                .as_str()
                .is_some_and(|t| t.ends_with("google.rpc.RetryInfo"))
        })
        .and_then(|d| d["retryDelay"].as_str())
        .and_then(parse_delay)
}

fn parse_delay(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().strip_suffix('s')?.parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Gemini request");

        let response = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let body: Value = response.json().await.map_err(|e| {
                ProviderError::Unavailable(format!("Failed to parse Gemini response: {e}"))
            })?;
            return Ok(extract_text(&body));
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), retry_after, &body))
    }
}
