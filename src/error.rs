//! Chat request errors and their HTTP mapping.
//!
//! Cache failures never show up here: the pipeline absorbs them and carries
//! on without cached content.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Empty or whitespace-only message. Never retried.
    #[error("No message provided")]
    EmptyMessage,

    /// Body was not a JSON chat request.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Still rate-limited after the last allowed attempt.
    #[error("{0}")]
    RateLimited(String),

    /// Any other provider failure.
    #[error("{0}")]
    Upstream(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::EmptyMessage | ChatError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ChatError::RateLimited(_) | ChatError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_a_client_error() {
        assert_eq!(ChatError::EmptyMessage.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn provider_failures_are_server_errors() {
        assert_eq!(
            ChatError::RateLimited("quota".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ChatError::Upstream("down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn body_carries_the_provider_message() {
        let response = ChatError::RateLimited("Gemini API error: Quota exceeded".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Gemini API error: Quota exceeded");
    }
}
