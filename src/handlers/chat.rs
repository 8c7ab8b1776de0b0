use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use crate::error::ChatError;
use crate::metrics::REQUEST_TOTAL;
use crate::models::{ChatRequest, ChatResponse};
use crate::state::AppState;

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    REQUEST_TOTAL.inc();

    let Json(payload) = payload.map_err(|e| ChatError::InvalidBody(e.body_text()))?;
    let template = state.chat.prompts().system_prompt();
    let message = payload.user_message(template);

    let response = state.chat.handle(message).await?;
    Ok(Json(ChatResponse { response }))
}
