//! Shopping assistant handler.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::services::{ChatReply, ChatService, ChatTurn};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(chat))
}

/// A chat message with the conversation so far.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Answer a shopper's question using matching catalog products as context.
///
/// Always answers when the message is valid; without a working model the
/// reply is a canned pointer to the catalog.
///
/// # Errors
///
/// Returns 400 for an empty or overlong message.
#[instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let reply = ChatService::new(state.pool(), state.gemini())
        .reply(&body.message, &body.history)
        .await?;
    Ok(Json(reply))
}
