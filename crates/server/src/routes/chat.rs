use axum::{
    Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use generator::ConversationTurn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(send_message))
        .route("/history", get(get_history))
        .route("/profile", get(get_profile))
        .route("/reset", get(reset))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub chat_history: Vec<ConversationTurn>,
    pub user_profile: Map<String, Value>,
}

async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<ResponseJson<ChatResponse>, ApiError> {
    let message = payload.message.unwrap_or_default();
    let outcome = state.chat().send_message(&message).await?;
    Ok(ResponseJson(ChatResponse {
        reply: outcome.reply,
        chat_history: outcome.chat_history,
        user_profile: outcome.user_profile,
    }))
}

async fn get_history(
    State(state): State<AppState>,
) -> Result<ResponseJson<Vec<ConversationTurn>>, ApiError> {
    Ok(ResponseJson(state.chat().history()?))
}

async fn get_profile(State(state): State<AppState>) -> Result<ResponseJson<Value>, ApiError> {
    Ok(ResponseJson(Value::Object(state.chat().profile()?)))
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
}

async fn reset(State(state): State<AppState>) -> Result<ResponseJson<ResetResponse>, ApiError> {
    state.chat().reset().await?;
    Ok(ResponseJson(ResetResponse {
        message: "Files reset successfully".to_string(),
    }))
}
