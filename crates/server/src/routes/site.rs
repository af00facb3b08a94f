use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/promptBackground", post(regenerate))
        .route("/get-site-code", get(get_site_code))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateResponse {
    pub message: String,
    pub preview_url: String,
}

async fn regenerate(
    State(state): State<AppState>,
) -> Result<ResponseJson<RegenerateResponse>, ApiError> {
    state.site().regenerate().await?;
    Ok(ResponseJson(RegenerateResponse {
        message: "Portfolio regenerated".to_string(),
        preview_url: "/portfolio/index.html".to_string(),
    }))
}

/// Filename → content map for the three generated files.
async fn get_site_code(State(state): State<AppState>) -> Result<ResponseJson<Value>, ApiError> {
    let mut files = Map::new();
    for (filename, content) in state.site().site_code()? {
        files.insert(filename, Value::String(content));
    }
    Ok(ResponseJson(Value::Object(files)))
}
