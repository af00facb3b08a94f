use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    response::Json as ResponseJson,
    routing::post,
};
use serde::Serialize;
use services::services::{domain::ImageRecord, image::UploadedImage};

use crate::{AppState, error::ApiError};

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload-image", post(upload_images))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub images: Vec<ImageRecord>,
    pub message: String,
}

async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<ResponseJson<UploadResponse>, ApiError> {
    let mut images = Vec::new();
    let mut text: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") | Some("images") => {
                let original_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "image".to_string());
                let mime = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await?;
                images.push(UploadedImage {
                    original_name,
                    mime,
                    bytes: bytes.to_vec(),
                });
            }
            Some("text") => {
                text = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let outcome = state.image().ingest(images, text).await?;
    Ok(ResponseJson(UploadResponse {
        success: true,
        images: outcome.records,
        message: outcome.message,
    }))
}
