use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use generator::GeneratorError;
use services::services::ServiceError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Service(err) => match err {
                ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
                ServiceError::Generator(GeneratorError::Provider(_)) => {
                    (StatusCode::BAD_GATEWAY, "ProviderError")
                }
                ServiceError::Generator(GeneratorError::Envelope { .. }) => {
                    (StatusCode::BAD_GATEWAY, "EnvelopeInvalid")
                }
                ServiceError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "StoreError"),
            },
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, "MultipartError"),
        };

        let error_message = match &self {
            // Carry the offending raw text so a bad generation can be
            // diagnosed from the response alone.
            ApiError::Service(ServiceError::Generator(GeneratorError::Envelope {
                reason,
                raw,
            })) => format!("EnvelopeInvalid: {reason}; raw output: {raw}"),
            ApiError::Multipart(_) => {
                "Failed to read uploaded files. Please ensure the upload is valid and try again."
                    .to_string()
            }
            _ => format!("{error_type}: {self}"),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
