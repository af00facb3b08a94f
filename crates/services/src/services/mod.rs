pub mod chat;
pub mod domain;
pub mod image;
pub mod site;

use generator::GeneratorError;
use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed inbound request; nothing was mutated.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Generator failure (provider or envelope); nothing was mutated.
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    /// Persistence failure; batch writes are atomic, so no partial
    /// document is ever visible.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Store(StoreError::Json(err))
    }
}
