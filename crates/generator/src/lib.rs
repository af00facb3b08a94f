//! Invocation of the external text/vision generator: request
//! composition, the HTTP client, and validation of the untrusted
//! responses into typed envelopes. Nothing in this crate touches
//! persisted state.

mod client;
pub mod envelope;
pub mod fake;
mod orchestrator;

pub use client::{GeneratorClient, OpenAiGenerator};
pub use envelope::{ChatEnvelope, RegenerationEnvelope, SiteCode};
pub use orchestrator::{ConversationTurn, Orchestrator};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The generator was unreachable, rate-limited or timed out. The
    /// request may succeed if retried later.
    #[error("Generator unavailable: {0}")]
    Provider(String),
    /// The generator answered, but the answer failed envelope
    /// validation. `raw` carries the offending text for diagnosis.
    #[error("Generator response failed validation: {reason}")]
    Envelope { reason: String, raw: String },
}

impl GeneratorError {
    pub fn envelope(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Envelope {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}
