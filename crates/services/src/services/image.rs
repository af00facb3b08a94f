//! Image batch ingestion. Each image is processed independently: a
//! failed analysis becomes a sentinel on that record and the batch
//! continues. The profile's image list and the single summarizing
//! conversation turn are committed together.

use std::path::PathBuf;

use chrono::Utc;
use generator::{ConversationTurn, Orchestrator};
use serde_json::Value;
use store::DocumentStore;

use super::{
    ServiceError,
    domain::{HISTORY_KEY, ImageRecord, PROFILE_KEY, history_value, load_history, load_profile},
};

pub const MAX_BATCH_SIZE: usize = 5;
pub const ANALYSIS_FAILED: &str = "analysis failed";

/// One image received from the upload endpoint, not yet persisted.
pub struct UploadedImage {
    pub original_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub records: Vec<ImageRecord>,
    pub message: String,
}

#[derive(Clone)]
pub struct ImageService {
    store: DocumentStore,
    orchestrator: Orchestrator,
    uploads_dir: PathBuf,
}

impl ImageService {
    pub fn new(store: DocumentStore, orchestrator: Orchestrator, uploads_dir: PathBuf) -> Self {
        Self {
            store,
            orchestrator,
            uploads_dir,
        }
    }

    /// Ingest a batch of 0–5 images plus optional text. Blobs are
    /// persisted and analyzed before any lock is taken; only the final
    /// history/profile commit runs under the exclusive hold.
    pub async fn ingest(
        &self,
        images: Vec<UploadedImage>,
        text: Option<String>,
    ) -> Result<IngestOutcome, ServiceError> {
        let text = text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if images.is_empty() && text.is_none() {
            return Err(ServiceError::Validation(
                "upload requires at least one image or some text".to_string(),
            ));
        }
        if images.len() > MAX_BATCH_SIZE {
            return Err(ServiceError::Validation(format!(
                "at most {MAX_BATCH_SIZE} images per upload, got {}",
                images.len()
            )));
        }

        std::fs::create_dir_all(&self.uploads_dir).map_err(store::StoreError::Io)?;

        let mut records = Vec::with_capacity(images.len());
        for image in &images {
            let filename = blob_filename(&image.original_name);
            std::fs::write(self.uploads_dir.join(&filename), &image.bytes)
                .map_err(store::StoreError::Io)?;

            let analysis = match self
                .orchestrator
                .request_image_description(&image.bytes, &image.mime)
                .await
            {
                Ok(description) => description,
                Err(err) => {
                    tracing::warn!(
                        image = %image.original_name,
                        error = %err,
                        "Image analysis failed, recording sentinel"
                    );
                    ANALYSIS_FAILED.to_string()
                }
            };

            records.push(ImageRecord {
                url: format!("/uploads/{filename}"),
                filename,
                original_name: image.original_name.clone(),
                uploaded_at: Utc::now(),
                description: text.clone().unwrap_or_default(),
                ai_analysis: analysis,
            });
        }

        let user_summary = summarize_user(&records, text.as_deref());
        let bot_summary = summarize_bot(&records);

        let _guards = self.store.lock_keys(&[HISTORY_KEY, PROFILE_KEY]).await;
        let mut history = load_history(&self.store)?;
        let mut profile = load_profile(&self.store)?;

        let image_list = profile
            .entry("images".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !image_list.is_array() {
            *image_list = Value::Array(Vec::new());
        }
        if let Value::Array(list) = image_list {
            for record in &records {
                list.push(serde_json::to_value(record)?);
            }
        }

        history.push(ConversationTurn {
            user: user_summary,
            bot: bot_summary.clone(),
        });

        self.store.put_many(&[
            (HISTORY_KEY, history_value(&history)?),
            (PROFILE_KEY, Value::Object(profile)),
        ])?;

        Ok(IngestOutcome {
            records,
            message: bot_summary,
        })
    }
}

/// Collision-resistant blob name: a UUID plus the sanitized original
/// name, so the original extension survives.
fn blob_filename(original_name: &str) -> String {
    let safe: String = original_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.is_empty() {
        "image".to_string()
    } else {
        safe
    };
    format!("{}-{safe}", uuid::Uuid::new_v4())
}

fn summarize_user(records: &[ImageRecord], text: Option<&str>) -> String {
    let names: Vec<&str> = records
        .iter()
        .map(|record| record.original_name.as_str())
        .collect();
    match (records.is_empty(), text) {
        (true, Some(text)) => text.to_string(),
        (false, Some(text)) => {
            format!("Uploaded {} image(s): {}. Note: {text}", names.len(), names.join(", "))
        }
        (false, None) => format!("Uploaded {} image(s): {}", names.len(), names.join(", ")),
        // Unreachable past validation, but harmless.
        (true, None) => String::new(),
    }
}

fn summarize_bot(records: &[ImageRecord]) -> String {
    if records.is_empty() {
        return "Noted! I've added that to your profile context.".to_string();
    }
    records
        .iter()
        .map(|record| format!("{}: {}", record.original_name, record.ai_analysis))
        .collect::<Vec<_>>()
        .join("\n")
}
