//! Chat turn lifecycle: append user turn, invoke the generator,
//! complete the turn with the bot reply and commit history + profile
//! as one batch — or commit nothing at all.

use generator::{ConversationTurn, Orchestrator};
use serde_json::{Map, Value};
use store::DocumentStore;

use super::{
    ServiceError,
    domain::{
        HISTORY_KEY, PROFILE_KEY, default_profile, history_value, load_history, load_profile,
        warn_on_dropped_images,
    },
};

/// Result of a committed chat turn.
#[derive(Debug)]
pub struct ChatOutcome {
    pub reply: String,
    pub chat_history: Vec<ConversationTurn>,
    pub user_profile: Map<String, Value>,
}

#[derive(Clone)]
pub struct ChatService {
    store: DocumentStore,
    orchestrator: Orchestrator,
}

impl ChatService {
    pub fn new(store: DocumentStore, orchestrator: Orchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Create history and profile documents with defaults if absent.
    /// Idempotent; never overwrites existing state.
    pub async fn ensure_defaults(&self) -> Result<(), ServiceError> {
        let _guards = self.store.lock_keys(&[HISTORY_KEY, PROFILE_KEY]).await;
        let mut missing: Vec<(&str, Value)> = Vec::new();
        if self.store.get(HISTORY_KEY)?.is_none() {
            missing.push((HISTORY_KEY, Value::Array(Vec::new())));
        }
        if self.store.get(PROFILE_KEY)?.is_none() {
            missing.push((PROFILE_KEY, Value::Object(default_profile())));
        }
        if !missing.is_empty() {
            self.store.put_many(&missing)?;
        }
        Ok(())
    }

    /// Drive one chat turn. The history/profile locks are held across
    /// the generator call so a concurrent turn queues behind this one
    /// instead of reading a stale snapshot.
    pub async fn send_message(&self, message: &str) -> Result<ChatOutcome, ServiceError> {
        if message.trim().is_empty() {
            return Err(ServiceError::Validation(
                "message must be a non-empty string".to_string(),
            ));
        }

        let _guards = self.store.lock_keys(&[HISTORY_KEY, PROFILE_KEY]).await;
        let mut history = load_history(&self.store)?;
        let profile = load_profile(&self.store)?;

        // Appended in memory only; committed together with the bot
        // reply, or discarded on failure.
        history.push(ConversationTurn::pending(message));

        let envelope = self
            .orchestrator
            .request_chat_turn(&history, &profile)
            .await?;

        if let Some(last) = history.last_mut() {
            last.bot = envelope.next_question.clone();
        }
        warn_on_dropped_images(&profile, &envelope.updated_user_profile);

        self.store.put_many(&[
            (HISTORY_KEY, history_value(&history)?),
            (
                PROFILE_KEY,
                Value::Object(envelope.updated_user_profile.clone()),
            ),
        ])?;

        Ok(ChatOutcome {
            reply: envelope.next_question,
            chat_history: history,
            user_profile: envelope.updated_user_profile,
        })
    }

    /// Restore the canonical default profile and an empty history.
    /// Idempotent.
    pub async fn reset(&self) -> Result<(), ServiceError> {
        let _guards = self.store.lock_keys(&[HISTORY_KEY, PROFILE_KEY]).await;
        self.store.put_many(&[
            (HISTORY_KEY, Value::Array(Vec::new())),
            (PROFILE_KEY, Value::Object(default_profile())),
        ])?;
        Ok(())
    }

    pub fn history(&self) -> Result<Vec<ConversationTurn>, ServiceError> {
        load_history(&self.store)
    }

    pub fn profile(&self) -> Result<Map<String, Value>, ServiceError> {
        load_profile(&self.store)
    }
}
