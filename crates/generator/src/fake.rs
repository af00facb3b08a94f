//! Scripted stand-in for the external generator, used by controller
//! and route tests so they never depend on a live endpoint.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;

use crate::{GeneratorClient, GeneratorError};

#[derive(Default)]
pub struct ScriptedGenerator {
    completions: Mutex<VecDeque<Result<String, GeneratorError>>>,
    descriptions: Mutex<VecDeque<Result<String, GeneratorError>>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_completion(self, result: Result<String, GeneratorError>) -> Self {
        self.completions
            .lock()
            .expect("completions poisoned")
            .push_back(result);
        self
    }

    pub fn push_description(self, result: Result<String, GeneratorError>) -> Self {
        self.descriptions
            .lock()
            .expect("descriptions poisoned")
            .push_back(result);
        self
    }

    /// Convenience: a chat envelope reply with the given question and
    /// profile JSON.
    pub fn push_chat_reply(self, question: &str, profile_json: &str) -> Self {
        self.push_completion(Ok(format!(
            "{{\"nextQuestion\": {}, \"updatedUserProfile\": {}}}",
            serde_json::Value::String(question.to_string()),
            profile_json
        )))
    }
}

#[async_trait]
impl GeneratorClient for ScriptedGenerator {
    async fn complete(&self, _system_prompt: &str) -> Result<String, GeneratorError> {
        self.completions
            .lock()
            .expect("completions poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(GeneratorError::Provider("no scripted completion".to_string())))
    }

    async fn describe_image(&self, _bytes: &[u8], _mime: &str) -> Result<String, GeneratorError> {
        self.descriptions
            .lock()
            .expect("descriptions poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(GeneratorError::Provider(
                    "no scripted description".to_string(),
                ))
            })
    }
}
