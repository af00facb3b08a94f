use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    GeneratorClient, GeneratorError,
    envelope::{
        ChatEnvelope, RegenerationEnvelope, SiteCode, parse_chat_envelope, parse_description,
        parse_regeneration_envelope,
    },
};

/// One user message paired with its (possibly pending) bot reply.
/// Insertion order in the history document is the canonical
/// chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user: String,
    pub bot: String,
}

impl ConversationTurn {
    pub fn pending(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            bot: String::new(),
        }
    }
}

/// Composes request context, invokes the external generator and
/// validates its output. Pure with respect to local state: it never
/// touches the store, so a failure at any point leaves nothing to
/// roll back.
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn GeneratorClient>,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn GeneratorClient>) -> Self {
        Self { client }
    }

    pub async fn request_chat_turn(
        &self,
        history: &[ConversationTurn],
        profile: &Map<String, Value>,
    ) -> Result<ChatEnvelope, GeneratorError> {
        let prompt = chat_prompt(history, profile);
        let raw = self.client.complete(&prompt).await?;
        parse_chat_envelope(&raw)
    }

    pub async fn request_regeneration(
        &self,
        profile: &Map<String, Value>,
        history: &[ConversationTurn],
        current_code: &SiteCode,
    ) -> Result<RegenerationEnvelope, GeneratorError> {
        let prompt = regeneration_prompt(profile, history, current_code);
        let raw = self.client.complete(&prompt).await?;
        parse_regeneration_envelope(&raw)
    }

    pub async fn request_image_description(
        &self,
        bytes: &[u8],
        mime: &str,
    ) -> Result<String, GeneratorError> {
        let raw = self.client.describe_image(bytes, mime).await?;
        parse_description(&raw)
    }
}

/// `User:`/`Bot:` transcript lines; a pending turn contributes only
/// its user line.
fn format_transcript(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| {
            if turn.bot.is_empty() {
                format!("User: {}", turn.user)
            } else {
                format!("User: {}\nBot: {}", turn.user, turn.bot)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn profile_json(profile: &Map<String, Value>) -> String {
    serde_json::to_string_pretty(&Value::Object(profile.clone()))
        .unwrap_or_else(|_| "{}".to_string())
}

fn chat_prompt(history: &[ConversationTurn], profile: &Map<String, Value>) -> String {
    format!(
        "You are a friendly assistant helping a user build their personal profile.\n\
\n\
Chat history so far:\n\
{transcript}\n\
\n\
Current user profile (JSON):\n\
{profile}\n\
\n\
Your task:\n\
- Reply to the latest user message with a helpful next question that builds the profile further.\n\
- Update the user profile with any new details you can infer.\n\
- Respond ONLY with JSON in exactly this shape, no commentary:\n\
{{\n  \"nextQuestion\": \"string\",\n  \"updatedUserProfile\": {{ ... }}\n}}",
        transcript = format_transcript(history),
        profile = profile_json(profile),
    )
}

fn regeneration_prompt(
    profile: &Map<String, Value>,
    history: &[ConversationTurn],
    current_code: &SiteCode,
) -> String {
    format!(
        "You are a web developer generating a single-page portfolio site for a user.\n\
\n\
User profile (JSON):\n\
{profile}\n\
\n\
Conversation history for additional context:\n\
{transcript}\n\
\n\
Current site files:\n\
--- index.html ---\n\
{markup}\n\
--- style.css ---\n\
{style}\n\
--- script.js ---\n\
{script}\n\
\n\
Your task:\n\
- Regenerate all three files so the site reflects the profile.\n\
- Update the user profile if the conversation revealed new details.\n\
- Respond ONLY with JSON in exactly this shape, no commentary:\n\
{{\n  \"updatedUserProfile\": {{ ... }},\n  \"updatedCode\": {{\n    \"markup\": \"full index.html contents\",\n    \"style\": \"full style.css contents\",\n    \"script\": \"full script.js contents\"\n  }}\n}}",
        profile = profile_json(profile),
        transcript = format_transcript(history),
        markup = current_code.markup,
        style = current_code.style,
        script = current_code.script,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Map;

    use super::*;

    struct CannedClient {
        reply: String,
    }

    #[async_trait]
    impl GeneratorClient for CannedClient {
        async fn complete(&self, _system_prompt: &str) -> Result<String, GeneratorError> {
            Ok(self.reply.clone())
        }

        async fn describe_image(&self, _: &[u8], _: &str) -> Result<String, GeneratorError> {
            Ok(self.reply.clone())
        }
    }

    fn history() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn {
                user: "Hi".to_string(),
                bot: "What's your name?".to_string(),
            },
            ConversationTurn::pending("I'm Ada"),
        ]
    }

    #[test]
    fn transcript_omits_bot_line_for_pending_turn() {
        let transcript = format_transcript(&history());
        assert_eq!(transcript, "User: Hi\nBot: What's your name?\nUser: I'm Ada");
    }

    #[test]
    fn chat_prompt_embeds_history_and_profile() {
        let mut profile = Map::new();
        profile.insert("name".to_string(), serde_json::json!("Ada"));
        let prompt = chat_prompt(&history(), &profile);
        assert!(prompt.contains("User: I'm Ada"));
        assert!(prompt.contains("\"name\": \"Ada\""));
        assert!(prompt.contains("nextQuestion"));
    }

    #[tokio::test]
    async fn chat_turn_validates_fenced_reply() {
        let client = Arc::new(CannedClient {
            reply: "```json\n{\"nextQuestion\": \"And your role?\", \"updatedUserProfile\": {\"name\": \"Ada\"}}\n```".to_string(),
        });
        let orchestrator = Orchestrator::new(client);
        let envelope = orchestrator
            .request_chat_turn(&history(), &Map::new())
            .await
            .unwrap();
        assert_eq!(envelope.next_question, "And your role?");
    }

    #[tokio::test]
    async fn chat_turn_surfaces_invalid_reply() {
        let client = Arc::new(CannedClient {
            reply: "Sure! Here is a question: what's your role?".to_string(),
        });
        let orchestrator = Orchestrator::new(client);
        let err = orchestrator
            .request_chat_turn(&history(), &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Envelope { .. }));
    }

    #[tokio::test]
    async fn image_description_passes_through() {
        let client = Arc::new(CannedClient {
            reply: "a laptop covered in stickers".to_string(),
        });
        let orchestrator = Orchestrator::new(client);
        let description = orchestrator
            .request_image_description(b"bytes", "image/png")
            .await
            .unwrap();
        assert_eq!(description, "a laptop covered in stickers");
    }
}
