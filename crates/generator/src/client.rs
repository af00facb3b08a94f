use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::GeneratorError;

const FOLIO_OPENAI_API_BASE: &str = "FOLIO_OPENAI_API_BASE";
const FOLIO_OPENAI_API_KEY: &str = "FOLIO_OPENAI_API_KEY";
const FOLIO_OPENAI_MODEL: &str = "FOLIO_OPENAI_MODEL";
const OPENAI_API_BASE: &str = "OPENAI_API_BASE";
const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const DEFAULT_API_BASE: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// The external completion collaborator, behind a trait so the
/// controllers (and their tests) never depend on a live endpoint.
#[async_trait]
pub trait GeneratorClient: Send + Sync {
    /// Single text request/response. No retry loop lives here.
    async fn complete(&self, system_prompt: &str) -> Result<String, GeneratorError>;

    /// Describe one image; the reply is plain text.
    async fn describe_image(&self, bytes: &[u8], mime: &str) -> Result<String, GeneratorError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: Option<String>,
}

pub struct OpenAiGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = resolve_env(FOLIO_OPENAI_API_KEY, OPENAI_API_KEY)
            .ok_or_else(|| anyhow::anyhow!("Missing OpenAI API key ({OPENAI_API_KEY})"))?;
        let base_url = resolve_env(FOLIO_OPENAI_API_BASE, OPENAI_API_BASE)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let model = std::env::var(FOLIO_OPENAI_MODEL)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| anyhow::anyhow!("Failed to build HTTP client: {err}"))?;

        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }

    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String, GeneratorError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
        };

        tracing::debug!(model = %self.model, "Requesting chat completion");
        let response = self
            .http
            .post(format_openai_url(&self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GeneratorError::Provider("request timed out".to_string())
                } else {
                    GeneratorError::Provider(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = parse_openai_error(&body)
                .unwrap_or_else(|| format!("request failed with status {status}"));
            return Err(GeneratorError::Provider(message));
        }

        let data = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|err| GeneratorError::Provider(format!("unreadable response body: {err}")))?;

        data.choices
            .iter()
            .find_map(|choice| choice.message.as_ref()?.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| GeneratorError::envelope("response contained no content", ""))
    }
}

#[async_trait]
impl GeneratorClient for OpenAiGenerator {
    async fn complete(&self, system_prompt: &str) -> Result<String, GeneratorError> {
        self.chat_completion(vec![ChatMessage {
            role: "system".to_string(),
            content: Value::String(system_prompt.to_string()),
        }])
        .await
    }

    async fn describe_image(&self, bytes: &[u8], mime: &str) -> Result<String, GeneratorError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let content = json!([
            {
                "type": "text",
                "text": "Describe this image in one or two sentences, focusing on what it shows about the person's work or interests."
            },
            {
                "type": "image_url",
                "image_url": { "url": format!("data:{mime};base64,{encoded}") }
            }
        ]);
        self.chat_completion(vec![ChatMessage {
            role: "user".to_string(),
            content,
        }])
        .await
    }
}

fn resolve_env(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            std::env::var(fallback)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
}

fn format_openai_url(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        format!("{trimmed}/chat/completions")
    } else {
        format!("{trimmed}/v1/chat/completions")
    }
}

fn parse_openai_error(body: &str) -> Option<String> {
    let parsed: OpenAiErrorResponse = serde_json::from_str(body).ok()?;
    parsed.error.and_then(|err| err.message)
}

#[cfg(test)]
mod tests {
    use super::{format_openai_url, parse_openai_error};

    #[test]
    fn format_openai_url_appends_v1() {
        assert_eq!(
            format_openai_url("https://example.com"),
            "https://example.com/v1/chat/completions"
        );
        assert_eq!(
            format_openai_url("https://example.com/"),
            "https://example.com/v1/chat/completions"
        );
    }

    #[test]
    fn format_openai_url_respects_existing_v1() {
        assert_eq!(
            format_openai_url("https://example.com/v1"),
            "https://example.com/v1/chat/completions"
        );
    }

    #[test]
    fn parse_openai_error_extracts_message() {
        let body = r#"{"error": {"message": "rate limited"}}"#;
        assert_eq!(parse_openai_error(body), Some("rate limited".to_string()));
        assert_eq!(parse_openai_error("not json"), None);
    }
}
