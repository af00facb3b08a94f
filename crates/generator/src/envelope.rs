//! Shape validation for the generator's raw output. Models routinely
//! wrap their JSON in markdown fences; the fence is stripped before
//! parsing, and every parse or shape failure becomes
//! [`GeneratorError::Envelope`] so callers can decide whether to
//! surface or retry — nothing panics past this boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::GeneratorError;

/// Envelope expected for a chat turn request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEnvelope {
    pub next_question: String,
    pub updated_user_profile: Map<String, Value>,
}

/// The three generated site files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteCode {
    pub markup: String,
    pub style: String,
    pub script: String,
}

/// Envelope expected for a full-site regeneration request.
#[derive(Debug, Clone, PartialEq)]
pub struct RegenerationEnvelope {
    pub updated_user_profile: Map<String, Value>,
    pub updated_code: SiteCode,
}

/// Remove a single wrapping markdown code fence (``` or ```json) if
/// present. Incidental leading/trailing whitespace is trimmed either
/// way.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line, if any.
    match body.split_once('\n') {
        Some((_lang, content)) => content.trim(),
        None => body.trim(),
    }
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, GeneratorError> {
    let stripped = strip_code_fences(raw);
    let value: Value = serde_json::from_str(stripped)
        .map_err(|err| GeneratorError::envelope(format!("not valid JSON: {err}"), raw))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(GeneratorError::envelope(
            format!("expected a JSON object, got {}", json_type_name(&other)),
            raw,
        )),
    }
}

fn require_string(
    envelope: &Map<String, Value>,
    key: &str,
    raw: &str,
) -> Result<String, GeneratorError> {
    match envelope.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(GeneratorError::envelope(
            format!("`{key}` must be a string, got {}", json_type_name(other)),
            raw,
        )),
        None => Err(GeneratorError::envelope(format!("`{key}` is missing"), raw)),
    }
}

fn require_object(
    envelope: &Map<String, Value>,
    key: &str,
    raw: &str,
) -> Result<Map<String, Value>, GeneratorError> {
    match envelope.get(key) {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(GeneratorError::envelope(
            format!("`{key}` must be an object, got {}", json_type_name(other)),
            raw,
        )),
        None => Err(GeneratorError::envelope(format!("`{key}` is missing"), raw)),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn parse_chat_envelope(raw: &str) -> Result<ChatEnvelope, GeneratorError> {
    let envelope = parse_object(raw)?;
    Ok(ChatEnvelope {
        next_question: require_string(&envelope, "nextQuestion", raw)?,
        updated_user_profile: require_object(&envelope, "updatedUserProfile", raw)?,
    })
}

pub fn parse_regeneration_envelope(raw: &str) -> Result<RegenerationEnvelope, GeneratorError> {
    let envelope = parse_object(raw)?;
    let updated_user_profile = require_object(&envelope, "updatedUserProfile", raw)?;
    let code = require_object(&envelope, "updatedCode", raw)?;
    Ok(RegenerationEnvelope {
        updated_user_profile,
        updated_code: SiteCode {
            markup: require_string(&code, "markup", raw)?,
            style: require_string(&code, "style", raw)?,
            script: require_string(&code, "script", raw)?,
        },
    })
}

/// A vision description is plain text, not JSON; blank output is still
/// a validation failure.
pub fn parse_description(raw: &str) -> Result<String, GeneratorError> {
    let description = strip_code_fences(raw);
    if description.is_empty() {
        return Err(GeneratorError::envelope("empty image description", raw));
    }
    Ok(description.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strips_plain_fence() {
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn unterminated_fence_is_left_alone() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}"), "```json\n{\"a\":1}");
    }

    #[test]
    fn parses_valid_chat_envelope() {
        let raw = r#"{"nextQuestion": "What do you do?", "updatedUserProfile": {"name": "Ada"}}"#;
        let envelope = parse_chat_envelope(raw).unwrap();
        assert_eq!(envelope.next_question, "What do you do?");
        assert_eq!(envelope.updated_user_profile["name"], json!("Ada"));
    }

    #[test]
    fn parses_fenced_chat_envelope() {
        let raw = "```json\n{\"nextQuestion\": \"Hi\", \"updatedUserProfile\": {}}\n```";
        assert!(parse_chat_envelope(raw).is_ok());
    }

    #[test]
    fn chat_envelope_rejects_missing_question() {
        let err = parse_chat_envelope(r#"{"updatedUserProfile": {}}"#).unwrap_err();
        match err {
            crate::GeneratorError::Envelope { reason, .. } => {
                assert!(reason.contains("nextQuestion"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn chat_envelope_rejects_wrong_profile_type() {
        let err =
            parse_chat_envelope(r#"{"nextQuestion": "q", "updatedUserProfile": []}"#).unwrap_err();
        match err {
            crate::GeneratorError::Envelope { reason, .. } => {
                assert!(reason.contains("must be an object"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn envelope_error_preserves_raw_text() {
        let raw = "the model rambled instead of answering";
        match parse_chat_envelope(raw).unwrap_err() {
            crate::GeneratorError::Envelope { raw: kept, .. } => assert_eq!(kept, raw),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parses_regeneration_envelope() {
        let raw = r#"{
            "updatedUserProfile": {"name": "Ada"},
            "updatedCode": {"markup": "<html/>", "style": "body{}", "script": "void 0;"}
        }"#;
        let envelope = parse_regeneration_envelope(raw).unwrap();
        assert_eq!(envelope.updated_code.markup, "<html/>");
        assert_eq!(envelope.updated_code.script, "void 0;");
    }

    #[test]
    fn regeneration_envelope_rejects_partial_code() {
        let raw = r#"{"updatedUserProfile": {}, "updatedCode": {"markup": "<html/>"}}"#;
        let err = parse_regeneration_envelope(raw).unwrap_err();
        match err {
            crate::GeneratorError::Envelope { reason, .. } => {
                assert!(reason.contains("style"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn description_rejects_blank_output() {
        assert!(parse_description("   ").is_err());
        assert_eq!(parse_description("a red bicycle").unwrap(), "a red bicycle");
    }
}
