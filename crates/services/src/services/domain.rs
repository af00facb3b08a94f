//! Document keys, canonical defaults and load helpers shared by the
//! controllers.

use chrono::{DateTime, Utc};
use generator::{ConversationTurn, SiteCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use store::DocumentStore;

use super::ServiceError;

pub const HISTORY_KEY: &str = "chat-history";
pub const PROFILE_KEY: &str = "user-profile";
pub const SITE_KEY: &str = "site-code";

/// One uploaded image inside `Profile.images`. Records are appended,
/// never removed, until a reset clears the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
    pub description: String,
    pub ai_analysis: String,
}

/// Canonical default profile, restored on reset. The shape is open —
/// the generator may add or drop fields on any turn — but this is the
/// skeleton every fresh profile starts from.
pub fn default_profile() -> Map<String, Value> {
    let Value::Object(map) = json!({
        "name": "",
        "age": "",
        "gender": "",
        "email": "",
        "phone": "",
        "address": "",
        "linkedin": "",
        "github": "",
        "portfolio": "",
        "experience": "",
        "skills": [],
        "languages": [],
        "tools": [],
        "certifications": [],
        "projects": [],
        "college": "",
        "degree": "",
        "fieldOfStudy": "",
        "schooling": "",
        "company": "",
        "role": "",
        "post": "",
        "description": "",
        "interests": [],
        "hobbies": [],
        "goals": "",
        "personality": "",
        "availability": "",
        "preferredLocation": "",
        "expectedSalary": "",
        "noticePeriod": "",
        "achievements": [],
        "volunteering": [],
        "hackathons": [],
        "extracurriculars": [],
        "images": [],
    }) else {
        unreachable!("default profile literal is an object")
    };
    map
}

/// Placeholder site files bootstrapped before the first regeneration.
pub fn default_site_code() -> SiteCode {
    SiteCode {
        markup: "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"utf-8\">\n  <title>Portfolio</title>\n  <link rel=\"stylesheet\" href=\"style.css\">\n</head>\n<body>\n  <main>\n    <h1>Your portfolio</h1>\n    <p>Chat with the assistant to fill in your profile, then regenerate this site.</p>\n  </main>\n  <script src=\"script.js\"></script>\n</body>\n</html>\n".to_string(),
        style: "body {\n  font-family: sans-serif;\n  margin: 2rem auto;\n  max-width: 40rem;\n}\n".to_string(),
        script: "// Generated portfolio script placeholder.\n".to_string(),
    }
}

pub fn load_history(store: &DocumentStore) -> Result<Vec<ConversationTurn>, ServiceError> {
    match store.get(HISTORY_KEY)? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(Vec::new()),
    }
}

pub fn load_profile(store: &DocumentStore) -> Result<Map<String, Value>, ServiceError> {
    match store.get(PROFILE_KEY)? {
        Some(Value::Object(map)) => Ok(map),
        Some(_) | None => Ok(default_profile()),
    }
}

pub fn history_value(history: &[ConversationTurn]) -> Result<Value, ServiceError> {
    Ok(serde_json::to_value(history)?)
}

/// The generator's returned profile replaces the stored document
/// wholesale; that is the documented contract, but losing previously
/// recorded image records that way is worth a trace.
pub fn warn_on_dropped_images(previous: &Map<String, Value>, updated: &Map<String, Value>) {
    let had_images = previous
        .get("images")
        .and_then(Value::as_array)
        .is_some_and(|images| !images.is_empty());
    let keeps_images = updated
        .get("images")
        .and_then(Value::as_array)
        .is_some_and(|images| !images.is_empty());
    if had_images && !keeps_images {
        tracing::warn!("Generator profile update dropped previously recorded image records");
    }
}
