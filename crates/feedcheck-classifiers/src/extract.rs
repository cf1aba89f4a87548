//! Structured payload recovery from model output
//!
//! Models are told to answer with JSON only but regularly wrap it in prose or
//! a fenced code block. Strict parsing runs first; on failure a single
//! best-effort extraction locates an embedded object and parses it.

use crate::client::AttemptError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn fenced_block() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("static regex is valid")
    })
}

/// Parse a model response into a JSON object
pub fn parse_payload(content: &str) -> Result<Value, AttemptError> {
    let trimmed = content.trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let fragment = embedded_fragment(trimmed).ok_or_else(|| {
        AttemptError::Parse(format!("no JSON object in response: {}", preview(trimmed)))
    })?;

    match serde_json::from_str::<Value>(fragment) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(AttemptError::Parse("embedded JSON is not an object".to_string())),
        Err(e) => Err(AttemptError::Parse(format!(
            "embedded JSON is malformed ({e}): {}",
            preview(fragment)
        ))),
    }
}

/// Locate a candidate JSON object: a fenced block first, else the outermost braces
pub fn embedded_fragment(content: &str) -> Option<&str> {
    if let Some(caps) = fenced_block().captures(content) {
        return caps.get(1).map(|m| m.as_str());
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(200).collect();
    if text.chars().count() > 200 {
        out.push_str("...");
    }
    out
}
