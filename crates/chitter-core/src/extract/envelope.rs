//! Agent output shapes
//!
//! Hosts hand back either plain text or a structured response. The shape
//! is resolved here, once, so the extraction stages only ever see text.

use serde_json::Value;

/// An agent's output as delivered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutput {
    PlainText(String),
    /// Structured response that still needs unwrapping
    Envelope(Value),
}

impl AgentOutput {
    /// Classify a raw string: JSON objects and arrays are envelopes,
    /// anything else is plain text.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<Value>(raw) {
                return Self::from_value(value);
            }
        }
        Self::PlainText(raw.to_string())
    }

    /// Classify an already-parsed JSON value
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::PlainText(text),
            Value::Null => Self::PlainText(String::new()),
            other => Self::Envelope(other),
        }
    }

    /// The text to scan.
    ///
    /// For an envelope: the joined `text` parts of a `content` array, else a
    /// top-level `text` field, else the compact JSON itself.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::PlainText(text) => text.clone(),
            Self::Envelope(value) => unwrap_envelope(value),
        }
    }
}

fn unwrap_envelope(value: &Value) -> String {
    if let Some(parts) = value.get("content").and_then(Value::as_array) {
        return parts
            .iter()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
    }
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        return text.to_string();
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_content_parts_are_joined() {
        let output = AgentOutput::from_value(json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "name": "ignored"},
                {"type": "text", "text": "second"}
            ]
        }));
        assert_eq!(output.text(), "first\nsecond");
    }

    #[test]
    fn test_text_field_is_used() {
        let output = AgentOutput::from_raw(r#"{"text": "We decided to use Postgres"}"#);
        assert_eq!(output.text(), "We decided to use Postgres");
    }

    #[test]
    fn test_json_string_is_plain_text() {
        assert_eq!(
            AgentOutput::from_value(json!("hello")),
            AgentOutput::PlainText("hello".into())
        );
    }

    #[test]
    fn test_unknown_shape_falls_back_to_json() {
        let output = AgentOutput::from_value(json!({"status": "ok"}));
        assert_eq!(output.text(), r#"{"status":"ok"}"#);
    }

    #[test]
    fn test_non_json_raw_text_is_kept() {
        let raw = "{ this is not json but starts with a brace";
        assert_eq!(AgentOutput::from_raw(raw).text(), raw);
        assert_eq!(AgentOutput::from_raw("42").text(), "42");
    }
}
