//! Response normalizer.
//!
//! Backends answer in several wrapper shapes: a bare object, a
//! single-element array around one, synonym content fields, or a nested
//! `output` string that itself needs parsing. The normalizer is a closed
//! matcher over those shapes, pure and total: it never panics and unmapped
//! content degrades to the empty string.

use crate::types::message::{Message, PovEntry};
use serde_json::Value;

/// Content candidates in priority order. First non-empty wins.
const CONTENT_FIELDS: [&str; 4] = ["content", "response", "answer", "text"];

/// Fields whose presence marks a JSON value as a structured reply envelope
/// rather than a plain token.
const ENVELOPE_FIELDS: [&str; 7] = [
    "content",
    "response",
    "answer",
    "text",
    "output",
    "thoughts",
    "pointOfView",
];

/// Everything the normalizer can extract from one reply payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedReply {
    pub content: String,
    pub thoughts: Option<String>,
    pub point_of_view: Vec<PovEntry>,
    pub logical_thought: Option<String>,
    pub creative_thought: Option<String>,
}

impl NormalizedReply {
    fn literal(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Build a fresh assistant message from this reply.
    pub fn into_message(self) -> Message {
        let mut message = Message::assistant(String::new());
        self.merge_into(&mut message, true);
        message
    }

    /// Merge into an existing message. Content is only replaced when
    /// `replace_content` is set — streamed tokens always win over the
    /// envelope's own content field.
    pub fn merge_into(self, message: &mut Message, replace_content: bool) {
        if replace_content {
            message.content = self.content;
        }
        if self.thoughts.is_some() {
            message.thoughts = self.thoughts;
        }
        if !self.point_of_view.is_empty() {
            message.point_of_view = self.point_of_view;
        }
        if self.logical_thought.is_some() {
            message.logical_thought = self.logical_thought;
        }
        if self.creative_thought.is_some() {
            message.creative_thought = self.creative_thought;
        }
    }
}

/// Unwrap the single-element-array wrapper some backends add.
fn unwrap_payload(payload: &Value) -> &Value {
    match payload {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

/// Whether a decoded stream frame is a structured envelope.
pub(crate) fn looks_like_envelope(payload: &Value) -> bool {
    unwrap_payload(payload)
        .as_object()
        .map(|map| ENVELOPE_FIELDS.iter().any(|field| map.contains_key(*field)))
        .unwrap_or(false)
}

/// Extract content and reasoning fields from an arbitrary JSON payload.
pub fn normalize(payload: &Value) -> NormalizedReply {
    let payload = unwrap_payload(payload);
    let map = match payload.as_object() {
        Some(map) => map,
        None => return NormalizedReply::default(),
    };

    let mut reply = NormalizedReply::default();

    for field in CONTENT_FIELDS {
        if let Some(text) = map.get(field).and_then(Value::as_str) {
            if !text.is_empty() {
                reply.content = text.to_string();
                break;
            }
        }
    }

    // A nested `output` string may itself be a serialized envelope.
    if reply.content.is_empty() {
        if let Some(output) = map.get("output").and_then(Value::as_str) {
            match serde_json::from_str::<Value>(output) {
                Ok(inner) if looks_like_envelope(&inner) => {
                    let inner_reply = normalize(&inner);
                    reply.content = inner_reply.content;
                    if reply.thoughts.is_none() {
                        reply.thoughts = inner_reply.thoughts;
                    }
                    if reply.point_of_view.is_empty() {
                        reply.point_of_view = inner_reply.point_of_view;
                    }
                }
                _ => reply.content = output.to_string(),
            }
        }
    }

    if let Some(thoughts) = map.get("thoughts").and_then(Value::as_str) {
        if reply.thoughts.is_none() {
            reply.thoughts = Some(thoughts.to_string());
        }
    }

    if let Some(entries) = map.get("pointOfView").and_then(Value::as_array) {
        if reply.point_of_view.is_empty() {
            reply.point_of_view = parse_pov_entries(entries);
        }
    }

    let (logical, creative) = derive_thoughts(&reply.point_of_view);
    reply.logical_thought = logical;
    reply.creative_thought = creative;

    reply
}

/// Structured parse first, then literal text. Used for the no-token
/// fallback and for buffered bodies.
pub fn normalize_text(raw: &str) -> NormalizedReply {
    let trimmed = raw.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => normalize(&value),
        _ => NormalizedReply::literal(raw),
    }
}

/// Malformed entries (non-string type or thought) are skipped.
fn parse_pov_entries(entries: &[Value]) -> Vec<PovEntry> {
    entries
        .iter()
        .filter_map(|entry| {
            let kind = entry.get("type")?.as_str()?;
            let thought = entry.get("thought")?.as_str()?;
            Some(PovEntry {
                kind: kind.to_string(),
                thought: thought.to_string(),
            })
        })
        .collect()
}

/// Derive at most one logical and one creative thought. First match per
/// category wins; later matching entries are ignored.
fn derive_thoughts(entries: &[PovEntry]) -> (Option<String>, Option<String>) {
    let mut logical = None;
    let mut creative = None;
    for entry in entries {
        let kind = entry.kind.to_lowercase();
        if logical.is_none() && kind.contains("logic") {
            logical = Some(entry.thought.clone());
        }
        if creative.is_none() && kind.contains("creativ") {
            creative = Some(entry.thought.clone());
        }
    }
    (logical, creative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_fields_resolve_in_priority_order() {
        let reply = normalize(&json!({"response": "b", "content": "a"}));
        assert_eq!(reply.content, "a");

        let reply = normalize(&json!({"text": "d", "answer": "c"}));
        assert_eq!(reply.content, "c");
    }

    #[test]
    fn empty_candidates_fall_through() {
        let reply = normalize(&json!({"content": "", "response": "fallback"}));
        assert_eq!(reply.content, "fallback");
    }

    #[test]
    fn single_element_array_wrapper_is_unwrapped() {
        let reply = normalize(&json!([{"output": "wrapped"}]));
        assert_eq!(reply.content, "wrapped");
    }

    #[test]
    fn nested_output_string_is_parsed() {
        let inner = json!({"content": "inner text"}).to_string();
        let reply = normalize(&json!({"output": inner}));
        assert_eq!(reply.content, "inner text");
    }

    #[test]
    fn plain_output_string_is_content() {
        let reply = normalize(&json!({"output": "Hi there"}));
        assert_eq!(reply.content, "Hi there");
    }

    #[test]
    fn unmapped_shapes_default_to_empty() {
        assert_eq!(normalize(&json!(42)).content, "");
        assert_eq!(normalize(&json!({"foo": 1})).content, "");
        assert_eq!(normalize(&json!([1, 2])).content, "");
    }

    #[test]
    fn pov_derivation_is_first_match_per_category() {
        let reply = normalize(&json!({
            "content": "x",
            "pointOfView": [
                {"type": "Creative-thought", "thought": "A"},
                {"type": "LOGICAL", "thought": "B"},
                {"type": "logic", "thought": "ignored"},
            ]
        }));
        assert_eq!(reply.creative_thought.as_deref(), Some("A"));
        assert_eq!(reply.logical_thought.as_deref(), Some("B"));
    }

    #[test]
    fn pov_derivation_is_idempotent() {
        let payload = json!({
            "content": "x",
            "pointOfView": [
                {"type": "logical", "thought": "L"},
                {"type": "creative", "thought": "C"},
            ]
        });
        assert_eq!(normalize(&payload), normalize(&payload));
    }

    #[test]
    fn malformed_pov_entries_are_skipped() {
        let reply = normalize(&json!({
            "content": "x",
            "pointOfView": [
                {"type": "logical", "thought": 7},
                {"type": "logical", "thought": "kept"},
                {"thought": "no type"},
            ]
        }));
        assert_eq!(reply.point_of_view.len(), 1);
        assert_eq!(reply.logical_thought.as_deref(), Some("kept"));
    }

    #[test]
    fn normalize_text_falls_back_to_literal() {
        assert_eq!(normalize_text("just words").content, "just words");
        assert_eq!(
            normalize_text("{\"output\":\"parsed\"}").content,
            "parsed"
        );
    }

    #[test]
    fn thoughts_field_is_extracted() {
        let reply = normalize(&json!({"content": "x", "thoughts": "pondering"}));
        assert_eq!(reply.thoughts.as_deref(), Some("pondering"));
    }
}
