//! Message model for one conversational turn.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Unit of conversation.
///
/// Content is mutable while streaming and immutable once the owning send
/// settles; a terminal failure appends a fallback assistant message rather
/// than mutating a partial one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub point_of_view: Vec<PovEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_thought: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative_thought: Option<String>,
    /// Leading bracketed directive parsed out of the raw text for display.
    /// The transmitted query always carries the untouched original text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: SystemTime::now(),
            attachment: None,
            thoughts: None,
            point_of_view: Vec::new(),
            logical_thought: None,
            creative_thought: None,
            directive: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One point-of-view entry from a backend reply. Entries are not unique per
/// type; derivation applies first-match-wins per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PovEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub thought: String,
}

/// Converted binary attachment riding along with a user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPayload {
    /// Base64-encoded payload.
    pub data: String,
    pub mime_type: String,
    pub file_name: String,
}
