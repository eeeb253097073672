//! Stream event sum type and the per-send correlation token.

use std::fmt;
use uuid::Uuid;

/// Decoded unit of a streamable response body.
///
/// The reader consumes these in a single loop that owns the
/// `saw_any_token` flag; classification happens at decode time.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Plain text token, appended verbatim to the assistant placeholder.
    Token(String),
    /// The single terminal structured envelope, matching the buffered
    /// response shape. Its auxiliary fields are merged into the placeholder;
    /// its content is used only when no token was streamed.
    Envelope(serde_json::Value),
    /// Mid-stream protocol error. Surfaced to the observer, never escalated
    /// to the retry loop; the pipeline salvages whatever was accumulated.
    Protocol {
        message: String,
        raw: Option<String>,
    },
}

/// Opaque per-send token pairing stream-start/stream-end notifications with
/// the specific in-flight request, so racing sends cannot cross-talk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamCorrelationToken(String);

impl StreamCorrelationToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamCorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
