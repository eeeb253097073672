//! Turn builder.
//!
//! Constructs the outgoing user message and performs the optimistic
//! session update: the user's turn is durable before any network activity
//! begins and is never retroactively altered.

use crate::attach::{AttachmentSource, PayloadConverter};
use crate::session::SessionSink;
use crate::types::message::Message;

/// A built user turn: the appended message plus the exact text to
/// transmit.
pub struct UserTurn {
    pub message: Message,
    /// Untouched original input. The display content may have a directive
    /// parsed out, but the backend always receives this string.
    pub query: String,
}

/// Parse an optional leading `[bracketed]` directive for display purposes.
/// Returns the directive and the remaining display text.
fn split_directive(text: &str) -> (Option<String>, &str) {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let tag = rest[..end].trim();
            if !tag.is_empty() {
                return (Some(tag.to_string()), rest[end + 1..].trim_start());
            }
        }
    }
    (None, text)
}

/// Build the user message, append it, and write the session through.
///
/// Attachment conversion is best-effort: a converter failure logs a
/// warning and the text still goes out.
pub(crate) async fn build_user_turn(
    raw_text: &str,
    attachment: Option<&AttachmentSource>,
    converter: &dyn PayloadConverter,
    session_id: &str,
    messages: &mut Vec<Message>,
    sink: &dyn SessionSink,
) -> UserTurn {
    let (directive, display) = split_directive(raw_text);

    let mut message = Message::user(display);
    message.directive = directive;

    if let Some(source) = attachment {
        match converter.to_payload(source).await {
            Ok(payload) => message.attachment = Some(payload),
            Err(e) => {
                tracing::warn!(error = %e, "attachment conversion failed, sending text only");
            }
        }
    }

    messages.push(message.clone());
    sink.write(session_id, messages);

    UserTurn {
        message,
        query: raw_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_directive_is_parsed_for_display() {
        let (directive, display) = split_directive("[excited] hello there");
        assert_eq!(directive.as_deref(), Some("excited"));
        assert_eq!(display, "hello there");
    }

    #[test]
    fn unterminated_or_empty_brackets_are_left_alone() {
        assert_eq!(split_directive("[oops no close"), (None, "[oops no close"));
        assert_eq!(split_directive("[] hi"), (None, "[] hi"));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(split_directive("hello"), (None, "hello"));
    }
}
