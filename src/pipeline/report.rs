//! Failure reporter.
//!
//! Maps the terminal error to a user-facing category, emits exactly one
//! notice, and appends one fallback assistant reply so the conversation
//! never ends on an orphaned user turn.

use crate::observer::{FailureKind, Notice, TurnObserver};
use crate::session::SessionSink;
use crate::types::message::Message;
use crate::Error;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pre-authored "could not respond" variants. Selection rotates so
/// repeated failures do not read identically.
const FALLBACK_REPLIES: [&str; 4] = [
    "I couldn't put a response together this time. Could you try sending that again?",
    "Something went wrong on my end before I could answer. Please give it another go.",
    "I wasn't able to respond just now. Your message is safe; try once more in a moment.",
    "My reply didn't make it through. Mind re-sending that?",
];

static NEXT_REPLY: AtomicUsize = AtomicUsize::new(0);

fn fallback_reply() -> &'static str {
    let idx = NEXT_REPLY.fetch_add(1, Ordering::Relaxed);
    FALLBACK_REPLIES[idx % FALLBACK_REPLIES.len()]
}

/// Classify a terminal error into its user-facing category.
pub fn classify(error: &Error) -> FailureKind {
    match error {
        Error::Timeout(_) => FailureKind::Timeout,
        Error::Transport(_) => FailureKind::Network,
        Error::Remote { status: 401, .. } => FailureKind::Unauthorized,
        Error::Remote { status, .. } if (500..=599).contains(status) => FailureKind::Server,
        _ => FailureKind::Unclassified,
    }
}

/// Handle a terminal failure: one notice, one fallback assistant turn,
/// one write-through.
pub(crate) fn report_failure(
    error: &Error,
    session_id: &str,
    messages: &mut Vec<Message>,
    sink: &dyn SessionSink,
    observer: &dyn TurnObserver,
) -> FailureKind {
    let kind = classify(error);
    tracing::error!(
        error = %error,
        category = ?kind,
        "turn delivery failed terminally"
    );
    observer.notice(Notice::Failed(kind));

    messages.push(Message::assistant(fallback_reply()));
    sink.write(session_id, messages);

    kind
}
