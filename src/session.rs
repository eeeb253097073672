//! Write-through session sink.
//!
//! The pipeline writes the session's full message list synchronously at
//! every state an external observer must see: the optimistic user turn,
//! each placeholder growth step, and the settled turn.

use crate::types::message::Message;
use std::collections::HashMap;
use std::sync::RwLock;

/// Session store seam. Implementations must be cheap and non-blocking;
/// the pipeline calls `write` from inside its hot streaming loop.
pub trait SessionSink: Send + Sync {
    fn write(&self, session_id: &str, messages: &[Message]);
}

/// In-memory sink for demos and tests.
#[derive(Default)]
pub struct InMemorySession {
    sessions: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .read()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .unwrap()
            .get(session_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id) == 0
    }
}

impl SessionSink for InMemorySession {
    fn write(&self, session_id: &str, messages: &[Message]) {
        self.sessions
            .write()
            .unwrap()
            .insert(session_id.to_string(), messages.to_vec());
    }
}
