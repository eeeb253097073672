//! Indicator, notice and stream-lifecycle subscriptions.
//!
//! Loading/typing flags are explicit per-send state exposed through this
//! observer seam rather than ambient globals; one pipeline instance drives
//! one observer per send, so racing sends cannot cross-talk.

use crate::types::events::StreamCorrelationToken;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// User-facing failure categories for terminal outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Network,
    Unauthorized,
    Server,
    Unclassified,
}

impl FailureKind {
    /// Category-specific wording for the single terminal-failure notice.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "The backend took too long to respond.",
            FailureKind::Network => "Could not reach the backend. Check your connection.",
            FailureKind::Unauthorized => "The backend rejected the request credentials.",
            FailureKind::Server => "The backend hit an internal error.",
            FailureKind::Unclassified => "Something went wrong while sending your message.",
        }
    }
}

/// Informational notices emitted by the retry loop and the reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The request is still outstanding after an escalation threshold.
    /// Purely advisory; nothing is aborted or retried.
    StillWorking { elapsed: Duration },
    /// A retryable failure settled attempt `attempt` of `max_attempts`
    /// total; the loop re-enters after the fixed delay.
    Retrying { attempt: u32, max_attempts: u32 },
    /// Terminal failure, emitted exactly once per failed send.
    Failed(FailureKind),
}

/// Per-send subscription surface. All methods default to no-ops so
/// implementors pick only what they render.
pub trait TurnObserver: Send + Sync {
    fn loading_changed(&self, _active: bool) {}
    fn typing_changed(&self, _active: bool) {}
    fn notice(&self, _notice: Notice) {}
    fn stream_started(&self, _token: &StreamCorrelationToken) {}
    fn stream_ended(&self, _token: &StreamCorrelationToken) {}
    /// Mid-stream protocol error: surfaced as a transient notice while the
    /// pipeline salvages accumulated content. Never triggers a retry.
    fn stream_error(&self, _message: &str, _raw: Option<&str>) {}
}

/// Default no-op observer.
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

pub fn noop_observer() -> Arc<dyn TurnObserver> {
    Arc::new(NoopObserver)
}

/// Recorded observer event, for tests and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    Loading(bool),
    Typing(bool),
    Notice(Notice),
    StreamStarted(String),
    StreamEnded(String),
    StreamError(String),
}

/// In-memory observer for tests.
#[derive(Default)]
pub struct InMemoryObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl InMemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: ObserverEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl TurnObserver for InMemoryObserver {
    fn loading_changed(&self, active: bool) {
        self.push(ObserverEvent::Loading(active));
    }

    fn typing_changed(&self, active: bool) {
        self.push(ObserverEvent::Typing(active));
    }

    fn notice(&self, notice: Notice) {
        self.push(ObserverEvent::Notice(notice));
    }

    fn stream_started(&self, token: &StreamCorrelationToken) {
        self.push(ObserverEvent::StreamStarted(token.as_str().to_string()));
    }

    fn stream_ended(&self, token: &StreamCorrelationToken) {
        self.push(ObserverEvent::StreamEnded(token.as_str().to_string()));
    }

    fn stream_error(&self, message: &str, _raw: Option<&str>) {
        self.push(ObserverEvent::StreamError(message.to_string()));
    }
}

/// Fans every event out to multiple observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn TurnObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl TurnObserver for CompositeObserver {
    fn loading_changed(&self, active: bool) {
        for o in &self.observers {
            o.loading_changed(active);
        }
    }

    fn typing_changed(&self, active: bool) {
        for o in &self.observers {
            o.typing_changed(active);
        }
    }

    fn notice(&self, notice: Notice) {
        for o in &self.observers {
            o.notice(notice.clone());
        }
    }

    fn stream_started(&self, token: &StreamCorrelationToken) {
        for o in &self.observers {
            o.stream_started(token);
        }
    }

    fn stream_ended(&self, token: &StreamCorrelationToken) {
        for o in &self.observers {
            o.stream_ended(token);
        }
    }

    fn stream_error(&self, message: &str, raw: Option<&str>) {
        for o in &self.observers {
            o.stream_error(message, raw);
        }
    }
}
