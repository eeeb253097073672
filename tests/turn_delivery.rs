//! Pipeline-level tests over a scripted transport.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use turnstream::observer::{InMemoryObserver, ObserverEvent};
use turnstream::transport::{Transport, TransportError, TransportReply};
use turnstream::{
    BackendConfig, Error, FailureKind, InMemorySession, MessageRole, Notice, TurnClientBuilder,
};

#[derive(Clone)]
enum Script {
    Reply { status: u16, body: &'static str },
    NetworkErr,
    Timeout,
}

/// Transport that plays back a script, then repeats the last entry.
struct ScriptedTransport {
    script: Mutex<VecDeque<Script>>,
    last: Mutex<Option<Script>>,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    fn new(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_script(&self) -> Script {
        let mut queue = self.script.lock().unwrap();
        match queue.pop_front() {
            Some(entry) => {
                *self.last.lock().unwrap() = Some(entry.clone());
                entry
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(Script::NetworkErr),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        _url: &str,
        _body: serde_json::Value,
        _headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> turnstream::Result<TransportReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let entry = self.next_script();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match entry {
            Script::Reply { status, body } => Ok(TransportReply::new(
                status,
                Box::pin(stream::once(async move { Ok(Bytes::from(body)) })),
            )),
            Script::NetworkErr => Err(Error::Transport(TransportError::Other(
                "connection refused".to_string(),
            ))),
            Script::Timeout => Err(Error::Timeout(timeout)),
        }
    }
}

fn fast_config() -> BackendConfig {
    let mut config = BackendConfig::new("http://backend.test/api");
    config.retry.delay = Duration::from_millis(1);
    config.notice_schedule = Vec::new();
    config
}

struct Harness {
    client: turnstream::TurnClient,
    session: Arc<InMemorySession>,
    observer: Arc<InMemoryObserver>,
    transport: Arc<ScriptedTransport>,
}

fn harness(config: BackendConfig, transport: ScriptedTransport) -> Harness {
    let session = Arc::new(InMemorySession::new());
    let observer = Arc::new(InMemoryObserver::new());
    let transport = Arc::new(transport);
    let client = TurnClientBuilder::new()
        .config(config)
        .transport(transport.clone())
        .session_sink(session.clone())
        .observer(observer.clone())
        .build()
        .unwrap();
    Harness {
        client,
        session,
        observer,
        transport,
    }
}

#[tokio::test]
async fn streamed_tokens_assemble_the_assistant_turn() {
    let h = harness(
        fast_config(),
        ScriptedTransport::new(vec![Script::Reply {
            status: 200,
            body: "\"Hel\"\n\"lo\"\n",
        }]),
    );

    let mut messages = Vec::new();
    let outcome = h
        .client
        .send_turn("t/s", &mut messages, "Hello", None)
        .await
        .unwrap();

    assert_eq!(outcome.message.content, "Hello");
    assert!(outcome.stats.streamed);
    assert_eq!(outcome.stats.token_count, 2);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn buffered_mode_normalizes_the_single_document() {
    let h = harness(
        fast_config().streaming(false),
        ScriptedTransport::new(vec![Script::Reply {
            status: 200,
            body: "{\"output\":\"Hi there\"}",
        }]),
    );

    let mut messages = Vec::new();
    let outcome = h
        .client
        .send_turn("t/s", &mut messages, "Hello", None)
        .await
        .unwrap();

    assert_eq!(outcome.message.content, "Hi there");
    assert!(!outcome.stats.streamed);
}

#[tokio::test]
async fn user_turn_is_durable_before_any_network_call() {
    // The transport fails outright; the user message must already be in
    // the session when the send settles.
    let h = harness(
        fast_config(),
        ScriptedTransport::new(vec![Script::NetworkErr]),
    );

    let mut messages = Vec::new();
    let result = h.client.send_turn("t/s", &mut messages, "keep me", None).await;

    assert!(result.is_err());
    let stored = h.session.messages("t/s");
    assert_eq!(stored[0].content, "keep me");
    assert_eq!(stored[0].role, MessageRole::User);
}

#[tokio::test]
async fn two_transient_failures_then_success_still_delivers() {
    let h = harness(
        fast_config(),
        ScriptedTransport::new(vec![
            Script::NetworkErr,
            Script::Timeout,
            Script::Reply {
                status: 200,
                body: "\"recovered\"\n",
            },
        ]),
    );

    let mut messages = Vec::new();
    let outcome = h
        .client
        .send_turn("t/s", &mut messages, "Hello", None)
        .await
        .unwrap();

    assert_eq!(outcome.message.content, "recovered");
    assert_eq!(outcome.stats.attempts, 3);
    assert_eq!(h.transport.calls(), 3);

    let retries: Vec<_> = h
        .observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ObserverEvent::Notice(Notice::Retrying { attempt, .. }) => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![1, 2]);
}

#[tokio::test]
async fn retry_budget_is_exactly_three_attempts() {
    let h = harness(
        fast_config(),
        ScriptedTransport::new(vec![Script::Reply {
            status: 500,
            body: "boom",
        }]),
    );

    let mut messages = Vec::new();
    let result = h.client.send_turn("t/s", &mut messages, "Hello", None).await;

    assert!(matches!(result, Err(Error::Remote { status: 500, .. })));
    assert_eq!(h.transport.calls(), 3);
}

#[tokio::test]
async fn terminal_failure_appends_exactly_one_fallback_turn() {
    let h = harness(
        fast_config(),
        ScriptedTransport::new(vec![Script::Reply {
            status: 500,
            body: "boom",
        }]),
    );

    let mut messages = Vec::new();
    let result = h.client.send_turn("t/s", &mut messages, "Hello", None).await;
    assert!(result.is_err());

    // One user turn plus one fallback assistant turn, never just one.
    let stored = h.session.messages("t/s");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].role, MessageRole::Assistant);
    assert!(!stored[1].content.is_empty());

    let failures: Vec<_> = h
        .observer
        .events()
        .into_iter()
        .filter(|e| matches!(e, ObserverEvent::Notice(Notice::Failed(_))))
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0],
        ObserverEvent::Notice(Notice::Failed(FailureKind::Server))
    ));
}

#[tokio::test]
async fn unauthorized_fails_without_retry() {
    let h = harness(
        fast_config(),
        ScriptedTransport::new(vec![Script::Reply {
            status: 401,
            body: "denied",
        }]),
    );

    let mut messages = Vec::new();
    let result = h.client.send_turn("t/s", &mut messages, "Hello", None).await;

    assert!(matches!(result, Err(Error::Remote { status: 401, .. })));
    assert_eq!(h.transport.calls(), 1);
    assert!(h
        .observer
        .events()
        .contains(&ObserverEvent::Notice(Notice::Failed(
            FailureKind::Unauthorized
        ))));
}

#[tokio::test]
async fn indicators_end_false_on_every_branch() {
    for script in [
        vec![Script::Reply {
            status: 200,
            body: "\"ok\"\n",
        }],
        vec![Script::Reply {
            status: 500,
            body: "boom",
        }],
    ] {
        let h = harness(fast_config(), ScriptedTransport::new(script));
        let mut messages = Vec::new();
        let _ = h.client.send_turn("t/s", &mut messages, "Hello", None).await;

        let events = h.observer.events();
        let last_loading = events
            .iter()
            .rev()
            .find_map(|e| match e {
                ObserverEvent::Loading(v) => Some(*v),
                _ => None,
            });
        let last_typing = events.iter().rev().find_map(|e| match e {
            ObserverEvent::Typing(v) => Some(*v),
            _ => None,
        });
        assert_eq!(last_loading, Some(false));
        assert_eq!(last_typing, Some(false));
    }
}

#[tokio::test]
async fn escalation_notices_fire_while_an_attempt_is_outstanding() {
    let mut config = fast_config();
    config.notice_schedule = vec![Duration::from_millis(20)];

    let h = harness(
        config,
        ScriptedTransport::new(vec![Script::Reply {
            status: 200,
            body: "\"slow\"\n",
        }])
        .with_delay(Duration::from_millis(80)),
    );

    let mut messages = Vec::new();
    h.client
        .send_turn("t/s", &mut messages, "Hello", None)
        .await
        .unwrap();

    assert!(h.observer.events().iter().any(|e| matches!(
        e,
        ObserverEvent::Notice(Notice::StillWorking { .. })
    )));
}

#[tokio::test]
async fn timers_disarm_when_the_attempt_settles_quickly() {
    let mut config = fast_config();
    config.notice_schedule = vec![Duration::from_millis(40)];

    let h = harness(
        config,
        ScriptedTransport::new(vec![Script::Reply {
            status: 200,
            body: "\"fast\"\n",
        }]),
    );

    let mut messages = Vec::new();
    h.client
        .send_turn("t/s", &mut messages, "Hello", None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(!h.observer.events().iter().any(|e| matches!(
        e,
        ObserverEvent::Notice(Notice::StillWorking { .. })
    )));
}

#[tokio::test]
async fn concurrent_sends_do_not_share_state() {
    let h = Arc::new(harness(
        fast_config(),
        ScriptedTransport::new(vec![Script::Reply {
            status: 200,
            body: "\"reply\"\n",
        }]),
    ));

    let a = {
        let h = h.clone();
        tokio::spawn(async move {
            let mut messages = Vec::new();
            h.client
                .send_turn("session-a", &mut messages, "first", None)
                .await
                .map(|o| o.message.content)
        })
    };
    let b = {
        let h = h.clone();
        tokio::spawn(async move {
            let mut messages = Vec::new();
            h.client
                .send_turn("session-b", &mut messages, "second", None)
                .await
                .map(|o| o.message.content)
        })
    };

    assert_eq!(a.await.unwrap().unwrap(), "reply");
    assert_eq!(b.await.unwrap().unwrap(), "reply");
    assert_eq!(h.session.len("session-a"), 2);
    assert_eq!(h.session.len("session-b"), 2);
}
