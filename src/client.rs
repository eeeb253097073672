//! Turn client: the finite-state retry loop around one send.
//!
//! One `send_turn` call walks the whole pipeline: turn builder, endpoint
//! resolution, the attempt loop with its escalation timers, the dual-mode
//! response read, and settle-time reporting. Each call owns its retry
//! state and correlation token, so concurrent sends never share mutable
//! state.

use crate::attach::{AttachmentSource, Base64FileConverter, PayloadConverter};
use crate::config::BackendConfig;
use crate::observer::{noop_observer, Notice, TurnObserver};
use crate::pipeline::retry::{NoticeTimers, RetryState};
use crate::pipeline::{normalize, reader, report, turn};
use crate::session::{InMemorySession, SessionSink};
use crate::transport::{HttpTransport, Transport};
use crate::types::events::StreamCorrelationToken;
use crate::types::message::{AttachmentPayload, Message};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Per-send delivery stats.
#[derive(Debug, Clone)]
pub struct TurnStats {
    /// Total attempts made, including the successful or terminal one.
    pub attempts: u32,
    pub duration_ms: u128,
    /// Whether the reply arrived token by token.
    pub streamed: bool,
    pub token_count: u32,
    pub http_status: Option<u16>,
}

/// A delivered turn: the settled assistant message plus stats.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: Message,
    pub stats: TurnStats,
}

struct AttemptReply {
    message: Message,
    streamed: bool,
    token_count: u32,
    http_status: u16,
}

/// Client for delivering conversational turns.
pub struct TurnClient {
    config: BackendConfig,
    transport: Arc<dyn Transport>,
    converter: Arc<dyn PayloadConverter>,
    sink: Arc<dyn SessionSink>,
    observer: Arc<dyn TurnObserver>,
}

impl TurnClient {
    pub fn builder() -> TurnClientBuilder {
        TurnClientBuilder::new()
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Deliver one user utterance as a conversational turn.
    ///
    /// The user message is appended to `messages` and written through to
    /// the session sink before any network activity. On success the
    /// settled assistant message is the last element of `messages`; on
    /// terminal failure a fallback assistant reply is appended instead and
    /// the error is returned.
    pub async fn send_turn(
        &self,
        session_id: &str,
        messages: &mut Vec<Message>,
        text: &str,
        attachment: Option<AttachmentSource>,
    ) -> Result<TurnOutcome> {
        let started = Instant::now();
        let correlation = StreamCorrelationToken::generate();

        let turn = turn::build_user_turn(
            text,
            attachment.as_ref(),
            &*self.converter,
            session_id,
            messages,
            &*self.sink,
        )
        .await;

        let url = self.config.resolve_endpoint();
        let body = self.request_body(session_id, &turn.query, turn.message.attachment.as_ref());
        let headers = vec![
            ("X-Task-Label".to_string(), self.config.task_label.clone()),
            (
                "X-Stream-Token".to_string(),
                correlation.as_str().to_string(),
            ),
        ];

        let mut state = RetryState::new(self.config.retry.max_attempts);
        let result = loop {
            self.observer.loading_changed(true);
            self.observer.typing_changed(true);
            let mut timers =
                NoticeTimers::arm(&self.config.notice_schedule, self.observer.clone());

            let attempt_result = self
                .attempt_send(&url, &body, &headers, session_id, messages, &correlation)
                .await;
            timers.disarm();

            match attempt_result {
                Ok(reply) => break Ok(reply),
                Err(e) if e.is_retryable() && state.may_retry() => {
                    info!(
                        attempt = state.settled_attempt(),
                        error = %e,
                        "attempt failed, retrying after fixed delay"
                    );
                    self.observer.notice(Notice::Retrying {
                        attempt: state.settled_attempt(),
                        max_attempts: state.total_attempts(),
                    });
                    tokio::time::sleep(self.config.retry.delay).await;
                    state.attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };

        // Cleared whichever branch terminated the loop.
        self.observer.typing_changed(false);
        self.observer.loading_changed(false);

        match result {
            Ok(reply) => {
                info!(
                    http_status = reply.http_status,
                    attempts = state.settled_attempt(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    streamed = reply.streamed,
                    "turn delivered"
                );
                Ok(TurnOutcome {
                    message: reply.message,
                    stats: TurnStats {
                        attempts: state.settled_attempt(),
                        duration_ms: started.elapsed().as_millis(),
                        streamed: reply.streamed,
                        token_count: reply.token_count,
                        http_status: Some(reply.http_status),
                    },
                })
            }
            Err(error) => {
                report::report_failure(
                    &error,
                    session_id,
                    messages,
                    &*self.sink,
                    &*self.observer,
                );
                Err(error)
            }
        }
    }

    /// One attempt: send, status check, then either the stream reader or a
    /// direct buffered read.
    async fn attempt_send(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(String, String)],
        session_id: &str,
        messages: &mut Vec<Message>,
        correlation: &StreamCorrelationToken,
    ) -> Result<AttemptReply> {
        let reply = self
            .transport
            .send(url, body.clone(), headers.to_vec(), self.config.timeout)
            .await?;
        let http_status = reply.status();

        if !(200..300).contains(&http_status) {
            let body_text = reply.text().await.unwrap_or_default();
            return Err(Error::Remote {
                status: http_status,
                body: body_text,
            });
        }

        if self.config.streaming_enabled {
            let mut ctx = reader::StreamContext {
                session_id,
                messages,
                sink: &*self.sink,
                observer: &*self.observer,
                correlation,
            };
            let outcome = reader::read_stream(reply.into_body(), &mut ctx).await?;
            Ok(AttemptReply {
                message: outcome.message,
                streamed: outcome.saw_any_token,
                token_count: outcome.token_count,
                http_status,
            })
        } else {
            let text = reply.text().await?;
            if text.trim().is_empty() {
                return Err(Error::EmptyReply);
            }
            let message = normalize::normalize_text(&text).into_message();
            messages.push(message.clone());
            self.sink.write(session_id, messages);
            Ok(AttemptReply {
                message,
                streamed: false,
                token_count: 0,
                http_status,
            })
        }
    }

    fn request_body(
        &self,
        session_id: &str,
        query: &str,
        attachment: Option<&AttachmentPayload>,
    ) -> serde_json::Value {
        let mut params = serde_json::json!({
            "module": self.config.module,
            "debug": self.config.debug,
        });
        if let Some(payload) = attachment {
            params["data"] = serde_json::Value::String(payload.data.clone());
            params["mimeType"] = serde_json::Value::String(payload.mime_type.clone());
            params["fileName"] = serde_json::Value::String(payload.file_name.clone());
        }
        serde_json::json!({
            "sessionId": session_id,
            "query": query,
            "params": params,
        })
    }
}

/// Builder for creating clients with custom collaborators.
///
/// Keep this surface area small and predictable (developer-friendly).
pub struct TurnClientBuilder {
    config: Option<BackendConfig>,
    transport: Option<Arc<dyn Transport>>,
    converter: Option<Arc<dyn PayloadConverter>>,
    sink: Option<Arc<dyn SessionSink>>,
    observer: Option<Arc<dyn TurnObserver>>,
}

impl TurnClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            transport: None,
            converter: None,
            sink: None,
            observer: None,
        }
    }

    pub fn config(mut self, config: BackendConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Inject a transport. Defaults to [`HttpTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Inject an attachment converter. Defaults to [`Base64FileConverter`].
    pub fn converter(mut self, converter: Arc<dyn PayloadConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Inject a session sink. Defaults to an [`InMemorySession`].
    pub fn session_sink(mut self, sink: Arc<dyn SessionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Inject an observer. Defaults to a no-op observer.
    pub fn observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<TurnClient> {
        let config = self.config.ok_or_else(|| Error::Configuration {
            message: "backend config is required".to_string(),
        })?;

        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };

        Ok(TurnClient {
            config,
            transport,
            converter: self
                .converter
                .unwrap_or_else(|| Arc::new(Base64FileConverter)),
            sink: self.sink.unwrap_or_else(|| Arc::new(InMemorySession::new())),
            observer: self.observer.unwrap_or_else(noop_observer),
        })
    }
}

impl Default for TurnClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
