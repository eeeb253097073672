//! Stream reader adapter.
//!
//! Decodes a chunked response body into [`StreamEvent`]s and assembles the
//! assistant turn in a single loop that owns the `saw_any_token` flag. The
//! decoder is framing-tolerant: newline-delimited JSON and `data:`-prefixed
//! server-sent-event lines both resolve to the same event sum type.

use crate::observer::TurnObserver;
use crate::pipeline::normalize::{self, looks_like_envelope};
use crate::session::SessionSink;
use crate::types::events::{StreamCorrelationToken, StreamEvent};
use crate::types::message::Message;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

pub(crate) type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send + 'static>>;

/// What one settled read produced.
pub(crate) struct ReadOutcome {
    pub message: Message,
    pub saw_any_token: bool,
    pub token_count: u32,
}

/// Per-send collaborators the reader writes through.
pub(crate) struct StreamContext<'a> {
    pub session_id: &'a str,
    pub messages: &'a mut Vec<Message>,
    pub sink: &'a dyn SessionSink,
    pub observer: &'a dyn TurnObserver,
    pub correlation: &'a StreamCorrelationToken,
}

enum FrameOutcome {
    Event(StreamEvent),
    Skip,
    Done,
}

/// One decoded line. SSE comment lines are skipped, the `data:` prefix is
/// stripped, and the `[DONE]` signal ends the stream.
fn frame_event(line: &str) -> FrameOutcome {
    if line.is_empty() || line.starts_with(':') {
        return FrameOutcome::Skip;
    }
    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.trim_start(),
        None => line,
    };
    if payload.is_empty() {
        return FrameOutcome::Skip;
    }
    if payload == "[DONE]" {
        return FrameOutcome::Done;
    }
    FrameOutcome::Event(classify_frame(payload))
}

/// A JSON string frame is a token; a JSON value carrying a known payload
/// field is the envelope; anything else is appended verbatim as a token.
fn classify_frame(payload: &str) -> StreamEvent {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::String(token)) => StreamEvent::Token(token),
        Ok(value) if looks_like_envelope(&value) => StreamEvent::Envelope(value),
        _ => StreamEvent::Token(payload.to_string()),
    }
}

/// Decode a byte stream into events, keeping a transcript of every byte
/// read. The transcript backs the no-token fallback parse after the
/// stream ends.
pub(crate) fn decode_events(
    input: BoxStream<'static, Bytes>,
) -> (EventStream, Arc<Mutex<String>>) {
    let transcript = Arc::new(Mutex::new(String::new()));
    let raw = transcript.clone();

    // Incrementally buffer bytes and emit one event per complete frame.
    let stream = stream::unfold(
        (input, String::new(), false),
        move |(mut input, mut buf, done)| {
            let raw = raw.clone();
            async move {
                if done {
                    return None;
                }
                loop {
                    if let Some(idx) = buf.find('\n') {
                        let line = buf[..idx].trim().to_string();
                        buf = buf[idx + 1..].to_string();
                        match frame_event(&line) {
                            FrameOutcome::Skip => continue,
                            FrameOutcome::Done => return None,
                            FrameOutcome::Event(event) => {
                                return Some((event, (input, buf, false)))
                            }
                        }
                    }

                    match input.next().await {
                        Some(Ok(bytes)) => {
                            let text = String::from_utf8_lossy(&bytes).into_owned();
                            raw.lock().unwrap().push_str(&text);
                            buf.push_str(&text);
                        }
                        Some(Err(e)) => {
                            return Some((
                                StreamEvent::Protocol {
                                    message: e.to_string(),
                                    raw: None,
                                },
                                (input, buf, true),
                            ));
                        }
                        None => {
                            // EOF: classify the remaining buffer once.
                            let line = buf.trim().to_string();
                            if line.is_empty() {
                                return None;
                            }
                            match frame_event(&line) {
                                FrameOutcome::Event(event) => {
                                    return Some((event, (input, String::new(), true)))
                                }
                                _ => return None,
                            }
                        }
                    }
                }
            }
        },
    );

    (Box::pin(stream), transcript)
}

/// Consume a streamable body and assemble the assistant turn.
///
/// The placeholder message is created lazily on the first decoded event
/// and mutated in place from then on; every mutation is written through to
/// the session sink so observers always see the latest partial content.
pub(crate) async fn read_stream(
    body: BoxStream<'static, Bytes>,
    ctx: &mut StreamContext<'_>,
) -> Result<ReadOutcome> {
    let (mut events, transcript) = decode_events(body);

    let mut saw_any_token = false;
    let mut token_count: u32 = 0;
    let mut envelope: Option<Value> = None;
    let mut placeholder: Option<usize> = None;

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Token(token) => {
                let idx = ensure_placeholder(ctx, &mut placeholder);
                ctx.messages[idx].content.push_str(&token);
                ctx.sink.write(ctx.session_id, ctx.messages);
                saw_any_token = true;
                token_count += 1;
            }
            StreamEvent::Envelope(value) => {
                ensure_placeholder(ctx, &mut placeholder);
                envelope = Some(value);
            }
            StreamEvent::Protocol { message, raw } => {
                tracing::warn!(error = message.as_str(), "stream read error, salvaging");
                ctx.observer.stream_error(&message, raw.as_deref());
            }
        }
    }

    let raw_buffer = transcript.lock().unwrap().clone();

    if saw_any_token {
        // Streamed tokens are the content; the envelope only contributes
        // auxiliary fields.
        if let (Some(value), Some(idx)) = (envelope, placeholder) {
            normalize::normalize(&value).merge_into(&mut ctx.messages[idx], false);
        }
    } else if let Some(value) = envelope {
        let idx = ensure_placeholder(ctx, &mut placeholder);
        normalize::normalize(&value).merge_into(&mut ctx.messages[idx], true);
    } else if !raw_buffer.trim().is_empty() {
        // No token ever arrived: treat the whole transcript as one buffered
        // response, structured parse first, literal text second.
        let idx = ensure_placeholder(ctx, &mut placeholder);
        normalize::normalize_text(&raw_buffer).merge_into(&mut ctx.messages[idx], true);
    }

    let idx = match placeholder {
        Some(idx) => idx,
        None => return Err(Error::EmptyReply),
    };

    ctx.sink.write(ctx.session_id, ctx.messages);
    ctx.observer.typing_changed(false);
    ctx.observer.stream_ended(ctx.correlation);

    Ok(ReadOutcome {
        message: ctx.messages[idx].clone(),
        saw_any_token,
        token_count,
    })
}

fn ensure_placeholder(ctx: &mut StreamContext<'_>, placeholder: &mut Option<usize>) -> usize {
    if let Some(idx) = *placeholder {
        return idx;
    }
    ctx.messages.push(Message::assistant(String::new()));
    let idx = ctx.messages.len() - 1;
    *placeholder = Some(idx);
    ctx.sink.write(ctx.session_id, ctx.messages);
    ctx.observer.stream_started(ctx.correlation);
    idx
}
