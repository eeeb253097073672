//! # turnstream
//!
//! 会话回合投递流水线：将一次用户输入变成一条持久的、可增量渲染的会话回合。
//!
//! Resilient delivery and assembly pipeline for conversational turns against
//! text-generation backends that answer either as one buffered JSON document
//! or as an open, chunked stream.
//!
//! ## Overview
//!
//! This library owns the hard part of a chat client: a finite-state retry
//! loop wrapped around a dual-mode response reader. It guarantees that the
//! user's input is never lost, degrades gracefully from streaming to
//! buffered parsing, merges partial and final payload shapes into one
//! coherent message, and surfaces failure without breaking conversational
//! continuity.
//!
//! ## Core Guarantees
//!
//! - **Optimistic durability**: the user message is written to the session
//!   store before any network activity begins
//! - **Streaming-first**: tokens are applied to the assistant placeholder in
//!   arrival order and written through to the session as they arrive
//! - **Graceful degradation**: a streamable body that never yields a token
//!   is re-parsed as a buffered response, falling back to literal text
//! - **Conversational continuity**: a terminal failure appends a fallback
//!   assistant reply, so no user turn is ever left unacknowledged
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turnstream::{BackendConfig, TurnClientBuilder};
//!
//! #[tokio::main]
//! async fn main() -> turnstream::Result<()> {
//!     let client = TurnClientBuilder::new()
//!         .config(BackendConfig::new("https://backend.example/api"))
//!         .build()?;
//!
//!     let mut messages = Vec::new();
//!     let outcome = client
//!         .send_turn("thread-1/system-a", &mut messages, "Hello", None)
//!         .await?;
//!     println!("{}", outcome.message.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Turn client, builder and per-send stats |
//! | [`config`] | Backend configuration and endpoint resolution |
//! | [`pipeline`] | Turn builder, stream reader, normalizer, retry, reporter |
//! | [`types`] | Core type definitions (messages, stream events) |
//! | [`transport`] | Outbound HTTP seam with concurrency ceiling |
//! | [`session`] | Write-through session sink |
//! | [`attach`] | Attachment-to-payload conversion |
//! | [`observer`] | Indicator / notice / stream-lifecycle subscriptions |

pub mod attach;
pub mod client;
pub mod config;
pub mod observer;
pub mod pipeline;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use attach::{AttachmentSource, Base64FileConverter, PayloadConverter};
pub use client::{TurnClient, TurnClientBuilder, TurnOutcome, TurnStats};
pub use config::{BackendConfig, RetryConfig};
pub use observer::{FailureKind, Notice, TurnObserver};
pub use session::{InMemorySession, SessionSink};
pub use types::{
    events::{StreamCorrelationToken, StreamEvent},
    message::{Message, MessageRole, PovEntry},
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::Error;
