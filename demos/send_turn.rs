//! Send one turn against a real backend and print the assembled reply.
//!
//! ```sh
//! cargo run --example send_turn -- http://localhost:8080/api "Hello there"
//! ```

use std::sync::Arc;
use turnstream::observer::{Notice, TurnObserver};
use turnstream::{BackendConfig, InMemorySession, StreamCorrelationToken, TurnClientBuilder};

struct ConsoleObserver;

impl TurnObserver for ConsoleObserver {
    fn typing_changed(&self, active: bool) {
        if active {
            eprintln!("[typing…]");
        }
    }

    fn notice(&self, notice: Notice) {
        eprintln!("[notice] {:?}", notice);
    }

    fn stream_started(&self, token: &StreamCorrelationToken) {
        eprintln!("[stream {} started]", token);
    }

    fn stream_ended(&self, token: &StreamCorrelationToken) {
        eprintln!("[stream {} ended]", token);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let base_url = args
        .next()
        .unwrap_or_else(|| "http://localhost:8080/api".to_string());
    let text = args.next().unwrap_or_else(|| "Hello there".to_string());

    let session = Arc::new(InMemorySession::new());
    let client = TurnClientBuilder::new()
        .config(BackendConfig::new(base_url))
        .session_sink(session.clone())
        .observer(Arc::new(ConsoleObserver))
        .build()?;

    let mut messages = Vec::new();
    match client
        .send_turn("demo-thread/demo-system", &mut messages, &text, None)
        .await
    {
        Ok(outcome) => {
            println!("{}", outcome.message.content);
            if let Some(thought) = &outcome.message.logical_thought {
                println!("  logical: {}", thought);
            }
            if let Some(thought) = &outcome.message.creative_thought {
                println!("  creative: {}", thought);
            }
            eprintln!(
                "[{} attempt(s), {} ms, streamed: {}]",
                outcome.stats.attempts, outcome.stats.duration_ms, outcome.stats.streamed
            );
        }
        Err(e) => {
            // The session still ends with a fallback assistant turn.
            eprintln!("delivery failed: {}", e);
            for message in session.messages("demo-thread/demo-system") {
                eprintln!("  {:?}: {}", message.role, message.content);
            }
        }
    }

    Ok(())
}
