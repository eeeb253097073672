//! Outbound HTTP seam.
//!
//! The pipeline consumes the transport as an opaque collaborator: one
//! `send` with a URL, a JSON body, headers and a timeout budget. The
//! bundled [`HttpTransport`] enforces its own concurrency ceiling and
//! injects identity headers on every request.

use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use std::env;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Other(String),
}

/// One outbound POST. Implementations own their concurrency ceiling and
/// identity-header injection; the pipeline only supplies per-send headers
/// and the timeout budget.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        url: &str,
        body: serde_json::Value,
        headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<TransportReply>;
}

/// Status plus a readable body. Buffered consumers collect via [`text`];
/// streaming consumers take the byte stream via [`into_body`].
///
/// [`text`]: TransportReply::text
/// [`into_body`]: TransportReply::into_body
pub struct TransportReply {
    status: u16,
    body: BoxStream<'static, Bytes>,
    permit: Option<OwnedSemaphorePermit>,
}

impl TransportReply {
    pub fn new(status: u16, body: BoxStream<'static, Bytes>) -> Self {
        Self {
            status,
            body,
            permit: None,
        }
    }

    pub fn with_permit(
        status: u16,
        body: BoxStream<'static, Bytes>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            status,
            body,
            permit,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Byte stream of the body. The inflight permit, if any, stays alive
    /// for as long as the returned stream does.
    pub fn into_body(self) -> BoxStream<'static, Bytes> {
        Box::pin(PermitStream {
            inner: self.body,
            _permit: self.permit,
        })
    }

    /// Collect the entire body as text.
    pub async fn text(self) -> Result<String> {
        let mut body = self.into_body();
        let mut buf = String::new();
        while let Some(chunk) = body.next().await {
            buf.push_str(&String::from_utf8_lossy(&chunk?));
        }
        Ok(buf)
    }
}

/// Ties the inflight permit's lifetime to the body stream.
struct PermitStream {
    inner: BoxStream<'static, Bytes>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Stream for PermitStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

/// Queued-fetch transport over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    identity_headers: Vec<(String, String)>,
    inflight: Option<Arc<Semaphore>>,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let builder = reqwest::Client::builder()
            .pool_max_idle_per_host(
                env::var("TURNSTREAM_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            // Conservative HTTP/2 keepalive defaults for long-lived streams.
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        let inflight = env::var("TURNSTREAM_MAX_INFLIGHT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        Ok(Self {
            client,
            identity_headers: Vec::new(),
            inflight,
        })
    }

    /// Add a header sent with every request (e.g. an API identity).
    pub fn with_identity_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.identity_headers.push((name.into(), value.into()));
        self
    }

    /// Cap the number of concurrent in-flight requests.
    pub fn with_max_inflight(mut self, n: usize) -> Self {
        self.inflight = Some(Arc::new(Semaphore::new(n.max(1))));
        self
    }

    fn map_send_error(e: reqwest::Error, timeout: Duration) -> Error {
        if e.is_timeout() {
            Error::Timeout(timeout)
        } else {
            Error::Transport(TransportError::Http(e))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        url: &str,
        body: serde_json::Value,
        headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<TransportReply> {
        let permit = match &self.inflight {
            Some(semaphore) => Some(
                semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?,
            ),
            None => None,
        };

        let mut req = self.client.post(url).json(&body).timeout(timeout);
        for (name, value) in self.identity_headers.iter().chain(headers.iter()) {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?;

        let status = resp.status().as_u16();
        let byte_stream = resp
            .bytes_stream()
            .map_err(move |e| Self::map_send_error(e, timeout));

        Ok(TransportReply::with_permit(
            status,
            Box::pin(byte_stream),
            permit,
        ))
    }
}
