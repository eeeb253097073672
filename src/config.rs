//! Backend configuration and endpoint resolution.

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;
use url::Url;

/// Path appended to a base URL when streaming is enabled.
pub const STREAMING_SUFFIX: &str = "/chat/stream";
/// Path appended to a base URL for buffered (single-document) replies.
pub const BUFFERED_SUFFIX: &str = "/chat/message";

/// Escalating "still working" notice thresholds. Advisory only: these timers
/// never abort or retry anything themselves.
pub static DEFAULT_NOTICE_SCHEDULE: Lazy<Vec<Duration>> = Lazy::new(|| {
    vec![
        Duration::from_secs(5 * 60),
        Duration::from_secs(15 * 60),
        Duration::from_secs(25 * 60),
    ]
});

/// Retry policy for one logical send.
///
/// The delay is fixed, not exponential: the loop re-enters `Attempting`
/// after the same pause every time until the budget is exhausted.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of re-attempts after the first (2 => 3 total attempts).
    pub max_attempts: u32,
    /// Fixed inter-attempt delay.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(2),
        }
    }
}

/// Backend target plus the per-send policy knobs.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Explicit full message endpoint. When set it is used verbatim and the
    /// suffix rule below does not apply.
    pub endpoint: Option<String>,
    /// Base URL to which the streaming or buffered suffix is appended.
    pub base_url: String,
    /// Selects the streaming suffix and the stream reader path.
    pub streaming_enabled: bool,
    /// Backend workflow module label, forwarded in `params.module`.
    pub module: String,
    /// Forwarded in `params.debug`.
    pub debug: bool,
    /// Task-label hint header value.
    pub task_label: String,
    /// Transport timeout budget for one attempt.
    pub timeout: Duration,
    pub retry: RetryConfig,
    /// Escalation thresholds for informational notices.
    pub notice_schedule: Vec<Duration>,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let timeout_secs = env::var("TURNSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(120);

        Self {
            endpoint: None,
            base_url: base_url.into(),
            streaming_enabled: true,
            module: "chat".to_string(),
            debug: false,
            task_label: "chat-turn".to_string(),
            timeout: Duration::from_secs(timeout_secs),
            retry: RetryConfig::default(),
            notice_schedule: DEFAULT_NOTICE_SCHEDULE.clone(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn streaming(mut self, enabled: bool) -> Self {
        self.streaming_enabled = enabled;
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Compute the POST target for this configuration.
    ///
    /// An explicit endpoint, or a base URL that already names a message
    /// endpoint, is used verbatim. Otherwise the streaming or buffered
    /// suffix is appended depending on `streaming_enabled`. Downstream
    /// stages never branch on the transport mode except the reader.
    pub fn resolve_endpoint(&self) -> String {
        if let Some(endpoint) = &self.endpoint {
            return endpoint.trim().to_string();
        }

        let base = self.base_url.trim().trim_end_matches('/');
        if base.ends_with(STREAMING_SUFFIX) || base.ends_with(BUFFERED_SUFFIX) {
            return base.to_string();
        }

        let suffix = if self.streaming_enabled {
            STREAMING_SUFFIX
        } else {
            BUFFERED_SUFFIX
        };

        // Normalize through Url when the base parses; odd bases still resolve
        // by plain concatenation rather than failing the send.
        match Url::parse(base) {
            Ok(url) => format!("{}{}", url.as_str().trim_end_matches('/'), suffix),
            Err(_) => format!("{}{}", base, suffix),
        }
    }
}
