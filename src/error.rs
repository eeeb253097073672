use thiserror::Error;

/// Unified error type for the turn delivery pipeline.
///
/// This aggregates all low-level errors into the categories the retry loop
/// and the failure reporter act on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("remote error: HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("empty reply from backend")]
    EmptyReply,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the retry loop may re-enter `Attempting` on this error.
    ///
    /// Retryable: request timeout, network-level failure, HTTP 5xx.
    /// Everything else (401 included) is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::Transport(_) => true,
            Error::Remote { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timeouts_and_server_errors_are_retryable() {
        assert!(Error::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(Error::Remote {
            status: 503,
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn unauthorized_and_empty_replies_are_terminal() {
        assert!(!Error::Remote {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!Error::EmptyReply.is_retryable());
    }
}
