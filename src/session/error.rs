use std::time::Duration;

use thiserror::Error;

/// Failures of a session renewal or of the token store.
///
/// `Clone` because one renewal outcome is handed to every task that waited on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("authentication round-trip exceeded {0:?}")]
    Timeout(Duration),

    #[error("token store I/O failed: {0}")]
    Io(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid authentication response: {0}")]
    InvalidResponse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Whether the caller may reasonably try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout(_) | SessionError::Io(_) | SessionError::Transport(_)
        )
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            SessionError::Authentication(_) => "authentication",
            SessionError::Timeout(_) => "timeout",
            SessionError::Io(_) => "io",
            SessionError::Transport(_) => "transport",
            SessionError::InvalidResponse(_) => "invalid_response",
            SessionError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}
