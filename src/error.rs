//! Error taxonomy for dashboard refresh cycles.
//!
//! Every variant is recovered inside the controller; none reach the host.

use std::time::Duration;

use thiserror::Error;

/// Broad failure category, used for banner wording and the cycle log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Protocol,
    Validation,
    Timeout,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Protocol => write!(f, "protocol"),
            Self::Validation => write!(f, "validation"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// A failed fetch, parse or input check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DashboardError {
    /// The request never produced an HTTP response.
    #[error("network request failed: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status, with the envelope's
    /// `message` when the body carried one.
    #[error("server responded with HTTP {0}{suffix}", suffix = .1.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status(u16, Option<String>),

    /// The body was not JSON or did not have the expected shape.
    #[error("malformed response: {0}")]
    Protocol(String),

    /// The envelope's `status` was not `"success"`.
    #[error("server reported an error{}", .0.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Rejected(Option<String>),

    /// User input did not match the expected format.
    #[error("invalid input: {0}")]
    Validation(String),

    /// No response within the client-side deadline.
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl DashboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Status(..) => ErrorKind::Transport,
            Self::Protocol(_) | Self::Rejected(_) => ErrorKind::Protocol,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }
}
