//! # Errors
//!
//! Every failure aborts the exchange in progress and is returned to the
//! caller. Nothing is retried: re-sending an issue or verify request could
//! double-issue.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Result type for exchange client and driver operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the exchange client and driver.
#[derive(Debug, Error)]
pub enum Error {
    /// The agent could not be reached (connection refused, reset, DNS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The agent answered with a non-2xx status.
    #[error("agent returned {status}: {body}")]
    Agent {
        /// HTTP status code.
        status: u16,

        /// Error body as returned by the agent. Plain-text bodies are wrapped
        /// in a JSON string.
        body: Value,
    },

    /// No notification matching the waiter's predicate arrived in time.
    #[error("no `{topic}` notification matched within {timeout:?}")]
    Timeout {
        /// Topic that was being waited on.
        topic: String,

        /// How long the waiter waited.
        timeout: Duration,
    },

    /// A notification arrived with a state the current step cannot accept,
    /// such as a regression to an earlier state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A response or notification payload could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of an [`Error::Agent`] error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Agent { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}
