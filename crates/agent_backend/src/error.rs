use std::time::Duration;

use thiserror::Error;

/// Transport- and backend-level fault surfaced by a turn.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to open backend connection: {message}")]
    Connect { message: String },

    #[error("backend transport failure while {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed backend event: {message}")]
    Protocol { message: String },

    #[error("backend reported turn failure: {message}")]
    Backend { message: String },

    #[error("no event received within the inactivity deadline ({idle:?})")]
    StalledStream { idle: Duration },
}

impl QueryError {
    #[must_use]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(operation: &'static str, source: std::io::Error) -> Self {
        Self::Transport { operation, source }
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns true for the inactivity-watchdog failure.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        matches!(self, Self::StalledStream { .. })
    }
}
