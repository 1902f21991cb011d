//! Errors returned by the external service clients.

use thiserror::Error;

/// Failure of a call against the scheduler service.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The named schedule does not exist. Callers deleting a schedule treat
    /// this as success.
    #[error("schedule {0} not found")]
    NotFound(String),

    #[error("schedule {0} already exists")]
    Conflict(String),

    #[error("scheduler returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("scheduler request failed: {0}")]
    Transport(String),
}

impl SchedulerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for SchedulerError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Failure of a call against the task store, directory or delivery channel.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{service} returned {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl ClientError {
    pub fn transport(service: &'static str, e: impl std::fmt::Display) -> Self {
        Self::Transport {
            service,
            message: e.to_string(),
        }
    }

    pub fn decode(service: &'static str, e: impl std::fmt::Display) -> Self {
        Self::Decode {
            service,
            message: e.to_string(),
        }
    }
}
