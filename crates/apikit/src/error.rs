//! Error types for Foreman API operations.
//!
//! Transport failures and server-side rejections are distinct variants so
//! callers can tell a dead host apart from a request the server refused.

use std::time::Duration;

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a Foreman/Katello server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network-level failure: DNS, TCP, TLS or request timeout.
    #[error("cannot reach {url}: {message}")]
    Connection {
        /// URL the request was sent to.
        url: String,
        /// Transport error message.
        message: String,
    },

    /// The server answered with a non-success status code.
    #[error("server returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the server's error body.
        message: String,
    },

    /// The server answered 2xx but the body was not what we expected.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// An asynchronous task did not reach a terminal state in time.
    #[error("task {id} did not finish within {}s", .timeout.as_secs())]
    TaskTimeout {
        /// Task id being polled.
        id: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// An asynchronous task finished in a non-success state.
    #[error("task {id} failed: {message}")]
    TaskFailed {
        /// Task id.
        id: String,
        /// Errors collected from the task record.
        message: String,
    },
}

impl Error {
    /// Create an API error from a status code and a server message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a connection error for a URL.
    pub fn connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Map a transport-level failure onto the taxonomy. Status errors only
    /// appear here if the agent is configured to raise them.
    pub(crate) fn transport(url: &str, err: &ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::api(*code, format!("HTTP {code}")),
            other => Self::connection(url, other.to_string()),
        }
    }

    /// HTTP status code, for API errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is a network-level failure rather than a server answer.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
