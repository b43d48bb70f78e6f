//! Error types for the qbank client.
//!
//! Each collaborator gets its own error enum so that the client can tell a
//! transport failure apart from a rejected refresh exchange or a storage
//! problem. [`ClientError`] is the only type surfaced to callers of `send`.

use std::fmt;
use thiserror::Error;

/// The error type surfaced to callers of the authenticated client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session is gone and the user has to authenticate again.
    ///
    /// The session has always been cleared by the time this is returned,
    /// so retrying the same call will not help.
    #[error("session expired")]
    SessionExpired,

    /// Network transport errors (connection, timeout). Never retried.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A typed auth endpoint answered with a non-success status.
    #[error("{0}")]
    Status(StatusError),

    /// A response body did not have the expected shape.
    #[error("unexpected response body: {message}")]
    Decode { message: String },

    /// Input validation errors.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl ClientError {
    /// Returns true if the caller must send the user back to the login screen.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode {
            message: err.to_string(),
        }
    }
}

/// A non-success answer from a typed endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    /// HTTP status code.
    pub status: u16,
    /// The server's `message` field, if the body carried one.
    pub message: Option<String>,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for StatusError {}

/// Transport-level errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The request could not be built (bad header value, bad URL).
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Errors from exchanging a refresh token for a new access token.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The server refused the refresh token.
    #[error("refresh rejected with HTTP {status}")]
    Rejected {
        status: u16,
        message: Option<String>,
    },

    /// The exchange request never got an answer.
    #[error("refresh transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered but the body had no usable token.
    #[error("refresh response malformed: {message}")]
    Decode { message: String },
}

/// Errors from session transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A transition that needs a session ran while none was active.
    #[error("no active session")]
    NoActiveSession,
}

/// Errors from the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem or device error.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a coordinated refresh did not produce a token.
///
/// This is what every waiter of one refresh operation receives, so it is
/// cheap to clone and carries the underlying cause only as text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The session held no refresh token to exchange.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The exchange itself failed.
    #[error("refresh exchange failed: {0}")]
    Exchange(String),

    /// The session was cleared while the exchange was running.
    #[error("session cleared during refresh")]
    NoActiveSession,

    /// The refresh task ended without reporting an outcome.
    #[error("refresh task aborted")]
    Aborted,
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Unknown HTTP method.
    #[error("invalid HTTP method '{value}'")]
    Method { value: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
