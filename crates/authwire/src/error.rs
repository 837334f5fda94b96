//! Error types for the authwire library.
//!
//! Callers of the request pipeline only ever see four outcomes besides
//! success: a transport failure, an application error from the server, a
//! terminal session error, or rejected input. Authorization failures from
//! resource endpoints are never surfaced as such; they are either recovered
//! by a renewal or collapse into [`AuthError::SessionExpired`].

use std::fmt;
use thiserror::Error;

/// The unified error type for authwire operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (connection, timeout, unreadable body).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Non-2xx responses other than authorization failures.
    #[error("application error: {0}")]
    Application(#[from] ApplicationError),

    /// Session errors. Map [`AuthError::SessionExpired`] to a re-login prompt.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Input validation errors (empty tokens, malformed URLs, bad headers).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns true if this error should force the user to authenticate again.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::Auth(AuthError::SessionExpired))
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// The response body could not be decoded.
    #[error("failed to decode response: {message}")]
    Decode { message: String },

    /// The renewal endpoint could not be reached. The session is kept.
    #[error("credential renewal failed: {message}")]
    Renewal { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            TransportError::Decode {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The session can no longer be used; the user must authenticate again.
    #[error("session expired")]
    SessionExpired,

    /// The login endpoint refused the supplied credentials.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// An operation needed credentials but the store is empty.
    #[error("not authenticated")]
    NotAuthenticated,
}

/// A non-2xx response other than an authorization failure.
///
/// Servers answer with either `{message, status}` or `{error, message}`
/// shaped bodies; whatever is present is carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationError {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable error code (if present).
    pub error: Option<String>,
    /// Error message from the server.
    pub message: Option<String>,
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error) = self.error {
            write!(f, " [{}]", error)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApplicationError {}

impl ApplicationError {
    /// Create a new application error.
    pub fn new(status: u16, error: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error,
            message,
        }
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Empty or otherwise unusable token.
    #[error("invalid {kind} token: {reason}")]
    Token { kind: &'static str, reason: String },

    /// Header name or value that cannot be sent.
    #[error("invalid header '{name}': {reason}")]
    Header { name: String, reason: String },

    /// Request body that could not be serialized.
    #[error("invalid request body: {message}")]
    Body { message: String },
}

/// Why a renewal did not produce a fresh access credential.
///
/// Cloned into every waiter attached to the same renewal ticket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalError {
    /// The refresh credential was refused (invalid, expired, revoked).
    #[error("refresh token rejected (HTTP {status})")]
    Rejected { status: u16, message: Option<String> },

    /// The renewal endpoint could not be reached or failed transiently.
    #[error("renewal endpoint unavailable: {message}")]
    Network { message: String },

    /// The store was cleared before or during the renewal.
    #[error("session ended")]
    SessionEnded,

    /// The renewal task went away without reporting an outcome.
    #[error("renewal abandoned")]
    Abandoned,
}

impl From<RenewalError> for Error {
    fn from(err: RenewalError) -> Self {
        match err {
            RenewalError::Network { message } => {
                Error::Transport(TransportError::Renewal { message })
            }
            RenewalError::Rejected { .. } | RenewalError::SessionEnded | RenewalError::Abandoned => {
                Error::Auth(AuthError::SessionExpired)
            }
        }
    }
}
