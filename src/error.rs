//! Error types for the Clash Royale client.

use serde_json::Value;
use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Clash Royale client.
#[derive(Error, Debug)]
pub enum Error {
    /// The API rejected the token (HTTP 401).
    #[error("Unauthorized ({status}) for {url}: {body}")]
    Unauthorized {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body, parsed as JSON when possible
        body: Value,
    },

    /// The tag or resource does not exist (HTTP 404).
    #[error("Not found ({status}) for {url}: {body}")]
    NotFound {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body, parsed as JSON when possible
        body: Value,
    },

    /// The API servers failed (HTTP 5xx).
    #[error("Server error ({status}) for {url}: {body}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body, parsed as JSON when possible
        body: Value,
    },

    /// Any other non-success status.
    #[error("Unexpected status ({status}) for {url}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body, parsed as JSON when possible
        body: Value,
    },

    /// The API did not answer within the configured timeout.
    #[error("API is not responding")]
    NotResponding,

    /// A player, clan or tournament tag was malformed.
    #[error("Invalid tag {tag:?}: {reason}")]
    InvalidTag {
        /// The tag as given
        tag: String,
        /// Why it was rejected
        reason: String,
    },

    /// A query parameter was not allowed or had a bad value.
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    /// The payload did not have the shape the caller asked for.
    #[error("Unexpected payload: expected {0}")]
    UnexpectedPayload(&'static str),

    /// The client was closed.
    #[error("Client is closed")]
    Closed,

    /// Network or HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The cache database could not be opened or prepared.
    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify a response: 2xx hands the body back, anything else becomes
    /// the matching error carrying the body.
    pub(crate) fn check_status(status: u16, url: &str, body: Value) -> Result<Value> {
        let url = url.to_string();
        Err(match status {
            200..=299 => return Ok(body),
            401 => Error::Unauthorized { status, url, body },
            404 => Error::NotFound { status, url, body },
            500..=u16::MAX => Error::Server { status, url, body },
            _ => Error::UnexpectedStatus { status, url, body },
        })
    }

    /// HTTP status of the failed response, if this error came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { status, .. }
            | Error::NotFound { status, .. }
            | Error::Server { status, .. }
            | Error::UnexpectedStatus { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Body of the failed response, if this error came from one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Error::Unauthorized { body, .. }
            | Error::NotFound { body, .. }
            | Error::Server { body, .. }
            | Error::UnexpectedStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Parse a response body as JSON, keeping it as a plain string otherwise.
pub(crate) fn parse_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
