//! Error types for the Omnia time-series API client.
//!
//! This module provides a comprehensive error type covering all failure
//! modes when talking to the time-series API and its identity provider.

use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for Omnia operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for all Omnia API operations.
///
/// All errors are fatal to the call that produced them; the client performs
/// no internal retries beyond following pagination continuation tokens.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// API returned a non-2xx response
    #[error("API error: [{status}] {reason}. {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// HTTP reason phrase
        reason: String,
        /// Error message parsed from the response body, if present
        message: String,
        /// Raw response body for debugging
        body: Value,
    },

    /// Identity-provider token exchange failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Transport-level failure establishing the HTTPS connection
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The remote API returned a 2xx response with an unexpected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Request timed out
    #[error("Request timeout")]
    Timeout,

    /// Invalid input provided to a function
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns `true` if this error is potentially transient and the
    /// operation could be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Connection(_) | Error::Timeout => true,
            Error::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Returns `true` if this is an authentication-related error.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Error::Authentication(_) => true,
            Error::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// Returns `true` if this error is a 404 from the API.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }

    /// Returns `true` if this error indicates a client-side issue.
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Api { status, .. } => (400..500).contains(status),
            Error::InvalidInput(_) | Error::Config(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this error indicates a server-side issue.
    pub fn is_server_error(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Create an API error from a non-2xx response.
    pub(crate) fn from_api_response(status: reqwest::StatusCode, body: Value) -> Self {
        let message = body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown API error")
            .to_string();

        Error::Api {
            status: status.as_u16(),
            reason: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message,
            body,
        }
    }
}
