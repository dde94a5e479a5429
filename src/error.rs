//! Error types for throttled-fetch
//!
//! Every public operation returns `Result<T, Error>` where Error is defined here.
//! Nothing is retried or swallowed internally; callers decide what to do.

use crate::context::FetchStage;
use thiserror::Error;

/// Boxed error produced by a [`Transport`](crate::http::Transport) implementation
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for throttled-fetch
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Missing required config field: {field}")]
    MissingConfigField { field: &'static str },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: &'static str, message: String },

    // ============================================================================
    // Request Construction Errors
    // ============================================================================
    #[error("Invalid HTTP method: {method:?}")]
    InvalidMethod { method: String },

    #[error("Invalid request URL '{url}': {message}")]
    InvalidRequestUrl { url: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Cancellation Errors
    // ============================================================================
    #[error("Fetch cancelled while {stage}")]
    Cancelled { stage: FetchStage },

    #[error("Deadline exceeded while {stage}")]
    DeadlineExceeded { stage: FetchStage },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("No response from transport: {source}")]
    NoResponse {
        #[source]
        source: TransportError,
    },

    #[error("HTTP {status} ({reason}): {body}")]
    HttpStatus {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("Failed to read response body: {source}")]
    BodyRead {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Error {
    /// Create a missing field error
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingConfigField { field }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field,
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// Wrap a transport failure
    pub fn no_response(source: impl Into<TransportError>) -> Self {
        Self::NoResponse {
            source: source.into(),
        }
    }

    /// HTTP status code carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the fetch stopped because the caller cancelled it or its deadline passed
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Error::Cancelled { .. } | Error::DeadlineExceeded { .. }
        )
    }

    /// Check if a caller could reasonably retry after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NoResponse { .. } => true,
            Error::HttpStatus { status, .. } => matches!(*status, 429 | 500),
            _ => false,
        }
    }
}

/// Result type alias for throttled-fetch
pub type Result<T> = std::result::Result<T, Error>;
