//! Error types for the Azure Resource Manager seam.

use thiserror::Error;

/// Errors raised by cloud API calls.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when the addressed resource or its parent does not exist.
    #[error("resource not found: {resource}")]
    NotFound {
        /// Resource path or name.
        resource: String,
    },
    /// Raised when the request conflicts with the current resource state.
    #[error("conflict on {resource}: {message}")]
    Conflict {
        /// Resource path or name.
        resource: String,
        /// Message returned by the service.
        message: String,
    },
    /// Raised for any other non-success HTTP status.
    #[error("HTTP {status} ({code}): {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// ARM error code, empty when the body carried none.
        code: String,
        /// ARM error message or raw body.
        message: String,
    },
    /// Raised when the request could not be sent or the response not read.
    #[error("transport error: {0}")]
    Transport(String),
    /// Raised when a response body does not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// Raised when a bearer token cannot be obtained.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Raised when a long-running operation does not settle in time.
    #[error("timed out waiting for {0}")]
    Timeout(String),
    /// Raised when a long-running operation reaches a failed terminal state.
    #[error("operation {status}: {message}")]
    OperationFailed {
        /// Terminal status (`Failed` or `Canceled`).
        status: String,
        /// Error message reported by the operation.
        message: String,
    },
}

impl ApiError {
    /// Returns true for [`ApiError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for [`ApiError::Conflict`].
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Self::Timeout(
                value
                    .url()
                    .map_or_else(|| String::from("request"), ToString::to_string),
            );
        }
        if value.is_decode() {
            return Self::Decode(value.to_string());
        }
        Self::Transport(value.to_string())
    }
}
