//! Error types for quire.

use thiserror::Error;

/// Result type alias using quire's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quire operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any remote call was attempted
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for validation-class errors, the only kind the store hands back
    /// to its callers.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// True for failures of the remote gateway (transport, status, payload).
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::Remote { .. } | Error::Request(_) | Error::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}
