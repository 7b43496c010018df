//! Client error types.

use thiserror::Error;

/// Convenience alias for client call results.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced to client callers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A request body could not be serialized.
    #[error("encode body: {0}")]
    Encode(#[from] serde_json::Error),

    /// The API answered with a non-success status.
    #[error("api error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Credential renewal failed (or no credentials were held); local
    /// session state has been cleared and the caller must re-authenticate.
    #[error("session expired, authentication required")]
    SessionExpired,

    /// The configured base URL could not be parsed.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
}

impl ClientError {
    /// HTTP status of an API error, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
