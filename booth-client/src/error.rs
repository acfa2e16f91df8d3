//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Remote unreachable or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Call exceeded its ceiling timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Authentication required / token rejected (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Permission denied (403)
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Malformed request payload (400/422)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Any other non-success status
    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Refresh-and-retry failed; local credentials were cleared
    #[error("Re-authentication required")]
    ReauthenticationRequired,

    /// No session token is held
    #[error("Not logged in")]
    NotLoggedIn,

    /// Credential file could not be read or written
    #[error("Credential storage error: {0}")]
    Credential(#[from] std::io::Error),

    /// Client could not be constructed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Authorization failures: the caller must refresh or log in again
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::ReauthenticationRequired | Self::NotLoggedIn
        )
    }

    /// Transport-level failures: worth retrying later
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout(e.to_string())
        } else if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
