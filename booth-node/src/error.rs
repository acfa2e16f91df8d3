//! Booth error taxonomy
//!
//! Lower-level errors from the store and the remote client are classified
//! into the handful of kinds the booth reacts to.

use booth_client::ClientError;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Stable classification of a [`BoothError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Storage,
    Network,
    Auth,
    Validation,
    SyncPartialFailure,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Storage => "storage",
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::Validation => "validation",
            ErrorKind::SyncPartialFailure => "sync_partial_failure",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BoothError {
    /// Local medium unavailable, locked or corrupt
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Remote unreachable or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Token invalid or refresh failed
    #[error("Auth error: {0}")]
    Auth(String),

    /// Malformed payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Some batches of an operation failed
    #[error("{} of the operation's parts failed", errors.len())]
    SyncPartialFailure { errors: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BoothError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoothError::Storage(_) => ErrorKind::Storage,
            BoothError::Network(_) => ErrorKind::Network,
            BoothError::Auth(_) => ErrorKind::Auth,
            BoothError::Validation(_) => ErrorKind::Validation,
            BoothError::SyncPartialFailure { .. } => ErrorKind::SyncPartialFailure,
            BoothError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        BoothError::Validation(msg.into())
    }
}

impl From<ClientError> for BoothError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Network(_) | ClientError::Timeout(_) => BoothError::Network(e.to_string()),
            ClientError::Unauthorized(_)
            | ClientError::Forbidden(_)
            | ClientError::ReauthenticationRequired
            | ClientError::NotLoggedIn => BoothError::Auth(e.to_string()),
            ClientError::Validation(_) => BoothError::Validation(e.to_string()),
            ClientError::Config(_) => BoothError::Config(e.to_string()),
            ClientError::Credential(_) => BoothError::Config(e.to_string()),
            // A misbehaving authority looks like an unreachable one to the booth
            ClientError::Server { .. }
            | ClientError::InvalidResponse(_)
            | ClientError::Serialization(_) => BoothError::Network(e.to_string()),
        }
    }
}

pub type BoothResult<T> = Result<T, BoothError>;
