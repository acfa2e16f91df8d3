//! Store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {collection}/{key}")]
    NotFound {
        collection: &'static str,
        key: String,
    },

    /// The record may not be removed or rewritten (e.g. an unsynced audit row)
    #[error("Record is immutable: {collection}/{key}")]
    Immutable {
        collection: &'static str,
        key: String,
    },

    /// Backing medium locked by another process, missing, or out of space
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Opening the database failed for a reason a retry may clear
    pub(crate) fn from_open(e: redb::DatabaseError) -> Self {
        match e {
            redb::DatabaseError::DatabaseAlreadyOpen => {
                StoreError::Unavailable("database is locked by another process".to_string())
            }
            redb::DatabaseError::Storage(redb::StorageError::Io(io)) => {
                StoreError::Unavailable(io.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
