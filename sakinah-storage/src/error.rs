//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing would exceed the configured byte quota.
    #[error("storage quota exceeded: used {used} of {quota} bytes")]
    QuotaExceeded { used: u64, quota: u64 },

    /// The backing store cannot be reached (open failure, poisoned lock).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether the failure means "no space left" rather than a logic error.
    pub fn is_storage_full(&self) -> bool {
        match self {
            StorageError::QuotaExceeded { .. } => true,
            StorageError::Database(e) => {
                let msg = e.to_string().to_ascii_lowercase();
                msg.contains("no space left")
                    || msg.contains("disk full")
                    || msg.contains("out of memory")
            }
            _ => false,
        }
    }
}
