//! Storage error types.

/// Failures of the key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend rejected or failed an operation.
    #[error("storage error: {0}")]
    Internal(String),

    /// The backend is unreachable.
    ///
    /// The exception recorder never tries to record this failure, since the
    /// record would go to the same unreachable store.
    #[error("connection error: {0}")]
    Connection(String),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Empty or malformed namespace or key.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
