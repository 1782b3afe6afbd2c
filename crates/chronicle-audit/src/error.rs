//! Audit engine error types.

use chronicle_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while recording or reconstructing events.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A required input was missing or malformed (caller misuse).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A recorded type name has no registered schema.
    #[error("could not load the type {type_name}")]
    TypeNotFound {
        /// The unresolved type name.
        type_name: String,
    },

    /// A recorded value could not be converted back into its field's type.
    #[error("cannot convert '{value}' for field {field}: {reason}")]
    Conversion {
        /// The offending field.
        field: String,
        /// The recorded textual value.
        value: String,
        /// Why the conversion failed.
        reason: String,
    },

    /// The record kind has no defined inverse.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The live entity referenced by a record no longer exists.
    #[error("entity not found: {type_name} {key}")]
    EntityNotFound {
        /// Entity type name.
        type_name: String,
        /// Entity key.
        key: String,
    },

    /// A recorded payload is structurally malformed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// An entity schema declaration is invalid.
    #[error("invalid schema for {type_name}: {reason}")]
    Schema {
        /// The type being declared.
        type_name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The persistence provider failed.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),
}

impl AuditError {
    /// Shorthand for [`AuditError::InvalidArgument`].
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
