//! Error types for tablekv core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in tablekv core operations.
///
/// Missing keys are `Ok(None)`, lock timeouts are `None` and undecodable
/// values are [`tablekv_codec::Decoded::Raw`]; none of those is an error.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Driver error.
    #[error("storage error: {0}")]
    Storage(#[from] tablekv_storage::StorageError),

    /// Record conversion error.
    #[error("codec error: {0}")]
    Codec(#[from] tablekv_codec::CodecError),

    /// The store is not usable as configured.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The request was rejected before anything was written.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the rejected input.
        message: String,
    },

    /// A write was attempted while the write guard is on.
    #[error("store is read-only")]
    ReadOnly,

    /// A schema statement failed.
    #[error("sql error: {message}")]
    Sql {
        /// Executor error message.
        message: String,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an SQL error.
    pub fn sql(message: impl Into<String>) -> Self {
        Self::Sql {
            message: message.into(),
        }
    }

    /// Returns true for validation errors.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
