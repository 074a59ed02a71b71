//! Error types for driver operations.

use std::io;
use thiserror::Error;

/// Result type for driver operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to a storage driver.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The range bounds are inverted.
    #[error("invalid range: key_from {key_from:?} is greater than key_to {key_to:?}")]
    InvalidRange {
        /// Lower bound as requested.
        key_from: Vec<u8>,
        /// Upper bound as requested.
        key_to: Vec<u8>,
    },

    /// The stored data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The driver does not implement the requested capability.
    #[error("{driver} driver does not support {operation}")]
    Unsupported {
        /// Driver name.
        driver: &'static str,
        /// The unsupported operation.
        operation: &'static str,
    },

    /// Another process holds the store open.
    #[error("storage locked: {0} is opened by another process")]
    Locked(String),

    /// The underlying engine reported an error.
    #[error("{driver} error: {message}")]
    Backend {
        /// Driver name.
        driver: &'static str,
        /// Engine error message.
        message: String,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates an engine error for the named driver.
    pub fn backend(driver: &'static str, message: impl ToString) -> Self {
        Self::Backend {
            driver,
            message: message.to_string(),
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(driver: &'static str, operation: &'static str) -> Self {
        Self::Unsupported { driver, operation }
    }
}
