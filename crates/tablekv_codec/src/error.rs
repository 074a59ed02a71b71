//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while converting records.
///
/// Decoding stored bytes never fails (see [`crate::Decoded::Raw`]); these
/// errors come from converting between records and caller types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value is valid JSON but not an object.
    #[error("record must be a mapping, found {found}")]
    NotAMapping {
        /// JSON type of the rejected value.
        found: &'static str,
    },

    /// Failed to serialize a value.
    #[error("serialization failed: {message}")]
    Serialize {
        /// Description of the serialization error.
        message: String,
    },

    /// Failed to deserialize a record into a caller type.
    #[error("deserialization failed: {message}")]
    Deserialize {
        /// Description of the deserialization error.
        message: String,
    },
}

impl CodecError {
    /// Create a serialization error.
    pub fn serialize(message: impl ToString) -> Self {
        Self::Serialize {
            message: message.to_string(),
        }
    }

    /// Create a deserialization error.
    pub fn deserialize(message: impl ToString) -> Self {
        Self::Deserialize {
            message: message.to_string(),
        }
    }
}
