//! Byte encoding of records.

use crate::error::{CodecError, CodecResult};
use crate::record::Record;
use serde_json::Value;

/// The outcome of decoding a stored value.
///
/// Decoding is permissive: bytes that are not valid JSON still come back,
/// as [`Decoded::Raw`], so a corrupted entry can be inspected instead of
/// aborting a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A JSON object.
    Record(Record),
    /// Valid JSON that is not an object.
    Value(Value),
    /// Bytes that did not parse as JSON, as lossy UTF-8.
    Raw(String),
}

impl Decoded {
    /// Returns the record, if this is one.
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Converts into a record, if this is one.
    #[must_use]
    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Returns true for undecodable bytes.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Converts into a JSON value. Raw text becomes a JSON string.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Record(record) => record.into(),
            Self::Value(value) => value,
            Self::Raw(text) => Value::String(text),
        }
    }
}

/// Encodes a record as compact JSON.
///
/// Fields are written in record order and non-ASCII text is kept as literal
/// UTF-8.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if a value cannot be written.
pub fn encode(record: &Record) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(CodecError::serialize)
}

/// Encodes any JSON value.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if the value cannot be written.
pub fn encode_value(value: &Value) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(CodecError::serialize)
}

/// Decodes stored bytes.
///
/// Never fails. Bytes that are not JSON are returned as [`Decoded::Raw`]
/// and a warning is logged.
#[must_use]
pub fn decode(bytes: &[u8]) -> Decoded {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(fields)) => Decoded::Record(Record::from(fields)),
        Ok(value) => Decoded::Value(value),
        Err(e) => {
            tracing::warn!(error = %e, len = bytes.len(), "value is not valid JSON, returning raw text");
            Decoded::Raw(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
