//! # tablekv codec
//!
//! Record encoding for tablekv.
//!
//! Values are stored as compact UTF-8 JSON:
//! - Records are JSON objects whose fields keep insertion order
//! - Non-ASCII text is written literally, not `\u` escaped
//! - Decoding never fails; undecodable bytes come back as [`Decoded::Raw`]
//!
//! ## Usage
//!
//! ```
//! use tablekv_codec::{decode, encode, Decoded, Record};
//!
//! let mut record = Record::new();
//! record.set("title", "a");
//!
//! let bytes = encode(&record).unwrap();
//! assert_eq!(bytes, br#"{"title":"a"}"#.to_vec());
//!
//! match decode(&bytes) {
//!     Decoded::Record(back) => assert_eq!(back, record),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod record;

pub use codec::{decode, encode, encode_value, Decoded};
pub use error::{CodecError, CodecResult};
pub use record::{json_type_name, Record};
pub use serde_json::{Map, Value};
