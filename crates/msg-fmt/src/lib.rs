//! The NOTE payload codec.
//!
//! Structured values are encoded as canonical msgpack (sorted map keys, hex
//! text carried as raw bytes, integers wider than 64 bits wrapped in a
//! one-field marker map) and laid out over the five payload segments that a
//! mint spend pushes in its witness.
//!
//! ```
//! use note_msg_fmt::{NotePayload, NoteValue, PayloadOptions};
//!
//! let value = NoteValue::map([("p", "n20"), ("op", "mint"), ("tick", "NOTE")]);
//! let payload = NotePayload::from_value(&value, PayloadOptions::default()).unwrap();
//! assert_eq!(payload.decode().unwrap(), Some(value));
//! ```

mod decode;
mod encode;
mod errors;
mod payload;
mod serde;
mod value;

pub use decode::{MAX_NESTING_DEPTH, decode_multi, decode_value};
pub use encode::{WIDE_INT_KEY, encode_value, is_hex_string};
pub use errors::{CodecError, CodecResult};
pub use payload::{
    NotePayload, PayloadOptions, SegmentMode, encode_commit_data, select_tier,
    split_into_segments,
};
pub use value::NoteValue;
