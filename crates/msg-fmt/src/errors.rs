use rmp::decode::{NumValueReadError, ValueReadError};
use thiserror::Error;

/// Errors from encoding, decoding and segmenting NOTE payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Encoded payload exceeds the ceiling of the selected tier.
    #[error("payload of {len} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Encoded length.
        len: usize,
        /// Ceiling that was exceeded.
        limit: usize,
    },

    /// A single segment is larger than one script push.
    #[error("segment {index} of {len} bytes exceeds the {limit} byte push limit")]
    SegmentTooLarge {
        /// Position of the segment.
        index: usize,
        /// Its length.
        len: usize,
        /// Push limit.
        limit: usize,
    },

    /// Integer below the signed 64-bit range, which has no wire form.
    #[error("integer {0} is out of range")]
    IntegerOutOfRange(i128),

    /// Wide integer marker carries more bits than fit.
    #[error("wide integer marker does not fit in 128 bits")]
    WideIntegerOverflow,

    /// Message ended in the middle of a value.
    #[error("buffer too short")]
    BufTooShort,

    /// Marker byte not used by the NOTE wire format.
    #[error("unsupported marker {0:#04x}")]
    UnsupportedMarker(u8),

    /// String field is not UTF-8.
    #[error("invalid utf-8 in string")]
    InvalidUtf8,

    /// Map key is not a string or integer.
    #[error("map key is not a string")]
    NonStringKey,

    /// Values nest deeper than the decoder allows.
    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),

    /// Map messages mixed with other messages in one buffer.
    #[error("cannot merge map and non-map messages")]
    MixedMessages,

    /// Segment text is not hex.
    #[error("invalid hex in segment: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Writing to the output buffer failed.
    #[error("write: {0}")]
    Write(#[from] rmp::encode::ValueWriteError),

    /// Writing to the output buffer failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValueReadError> for CodecError {
    fn from(e: ValueReadError) -> Self {
        match e {
            ValueReadError::InvalidMarkerRead(_) | ValueReadError::InvalidDataRead(_) => {
                CodecError::BufTooShort
            }
            ValueReadError::TypeMismatch(m) => CodecError::UnsupportedMarker(m.to_u8()),
        }
    }
}

impl From<NumValueReadError> for CodecError {
    fn from(e: NumValueReadError) -> Self {
        match e {
            NumValueReadError::InvalidMarkerRead(_) | NumValueReadError::InvalidDataRead(_) => {
                CodecError::BufTooShort
            }
            NumValueReadError::TypeMismatch(m) => CodecError::UnsupportedMarker(m.to_u8()),
            // Every msgpack integer fits in an i128.
            NumValueReadError::OutOfRange => CodecError::WideIntegerOverflow,
        }
    }
}

/// Wrapper result type.
pub type CodecResult<T> = Result<T, CodecError>;
