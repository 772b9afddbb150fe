use thiserror::Error;

use crate::ProtocolTag;

/// Errors that can occur while parsing NOTE leaf scripts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeParseError {
    /// The script does not start with a 4-byte tag push.
    #[error("missing protocol tag")]
    MissingTag,

    /// The script starts with a different protocol tag.
    #[error("unexpected protocol tag {0}")]
    TagMismatch(ProtocolTag),

    /// The leaf has no `OP_FALSE OP_IF` envelope.
    #[error("no envelope found in script")]
    NoEnvelope,

    /// OP_FALSE not followed by OP_IF in envelope structure.
    #[error("OP_FALSE must be followed by OP_IF")]
    MissingOpIf,

    /// The envelope data is malformed or contains invalid instructions.
    #[error("invalid payload data")]
    InvalidPayload,

    /// Neither `OP_2DROP x3` nor `OP_DROP` follows the tag or envelope.
    #[error("missing drop tail")]
    MissingDropTail,

    /// Missing or invalid x-only pubkey before the checksig.
    #[error("missing or invalid pubkey")]
    MissingPubkey,

    /// Missing OP_CHECKSIG after the pubkey.
    #[error("missing CHECKSIG after pubkey")]
    MissingChecksig,

    /// Instructions found after OP_CHECKSIG.
    #[error("trailing instructions after CHECKSIG")]
    TrailingInstructions,
}

/// Errors that can occur while building NOTE leaf scripts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeBuildError {
    /// Failed to convert a payload chunk into `PushBytesBuf`.
    #[error("failed to convert {chunk_size} byte payload chunk to push bytes buffer")]
    PayloadChunkConversion {
        /// Size of the chunk that failed to convert.
        chunk_size: usize,
    },

    /// The payload needs more chunks than an envelope may carry.
    #[error("payload needs {segments} segments, limit is {limit}")]
    TooManySegments {
        /// Number of 520-byte chunks the payload splits into.
        segments: usize,
        /// Maximum number of chunks allowed.
        limit: usize,
    },
}
