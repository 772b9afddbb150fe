//! The five-segment NOTE payload and its segmentation tiers.

use note_envelope_fmt::constants::{
    MAX_DATA_SEGMENTS, MAX_DATA_SEGMENTS_LIMIT, MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_FULL_SIZE,
    MAX_STACK_FULL_SIZE, MAX_STANDARD_STACK_ITEM_SIZE,
};

use crate::{
    decode::decode_multi,
    encode::encode_value,
    errors::{CodecError, CodecResult},
    value::NoteValue,
};

/// How an encoded payload is laid out over the five segments.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SegmentMode {
    /// Split into standard-stack-item sized chunks, falling back to script
    /// element chunks when the larger tier is allowed.
    #[default]
    Split,

    /// Everything in the first segment.
    Single,
}

/// Options for [`NotePayload::from_value`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PayloadOptions {
    /// Segment layout.
    pub mode: SegmentMode,

    /// Permit the 520-byte chunk tier for payloads above 400 bytes.
    pub allow_script_tier: bool,
}

/// A NOTE payload: five fixed-position data segments and an optional locktime.
///
/// Unused segments are empty, never absent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NotePayload {
    segments: [Vec<u8>; MAX_DATA_SEGMENTS],
    locktime: Option<u32>,
}

impl NotePayload {
    /// Constructs a payload from raw segments.
    ///
    /// Each segment must fit in one script push, which also caps the total
    /// at the script tier ceiling.
    pub fn new(
        segments: [Vec<u8>; MAX_DATA_SEGMENTS],
        locktime: Option<u32>,
    ) -> CodecResult<Self> {
        for (index, seg) in segments.iter().enumerate() {
            if seg.len() > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(CodecError::SegmentTooLarge {
                    index,
                    len: seg.len(),
                    limit: MAX_SCRIPT_ELEMENT_SIZE,
                });
            }
        }

        Ok(Self { segments, locktime })
    }

    /// Encodes `value` and lays it out over the segments.
    pub fn from_value(value: &NoteValue, opts: PayloadOptions) -> CodecResult<Self> {
        let encoded = encode_value(value)?;
        Self::from_encoded(&encoded, opts)
    }

    /// Lays out an already encoded message over the segments.
    pub fn from_encoded(encoded: &[u8], opts: PayloadOptions) -> CodecResult<Self> {
        let chunk_size = select_tier(encoded.len(), opts.allow_script_tier)?;

        let mut segments: [Vec<u8>; MAX_DATA_SEGMENTS] = Default::default();
        match opts.mode {
            SegmentMode::Single => {
                if encoded.len() > MAX_SCRIPT_ELEMENT_SIZE {
                    return Err(CodecError::PayloadTooLarge {
                        len: encoded.len(),
                        limit: MAX_SCRIPT_ELEMENT_SIZE,
                    });
                }
                segments[0] = encoded.to_vec();
            }
            SegmentMode::Split => {
                let chunks = split_into_segments(encoded, chunk_size, MAX_DATA_SEGMENTS)?;
                for (slot, chunk) in segments.iter_mut().zip(chunks) {
                    *slot = chunk.to_vec();
                }
            }
        }

        Ok(Self {
            segments,
            locktime: None,
        })
    }

    /// Returns a copy with the locktime override set.
    pub fn with_locktime(mut self, locktime: u32) -> Self {
        self.locktime = Some(locktime);
        self
    }

    /// Sets the locktime override.
    pub fn set_locktime(&mut self, locktime: Option<u32>) {
        self.locktime = locktime;
    }

    /// Gets the locktime override.
    pub fn locktime(&self) -> Option<u32> {
        self.locktime
    }

    /// Gets the segments in witness order.
    pub fn segments(&self) -> &[Vec<u8>; MAX_DATA_SEGMENTS] {
        &self.segments
    }

    /// Concatenates the segments back into the encoded message.
    pub fn encoded(&self) -> Vec<u8> {
        self.segments.concat()
    }

    /// Total size of the segments in bytes.
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// Whether every segment is empty.
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(Vec::is_empty)
    }

    /// Decodes the segments back into a value.
    pub fn decode(&self) -> CodecResult<Option<NoteValue>> {
        decode_multi(&self.encoded())
    }
}

/// Returns the chunk size for an encoded length.
///
/// Fails rather than truncating when no tier fits.
pub fn select_tier(len: usize, allow_script_tier: bool) -> CodecResult<usize> {
    if len <= MAX_STACK_FULL_SIZE {
        Ok(MAX_STANDARD_STACK_ITEM_SIZE)
    } else if allow_script_tier && len <= MAX_SCRIPT_FULL_SIZE {
        Ok(MAX_SCRIPT_ELEMENT_SIZE)
    } else {
        let limit = if allow_script_tier {
            MAX_SCRIPT_FULL_SIZE
        } else {
            MAX_STACK_FULL_SIZE
        };
        Err(CodecError::PayloadTooLarge { len, limit })
    }
}

/// Splits `buf` into chunks of at most `size` bytes, failing if more than
/// `max_segments` chunks would be needed.
pub fn split_into_segments(
    buf: &[u8],
    size: usize,
    max_segments: usize,
) -> CodecResult<Vec<&[u8]>> {
    let limit = size.saturating_mul(max_segments);
    if buf.len() > limit {
        return Err(CodecError::PayloadTooLarge {
            len: buf.len(),
            limit,
        });
    }
    Ok(buf.chunks(size.max(1)).collect())
}

/// Encodes a value for embedding in a commit envelope.
///
/// The result goes into the leaf script rather than the witness, so the
/// ceiling is the commit segment limit instead of the five-segment tiers.
pub fn encode_commit_data(value: &NoteValue) -> CodecResult<Vec<u8>> {
    let encoded = encode_value(value)?;
    split_into_segments(&encoded, MAX_SCRIPT_ELEMENT_SIZE, MAX_DATA_SEGMENTS_LIMIT)?;
    Ok(encoded)
}
