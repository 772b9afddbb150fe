use bitcoin::{
    PublicKey, ScriptBuf, XOnlyPublicKey,
    blockdata::script,
    opcodes::{
        OP_FALSE,
        all::{OP_2DROP, OP_CHECKSIG, OP_DROP, OP_ENDIF, OP_IF},
    },
    script::PushBytesBuf,
    secp256k1,
};

use crate::{
    NOTE_TAG, ProtocolTag,
    constants::{MAX_DATA_SEGMENTS, MAX_DATA_SEGMENTS_LIMIT, MAX_SCRIPT_ELEMENT_SIZE},
    errors::EnvelopeBuildError,
};

/// How a NOTE leaf clears the stack before the final key check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTail {
    /// `OP_2DROP OP_2DROP OP_2DROP`, drops the tag together with the five
    /// payload segments supplied in the witness.
    Segments,

    /// `OP_DROP`, drops only the tag.
    Tag,
}

impl DropTail {
    /// Number of payload segments a spend of this leaf must put in its witness.
    pub fn witness_segments(&self) -> usize {
        match self {
            DropTail::Segments => MAX_DATA_SEGMENTS,
            DropTail::Tag => 0,
        }
    }
}

/// Key pushed by the fallback `<key> OP_CHECKSIG` leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKey {
    /// 33-byte compressed key, used by the first NOTE generation.
    Compressed(secp256k1::PublicKey),

    /// 32-byte x-only key.
    XOnly(XOnlyPublicKey),
}

/// Builder for NOTE leaf scripts.
///
/// ```text
/// <tag> [OP_FALSE OP_IF <chunks> OP_ENDIF] <drop tail> <xonly_pubkey> OP_CHECKSIG
/// ```
#[derive(Debug, Clone)]
pub struct NoteScriptBuilder<'a> {
    tag: ProtocolTag,
    pubkey: XOnlyPublicKey,
    envelope: Option<&'a [u8]>,
    tail: DropTail,
}

impl<'a> NoteScriptBuilder<'a> {
    /// Starts a mint-grammar leaf for the given key.
    pub fn with_pubkey(pubkey: XOnlyPublicKey) -> Self {
        Self {
            tag: NOTE_TAG,
            pubkey,
            envelope: None,
            tail: DropTail::Segments,
        }
    }

    /// Overrides the protocol tag.
    pub fn tag(mut self, tag: ProtocolTag) -> Self {
        self.tag = tag;
        self
    }

    /// Embeds `data` in an `OP_FALSE OP_IF ... OP_ENDIF` envelope.
    pub fn envelope(mut self, data: &'a [u8]) -> Self {
        self.envelope = Some(data);
        self
    }

    /// Sets the drop tail.
    pub fn tail(mut self, tail: DropTail) -> Self {
        self.tail = tail;
        self
    }

    /// Assembles the script.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeBuildError`] if the envelope needs more than
    /// [`MAX_DATA_SEGMENTS_LIMIT`] chunks.
    pub fn build(self) -> Result<ScriptBuf, EnvelopeBuildError> {
        let mut builder = script::Builder::new().push_slice(self.tag.as_bytes());

        if let Some(data) = self.envelope {
            builder = push_envelope(builder, data)?;
        }

        builder = match self.tail {
            DropTail::Segments => builder
                .push_opcode(OP_2DROP)
                .push_opcode(OP_2DROP)
                .push_opcode(OP_2DROP),
            DropTail::Tag => builder.push_opcode(OP_DROP),
        };

        Ok(builder
            .push_x_only_key(&self.pubkey)
            .push_opcode(OP_CHECKSIG)
            .into_script())
    }
}

/// Builds the mint leaf, which carries no data of its own.
///
/// ```text
/// <tag> OP_2DROP OP_2DROP OP_2DROP <xonly_pubkey> OP_CHECKSIG
/// ```
pub fn build_note_script(pubkey: &XOnlyPublicKey) -> ScriptBuf {
    script::Builder::new()
        .push_slice(NOTE_TAG.as_bytes())
        .push_opcode(OP_2DROP)
        .push_opcode(OP_2DROP)
        .push_opcode(OP_2DROP)
        .push_x_only_key(pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Builds the commit-note leaf: committed data plus the five-segment drop tail.
pub fn build_commit_note_script(
    pubkey: &XOnlyPublicKey,
    data: &[u8],
) -> Result<ScriptBuf, EnvelopeBuildError> {
    NoteScriptBuilder::with_pubkey(*pubkey)
        .envelope(data)
        .tail(DropTail::Segments)
        .build()
}

/// Builds the commit-data leaf: committed data, only the tag is dropped.
pub fn build_commit_data_script(
    pubkey: &XOnlyPublicKey,
    data: &[u8],
) -> Result<ScriptBuf, EnvelopeBuildError> {
    NoteScriptBuilder::with_pubkey(*pubkey)
        .envelope(data)
        .tail(DropTail::Tag)
        .build()
}

/// Builds the `<key> OP_CHECKSIG` leaf that spends a NOTE output without
/// protocol semantics.
pub fn build_fallback_script(key: FallbackKey) -> ScriptBuf {
    let builder = match key {
        FallbackKey::Compressed(pk) => script::Builder::new().push_key(&PublicKey::new(pk)),
        FallbackKey::XOnly(xonly) => script::Builder::new().push_x_only_key(&xonly),
    };
    builder.push_opcode(OP_CHECKSIG).into_script()
}

/// Extends the builder with `OP_FALSE OP_IF <chunks> OP_ENDIF`.
fn push_envelope(
    mut builder: script::Builder,
    data: &[u8],
) -> Result<script::Builder, EnvelopeBuildError> {
    let segments = data.len().div_ceil(MAX_SCRIPT_ELEMENT_SIZE);
    if segments > MAX_DATA_SEGMENTS_LIMIT {
        return Err(EnvelopeBuildError::TooManySegments {
            segments,
            limit: MAX_DATA_SEGMENTS_LIMIT,
        });
    }

    builder = builder.push_opcode(OP_FALSE).push_opcode(OP_IF);
    for chunk in data.chunks(MAX_SCRIPT_ELEMENT_SIZE) {
        builder = push_chunk(builder, chunk)?;
    }

    Ok(builder.push_opcode(OP_ENDIF))
}

/// Pushes a chunk with minimal encoding, so single bytes that have a
/// dedicated opcode use it.
fn push_chunk(
    builder: script::Builder,
    chunk: &[u8],
) -> Result<script::Builder, EnvelopeBuildError> {
    match chunk {
        [b @ 1..=16] => Ok(builder.push_int(i64::from(*b))),
        [0x81] => Ok(builder.push_int(-1)),
        _ => {
            let push_bytes = PushBytesBuf::try_from(chunk.to_vec()).map_err(|_| {
                EnvelopeBuildError::PayloadChunkConversion {
                    chunk_size: chunk.len(),
                }
            })?;
            Ok(builder.push_slice(push_bytes))
        }
    }
}
