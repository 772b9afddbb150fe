use bitcoin::{
    Opcode, Script, XOnlyPublicKey,
    opcodes::all::{OP_2DROP, OP_CHECKSIG, OP_DROP, OP_ENDIF, OP_IF, OP_PUSHNUM_1, OP_PUSHNUM_16, OP_PUSHNUM_NEG1},
    script::Instruction,
};

use crate::{NOTE_TAG, ProtocolTag, builder::DropTail, errors::EnvelopeParseError};

/// A NOTE leaf script broken into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteScript {
    tag: ProtocolTag,
    data: Option<Vec<u8>>,
    tail: DropTail,
    pubkey: XOnlyPublicKey,
}

impl NoteScript {
    /// Gets the protocol tag.
    pub fn tag(&self) -> ProtocolTag {
        self.tag
    }

    /// Gets the committed envelope data, if the leaf has an envelope.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Gets the drop tail.
    pub fn tail(&self) -> DropTail {
        self.tail
    }

    /// Gets the key checked at the end of the leaf.
    pub fn pubkey(&self) -> &XOnlyPublicKey {
        &self.pubkey
    }

    /// Consumes the parsed script, returning the envelope data.
    pub fn into_data(self) -> Option<Vec<u8>> {
        self.data
    }
}

/// Extract next instruction and try to parse it as an opcode
pub fn next_op<'a>(instructions: &mut impl Iterator<Item = Instruction<'a>>) -> Option<Opcode> {
    match instructions.next() {
        Some(Instruction::Op(op)) => Some(op),
        _ => None,
    }
}

/// Parses a NOTE leaf script.
///
/// # Errors
///
/// Returns [`EnvelopeParseError`] if the script does not follow one of the NOTE
/// leaf grammars for the NOTE tag.
pub fn parse_note_script(script: &Script) -> Result<NoteScript, EnvelopeParseError> {
    let instructions = script
        .instructions()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| EnvelopeParseError::InvalidPayload)?;
    let mut instructions = instructions.into_iter().peekable();

    let tag = match instructions.next() {
        Some(Instruction::PushBytes(b)) => {
            ProtocolTag::from_slice(b.as_bytes()).ok_or(EnvelopeParseError::MissingTag)?
        }
        _ => return Err(EnvelopeParseError::MissingTag),
    };
    if tag != NOTE_TAG {
        return Err(EnvelopeParseError::TagMismatch(tag));
    }

    // OP_FALSE is basically empty PushBytes
    let has_envelope = matches!(
        instructions.peek(),
        Some(Instruction::PushBytes(b)) if b.as_bytes().is_empty()
    );
    let data = if has_envelope {
        instructions.next();
        if next_op(&mut instructions) != Some(OP_IF) {
            return Err(EnvelopeParseError::MissingOpIf);
        }
        Some(extract_until_op_endif(&mut instructions)?)
    } else {
        None
    };

    let tail = match next_op(&mut instructions) {
        Some(OP_DROP) => DropTail::Tag,
        Some(OP_2DROP) => {
            let rest = [next_op(&mut instructions), next_op(&mut instructions)];
            if rest != [Some(OP_2DROP), Some(OP_2DROP)] {
                return Err(EnvelopeParseError::MissingDropTail);
            }
            DropTail::Segments
        }
        _ => return Err(EnvelopeParseError::MissingDropTail),
    };

    let pubkey = match instructions.next() {
        Some(Instruction::PushBytes(b)) => XOnlyPublicKey::from_slice(b.as_bytes())
            .map_err(|_| EnvelopeParseError::MissingPubkey)?,
        _ => return Err(EnvelopeParseError::MissingPubkey),
    };

    if next_op(&mut instructions) != Some(OP_CHECKSIG) {
        return Err(EnvelopeParseError::MissingChecksig);
    }
    if instructions.next().is_some() {
        return Err(EnvelopeParseError::TrailingInstructions);
    }

    Ok(NoteScript {
        tag,
        data,
        tail,
        pubkey,
    })
}

/// Extracts the committed data from a commit-family NOTE leaf.
///
/// # Errors
///
/// Returns [`EnvelopeParseError::NoEnvelope`] for leaves without an envelope,
/// and any error from [`parse_note_script`].
pub fn parse_envelope_payload(script: &Script) -> Result<Vec<u8>, EnvelopeParseError> {
    parse_note_script(script)?
        .into_data()
        .ok_or(EnvelopeParseError::NoEnvelope)
}

/// Collects pushed bytes until `OP_ENDIF`.
fn extract_until_op_endif<'a>(
    instructions: &mut impl Iterator<Item = Instruction<'a>>,
) -> Result<Vec<u8>, EnvelopeParseError> {
    let mut data = vec![];
    for elem in instructions {
        match elem {
            Instruction::Op(OP_ENDIF) => return Ok(data),
            Instruction::PushBytes(b) => data.extend_from_slice(b.as_bytes()),
            Instruction::Op(OP_PUSHNUM_NEG1) => data.push(0x81),
            Instruction::Op(op)
                if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&op.to_u8()) =>
            {
                data.push(op.to_u8() - OP_PUSHNUM_1.to_u8() + 1);
            }
            _ => return Err(EnvelopeParseError::InvalidPayload),
        }
    }
    // Ran out of instructions without closing the envelope.
    Err(EnvelopeParseError::InvalidPayload)
}

#[cfg(test)]
mod tests {
    use bitcoin::{
        ScriptBuf,
        blockdata::script,
        secp256k1::{Secp256k1, SecretKey},
    };

    use super::*;
    use crate::builder::{
        FallbackKey, NoteScriptBuilder, build_commit_data_script, build_commit_note_script,
        build_fallback_script, build_note_script,
    };

    fn xonly() -> XOnlyPublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0x22; 32]).unwrap();
        sk.x_only_public_key(&secp).0
    }

    #[test]
    fn test_parse_mint_script() {
        let key = xonly();
        let parsed = parse_note_script(&build_note_script(&key)).unwrap();
        assert_eq!(parsed.tag(), NOTE_TAG);
        assert_eq!(parsed.data(), None);
        assert_eq!(parsed.tail(), DropTail::Segments);
        assert_eq!(parsed.pubkey(), &key);
    }

    #[test]
    fn test_parse_envelope_data() {
        let key = xonly();

        let small = vec![0, 1, 2, 3, 0x81, 16];
        let script = build_commit_data_script(&key, &small).unwrap();
        let parsed = parse_note_script(&script).unwrap();
        assert_eq!(parsed.tail(), DropTail::Tag);
        assert_eq!(parsed.data(), Some(small.as_slice()));

        // Try with larger size, ending on a lone minimal-push byte
        let mut large = vec![0xee; 1040];
        large.push(7);
        let script = build_commit_note_script(&key, &large).unwrap();
        let parsed = parse_note_script(&script).unwrap();
        assert_eq!(parsed.tail(), DropTail::Segments);
        assert_eq!(parse_envelope_payload(&script).unwrap(), large);
    }

    #[test]
    fn test_parse_empty_envelope() {
        let key = xonly();
        let script = build_commit_data_script(&key, &[]).unwrap();
        assert_eq!(parse_envelope_payload(&script).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_rejects_other_grammars() {
        let key = xonly();

        assert_eq!(
            parse_envelope_payload(&build_note_script(&key)),
            Err(EnvelopeParseError::NoEnvelope)
        );

        let fallback = build_fallback_script(FallbackKey::XOnly(key));
        assert_eq!(
            parse_note_script(&fallback),
            Err(EnvelopeParseError::MissingTag)
        );

        let other_tag = NoteScriptBuilder::with_pubkey(key)
            .tag(ProtocolTag::new(*b"ABCD"))
            .build()
            .unwrap();
        assert_eq!(
            parse_note_script(&other_tag),
            Err(EnvelopeParseError::TagMismatch(ProtocolTag::new(*b"ABCD")))
        );

        let short_tail: ScriptBuf = script::Builder::new()
            .push_slice(NOTE_TAG.as_bytes())
            .push_opcode(OP_2DROP)
            .push_x_only_key(&key)
            .push_opcode(OP_CHECKSIG)
            .into_script();
        assert_eq!(
            parse_note_script(&short_tail),
            Err(EnvelopeParseError::MissingDropTail)
        );

        let unterminated: ScriptBuf = script::Builder::new()
            .push_slice(NOTE_TAG.as_bytes())
            .push_opcode(bitcoin::opcodes::OP_FALSE)
            .push_opcode(OP_IF)
            .push_slice([0xaa, 0xbb])
            .into_script();
        assert_eq!(
            parse_note_script(&unterminated),
            Err(EnvelopeParseError::InvalidPayload)
        );
    }
}
