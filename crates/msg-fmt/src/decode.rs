//! Decoding of NOTE msgpack messages back into [`NoteValue`]s.

use std::collections::BTreeMap;

use rmp::{Marker, decode};

use crate::{
    encode::{WIDE_INT_KEY, is_hex_string},
    errors::{CodecError, CodecResult},
    value::NoteValue,
};

/// Deepest nesting of arrays and maps the decoder accepts.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Decodes one complete message from the front of `buf`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_value(buf: &[u8]) -> CodecResult<(NoteValue, usize)> {
    let mut rd = buf;
    let value = read_value(&mut rd, 0)?;
    Ok((value, buf.len() - rd.len()))
}

/// Decodes a buffer holding one or more concatenated messages.
///
/// When the first message is a map, every message must be a map and their
/// fields are merged, later messages overriding earlier ones. Otherwise a
/// single message is returned as is and several are returned as an array.
/// An empty buffer decodes to `None`.
pub fn decode_multi(buf: &[u8]) -> CodecResult<Option<NoteValue>> {
    let mut results = Vec::new();
    let mut rest = buf;
    while !rest.is_empty() {
        let (value, used) = decode_value(rest)?;
        results.push(value);
        rest = &rest[used..];
    }

    let mut iter = results.into_iter();
    let Some(first) = iter.next() else {
        return Ok(None);
    };

    match first {
        NoteValue::Map(mut merged) => {
            for next in iter {
                match next {
                    NoteValue::Map(m) => merged.extend(m),
                    _ => return Err(CodecError::MixedMessages),
                }
            }
            Ok(Some(NoteValue::Map(merged)))
        }
        other => {
            let rest: Vec<_> = iter.collect();
            if rest.is_empty() {
                Ok(Some(other))
            } else {
                let mut all = Vec::with_capacity(rest.len() + 1);
                all.push(other);
                all.extend(rest);
                Ok(Some(NoteValue::Array(all)))
            }
        }
    }
}

fn read_value(rd: &mut &[u8], depth: usize) -> CodecResult<NoteValue> {
    let byte = *rd.first().ok_or(CodecError::BufTooShort)?;
    let value = match Marker::from_u8(byte) {
        Marker::Null => {
            decode::read_nil(rd)?;
            NoteValue::Nil
        }
        Marker::True | Marker::False => NoteValue::Bool(decode::read_bool(rd)?),
        Marker::FixPos(_)
        | Marker::FixNeg(_)
        | Marker::U8
        | Marker::U16
        | Marker::U32
        | Marker::U64
        | Marker::I8
        | Marker::I16
        | Marker::I32
        | Marker::I64 => NoteValue::Int(decode::read_int(rd)?),
        Marker::F32 => NoteValue::Float(decode::read_f32(rd)?.into()),
        Marker::F64 => NoteValue::Float(decode::read_f64(rd)?),
        Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
            let len = decode::read_str_len(rd)?;
            let bytes = take(rd, len)?;
            let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
            NoteValue::Str(s.to_owned())
        }
        // Binary comes back as the lowercase hex text it was written from.
        Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => {
            let len = decode::read_bin_len(rd)?;
            NoteValue::Str(hex::encode(take(rd, len)?))
        }
        Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
            let len = decode::read_array_len(rd)?;
            read_array(rd, len as usize, depth)?
        }
        Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
            let len = decode::read_map_len(rd)?;
            read_map(rd, len as usize, depth)?
        }
        _ => return Err(CodecError::UnsupportedMarker(byte)),
    };
    Ok(value)
}

fn take<'b>(rd: &mut &'b [u8], len: u32) -> CodecResult<&'b [u8]> {
    let len = len as usize;
    if rd.len() < len {
        return Err(CodecError::BufTooShort);
    }
    let (head, tail) = rd.split_at(len);
    *rd = tail;
    Ok(head)
}

fn read_array(rd: &mut &[u8], len: usize, depth: usize) -> CodecResult<NoteValue> {
    let depth = enter(depth)?;
    // Every element takes at least one byte.
    let mut items = Vec::with_capacity(len.min(rd.len()));
    for _ in 0..len {
        items.push(read_value(rd, depth)?);
    }
    Ok(NoteValue::Array(items))
}

fn read_map(rd: &mut &[u8], len: usize, depth: usize) -> CodecResult<NoteValue> {
    let depth = enter(depth)?;
    let mut entries = BTreeMap::new();
    for _ in 0..len {
        let key = match read_value(rd, depth)? {
            NoteValue::Str(s) => s,
            NoteValue::Int(i) => i.to_string(),
            _ => return Err(CodecError::NonStringKey),
        };
        let value = read_value(rd, depth)?;
        entries.insert(key, value);
    }
    unwrap_wide_int(entries)
}

fn enter(depth: usize) -> CodecResult<usize> {
    let next = depth + 1;
    if next > MAX_NESTING_DEPTH {
        return Err(CodecError::NestingTooDeep(MAX_NESTING_DEPTH));
    }
    Ok(next)
}

/// Collapses a `{"_b": <bytes>}` map back into the integer it carries.
fn unwrap_wide_int(entries: BTreeMap<String, NoteValue>) -> CodecResult<NoteValue> {
    if entries.len() == 1 {
        if let Some(NoteValue::Str(hex_str)) = entries.get(WIDE_INT_KEY) {
            if is_hex_string(hex_str) {
                let bytes = hex::decode(hex_str)?;
                return Ok(NoteValue::Int(wide_int_from_be(&bytes)?));
            }
        }
    }
    Ok(NoteValue::Map(entries))
}

fn wide_int_from_be(bytes: &[u8]) -> CodecResult<i128> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let significant = &bytes[first..];
    if significant.len() > 16 {
        return Err(CodecError::WideIntegerOverflow);
    }
    let mut padded = [0u8; 16];
    padded[16 - significant.len()..].copy_from_slice(significant);
    i128::try_from(u128::from_be_bytes(padded)).map_err(|_| CodecError::WideIntegerOverflow)
}
