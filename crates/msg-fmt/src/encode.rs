//! Canonical msgpack encoding of [`NoteValue`]s.

use rmp::encode;

use crate::{
    errors::{CodecError, CodecResult},
    value::NoteValue,
};

/// Key of the one-field map that carries integers wider than 64 bits.
pub const WIDE_INT_KEY: &str = "_b";

/// Encodes a value into its canonical msgpack form.
///
/// Map keys are written in sorted order. Within maps, string fields that look
/// like even-length hex are written as raw bytes. Integers above the signed
/// 64-bit range are wrapped in a `{"_b": <big-endian bytes>}` map.
pub fn encode_value(value: &NoteValue) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    write_value(&mut buf, value)?;
    Ok(buf)
}

/// Returns whether a string is carried as raw bytes when it is a map field.
pub fn is_hex_string(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn write_value(buf: &mut Vec<u8>, value: &NoteValue) -> CodecResult<()> {
    match value {
        NoteValue::Nil => encode::write_nil(buf)?,
        NoteValue::Bool(b) => encode::write_bool(buf, *b)?,
        NoteValue::Int(v) => write_int(buf, *v)?,
        NoteValue::Float(v) => encode::write_f64(buf, *v)?,
        NoteValue::Str(s) => encode::write_str(buf, s)?,
        NoteValue::Array(items) => {
            encode::write_array_len(buf, len_u32(items.len())?)?;
            for item in items {
                write_value(buf, item)?;
            }
        }
        NoteValue::Map(entries) => {
            encode::write_map_len(buf, len_u32(entries.len())?)?;
            for (key, field) in entries {
                encode::write_str(buf, key)?;
                match field {
                    NoteValue::Str(s) if is_hex_string(s) => {
                        encode::write_bin(buf, &hex::decode(s)?)?;
                    }
                    other => write_value(buf, other)?,
                }
            }
        }
    }
    Ok(())
}

fn write_int(buf: &mut Vec<u8>, v: i128) -> CodecResult<()> {
    if let Ok(s) = i64::try_from(v) {
        match u64::try_from(s) {
            Ok(u) => encode::write_uint(buf, u)?,
            Err(_) => encode::write_sint(buf, s)?,
        };
        return Ok(());
    }
    if v < 0 {
        return Err(CodecError::IntegerOutOfRange(v));
    }

    let bytes = v.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    encode::write_map_len(buf, 1)?;
    encode::write_str(buf, WIDE_INT_KEY)?;
    encode::write_bin(buf, &bytes[first..])?;
    Ok(())
}

fn len_u32(len: usize) -> CodecResult<u32> {
    u32::try_from(len).map_err(|_| CodecError::PayloadTooLarge {
        len,
        limit: u32::MAX as usize,
    })
}
