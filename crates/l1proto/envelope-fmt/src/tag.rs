use std::fmt;
use std::str;

/// Length of the protocol tag in bytes.
pub const PROTOCOL_TAG_LEN: usize = 4;

/// The NOTE protocol tag, `4e4f5445` on the wire.
pub const NOTE_TAG: ProtocolTag = ProtocolTag::new(*b"NOTE");

/// Protocol tag pushed as the first element of every NOTE leaf script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolTag([u8; PROTOCOL_TAG_LEN]);

impl ProtocolTag {
    /// Creates a new tag from a [`PROTOCOL_TAG_LEN`]-byte array.
    pub const fn new(bytes: [u8; PROTOCOL_TAG_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the tag as a byte array.
    pub const fn as_bytes(&self) -> &[u8; PROTOCOL_TAG_LEN] {
        &self.0
    }

    /// Returns the tag as a string slice if valid ASCII.
    pub fn as_str(&self) -> Option<&str> {
        str::from_utf8(&self.0).ok()
    }

    /// Tries to read a tag from a pushed script element.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; PROTOCOL_TAG_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl Default for ProtocolTag {
    fn default() -> Self {
        NOTE_TAG
    }
}

impl AsRef<[u8]> for ProtocolTag {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "{:?}", self.0),
        }
    }
}

impl str::FromStr for ProtocolTag {
    type Err = InvalidProtocolTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_ascii() {
            return Err(InvalidProtocolTag::NotAscii);
        }
        Self::from_slice(s.as_bytes()).ok_or(InvalidProtocolTag::InvalidLength)
    }
}

/// Error type for invalid protocol tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidProtocolTag {
    /// The input string is not exactly [`PROTOCOL_TAG_LEN`] bytes long.
    InvalidLength,
    /// The input string contains non-ASCII characters.
    NotAscii,
}

impl fmt::Display for InvalidProtocolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength => write!(
                f,
                "protocol tag must be exactly {} characters",
                PROTOCOL_TAG_LEN
            ),
            Self::NotAscii => write!(f, "protocol tag must be ASCII"),
        }
    }
}

impl std::error::Error for InvalidProtocolTag {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_tag_wire_bytes() {
        assert_eq!(NOTE_TAG.as_bytes(), &[0x4e, 0x4f, 0x54, 0x45]);
        assert_eq!(NOTE_TAG.to_string(), "NOTE");
    }

    #[test]
    fn test_from_str() {
        let tag: ProtocolTag = "NOTE".parse().unwrap();
        assert_eq!(tag, NOTE_TAG);
        assert!("NOT".parse::<ProtocolTag>().is_err());
        assert!("NOTES".parse::<ProtocolTag>().is_err());
        assert_eq!(
            "NOé".parse::<ProtocolTag>(),
            Err(InvalidProtocolTag::NotAscii)
        );
    }

    #[test]
    fn test_from_slice() {
        assert_eq!(ProtocolTag::from_slice(b"NOTE"), Some(NOTE_TAG));
        assert_eq!(ProtocolTag::from_slice(b"NO"), None);
    }
}
