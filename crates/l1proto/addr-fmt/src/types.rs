use std::{fmt, str};

use bitcoin::Script;
use sha2::{Digest, Sha256};

use crate::error::AddrFmtError;

/// Every spend type the engine can lock funds to.
///
/// The type decides the locking script shape and, later on, how an input
/// spending such an output is built, signed and finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    /// Legacy pay-to-pubkey-hash.
    PlainKeyHash,
    /// Pay-to-script-hash wrapping a witness key hash.
    ScriptHash,
    /// Native segwit v0 key hash.
    WitnessKeyHash,
    /// Native segwit v0 script hash over a key-hash witness script.
    WitnessScriptHash,
    /// Taproot key-path output without a script tree.
    TaprootKey,
    /// First-generation NOTE tree, fallback leaf keyed by the compressed key.
    TaprootNoteV1,
    /// NOTE tree with the mint leaf.
    TaprootNote,
    /// NOTE tree whose leaf commits to data and still drops five segments.
    TaprootCommitNote,
    /// NOTE tree whose leaf commits to data and drops only the tag.
    TaprootCommitData,
}

impl AddressType {
    /// All types, in declaration order.
    pub const ALL: [AddressType; 9] = [
        AddressType::PlainKeyHash,
        AddressType::ScriptHash,
        AddressType::WitnessKeyHash,
        AddressType::WitnessScriptHash,
        AddressType::TaprootKey,
        AddressType::TaprootNoteV1,
        AddressType::TaprootNote,
        AddressType::TaprootCommitNote,
        AddressType::TaprootCommitData,
    ];

    /// Name used by the chain service.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AddressType::PlainKeyHash => "P2PKH",
            AddressType::ScriptHash => "P2SH",
            AddressType::WitnessKeyHash => "P2WPKH",
            AddressType::WitnessScriptHash => "P2WSH",
            AddressType::TaprootKey => "P2TR",
            AddressType::TaprootNoteV1 => "P2TR-NOTE-V1",
            AddressType::TaprootNote => "P2TR-NOTE",
            AddressType::TaprootCommitNote => "P2TR-COMMIT-NOTE",
            AddressType::TaprootCommitData => "P2TR-COMMIT-DATA",
        }
    }

    /// Whether the output is a 2-leaf NOTE tree.
    pub const fn is_note_tree(&self) -> bool {
        matches!(
            self,
            AddressType::TaprootNoteV1
                | AddressType::TaprootNote
                | AddressType::TaprootCommitNote
                | AddressType::TaprootCommitData
        )
    }

    /// Whether the address depends on committed data.
    pub const fn is_commit(&self) -> bool {
        matches!(
            self,
            AddressType::TaprootCommitNote | AddressType::TaprootCommitData
        )
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl str::FromStr for AddressType {
    type Err = AddrFmtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AddressType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| AddrFmtError::UnknownAddressType(s.to_owned()))
    }
}

/// Length of a script hash in bytes.
pub const SCRIPT_HASH_LEN: usize = 32;

/// Chain service index key for a locking script.
///
/// This is SHA-256 of the script with the byte order reversed, not a
/// consensus hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptHash([u8; SCRIPT_HASH_LEN]);

impl ScriptHash {
    /// Creates a new instance from raw (already reversed) bytes.
    pub const fn new(bytes: [u8; SCRIPT_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Computes the index key of a locking script.
    pub fn from_script(script: &Script) -> Self {
        let mut digest: [u8; SCRIPT_HASH_LEN] = Sha256::digest(script.as_bytes()).into();
        digest.reverse();
        Self(digest)
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; SCRIPT_HASH_LEN] {
        &self.0
    }
}

impl fmt::Debug for ScriptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptHash({self})")
    }
}

impl fmt::Display for ScriptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl str::FromStr for ScriptHash {
    type Err = AddrFmtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; SCRIPT_HASH_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| AddrFmtError::InvalidScriptHash(s.to_owned()))?;
        Ok(Self(bytes))
    }
}
