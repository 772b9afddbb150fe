use bitcoin::{Network, taproot::TaprootBuilderError};
use note_envelope_fmt::errors::EnvelopeBuildError;
use thiserror::Error;

use crate::types::AddressType;

/// Errors for generating and parsing addresses.
#[derive(Debug, Error)]
pub enum AddrFmtError {
    /// Address type name not recognized.
    #[error("unknown address type {0}")]
    UnknownAddressType(String),

    /// Script hash text is not 32 bytes of hex.
    #[error("invalid script hash {0}")]
    InvalidScriptHash(String),

    /// Commit variants need the data they commit to.
    #[error("{0} requires committed data")]
    MissingCommitData(AddressType),

    /// A NOTE tree was requested for a type that has none.
    #[error("{0} has no NOTE script tree")]
    NotNoteTree(AddressType),

    /// The NOTE leaf could not be built.
    #[error("envelope: {0}")]
    Envelope(#[from] EnvelopeBuildError),

    /// Leaves could not be placed in the tree.
    #[error("taproot tree: {0}")]
    TaprootTree(#[from] TaprootBuilderError),

    /// The tree builder left the tree incomplete.
    #[error("taproot tree could not be finalized")]
    TreeNotFinalized,

    /// No control block exists for the requested leaf.
    #[error("leaf missing from taproot tree")]
    MissingControlBlock,

    /// Locking script has no address form.
    #[error("locking script has no address form")]
    UnsupportedScript,

    /// Address text could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Address belongs to a different network.
    #[error("address is not valid on {0}")]
    NetworkMismatch(Network),
}

/// Wrapper result type.
pub type AddrFmtResult<T> = Result<T, AddrFmtError>;
