use note_addr_fmt::{AddrFmtError, AddressType};
use thiserror::Error;

use crate::validator::SigningPath;

/// Not enough value to pay outputs and fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FundsError {
    /// Inputs do not cover outputs plus fee.
    #[error("insufficient funds: {total_input} in, {total_output} out, fee {fee}")]
    NoFund {
        /// Sum of input values.
        total_input: u64,
        /// Sum of requested output values.
        total_output: u64,
        /// Fee for this pass.
        fee: u64,
    },

    /// Input or output values add up past `u64::MAX`.
    #[error("amounts overflow")]
    AmountOverflow,

    /// What is left after the fee is below the dust floor.
    #[error("amount {amount} is below the minimum spendable output")]
    BelowMinimum {
        /// Value that would have been sent.
        amount: u64,
    },
}

/// Errors from building and signing a transaction.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Not enough funds.
    #[error(transparent)]
    Funds(#[from] FundsError),

    /// Transaction has no inputs to sign.
    #[error("no signable input")]
    NoSignableInput,

    /// UTXO did not carry an address type.
    #[error("utxo {0} has no address type")]
    MissingAddressType(String),

    /// UTXO script does not match the script derived from its type and key.
    #[error("utxo {outpoint} is not a {address_type} output of its signing key")]
    ScriptMismatch {
        /// Offending outpoint.
        outpoint: String,
        /// Type it was stamped with.
        address_type: AddressType,
    },

    /// Spending a mint leaf without payload segments.
    #[error("input {0} spends a NOTE leaf but no payload was given")]
    MissingPayload(usize),

    /// Address or tree generation failed.
    #[error("address: {0}")]
    Address(#[from] AddrFmtError),

    /// Sighash could not be computed.
    #[error("sighash for input {index}: {reason}")]
    Sighash {
        /// Input index.
        index: usize,
        /// Underlying error.
        reason: String,
    },

    /// Sighash override is not a valid type for the input.
    #[error("invalid sighash type {0:#x}")]
    InvalidSighashType(u32),

    /// Key tweaking failed.
    #[error("key tweak: {0}")]
    Tweak(#[from] bitcoin::secp256k1::Error),

    /// Produced signature did not pass its validator.
    #[error("signature for input {index} rejected by the {path} validator")]
    SignatureRejected {
        /// Input index.
        index: usize,
        /// Path the input was signed on.
        path: SigningPath,
    },

    /// Signature did not fit in a script push.
    #[error("signature too large for a script push")]
    PushTooLarge,
}

/// Wrapper result type.
pub type BuildResult<T> = Result<T, BuildError>;
