//! Transaction assembly for NOTE protocol spends.
//!
//! Inputs are resolved from typed UTXOs into [`InputSpec`]s, assembled with
//! recipients and change into a draft, signed per input on the path its type
//! dictates, and finalized. [`TxBuilder::build`] runs the whole thing twice so
//! the fee matches the signed size.

mod builder;
mod constants;
mod errors;
mod input;
mod tweak;
mod utxo;
mod validator;
mod witness;

pub use builder::{BuiltTx, Recipient, TxBuilder, TxRequest, compute_change, compute_send_all};
pub use constants::{DUST_LIMIT, ESTIMATE_FEE, MAX_LOCKTIME, MAX_SEQUENCE, TX_VERSION, fee_for_vsize};
pub use errors::{BuildError, BuildResult, FundsError};
pub use input::{InputKind, InputResolver, InputSpec};
pub use tweak::{tweak_secret_key, tweaked_output_key};
pub use utxo::{Utxo, total_satoshis};
pub use validator::{
    EcdsaValidator, SchnorrValidator, SignatureValidator, SigningPath, ValidationError,
};
pub use witness::serialize_witness_stack;
