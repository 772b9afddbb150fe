//! N20 token workflows on the NOTE protocol.
//!
//! [`ProtocolEngine`] turns sends, payload mints, transfers, commit-data
//! reveals and clears into signed transactions over a [`ChainService`].
//! [`SimpleToken`] and [`PowToken`] sit on top of it; the latter grinds the
//! locktime of its mint transaction until the hash hits the token's bitwork.

mod cancel;
mod chain;
mod config;
mod engine;
mod errors;
mod pow;
mod records;
mod retry;
mod status;
mod tokens;
mod verifier;

pub use cancel::CancelToken;
pub use chain::{Balance, BestBlock, BroadcastResult, ChainService, FeeRates, FeeTier, TokenUtxo};
pub use config::{EngineConfig, PowMintConfig};
pub use engine::{Account, ProtocolEngine};
pub use errors::{
    ChainError, ChainResult, ConstructionError, MintError, MintErrorKind, MintResult,
};
pub use pow::{
    Bitwork, Carried, Hash256, PowHasher, PowSearch, SearchOutcome, YIELD_EVERY, attempt,
    hash256_hex,
};
pub use records::{
    DeployRecord, MintRecord, N20_PROTOCOL, TransferAmount, TransferRecord, text_to_hex,
};
pub use retry::RetryPolicy;
pub use status::{MintMonitor, MintPhase, MintStatus};
pub use tokens::{MintOutcome, PowToken, SimpleToken};
pub use verifier::{CallData, ContractVerifier, MINT_METHOD, VerifyResult};
