use note_addr_fmt::AddrFmtError;
use note_msg_fmt::CodecError;
use note_tx_builder::BuildError;
use thiserror::Error;

/// Errors talking to the chain service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Request did not complete.
    #[error("transport: {0}")]
    Transport(String),

    /// Response could not be understood.
    #[error("malformed response: {0}")]
    Decode(String),

    /// Service refused a broadcast.
    #[error("broadcast rejected: {0}")]
    Rejected(String),

    /// Something expected never showed up.
    #[error("{what} not visible after {attempts} attempts")]
    PollExhausted {
        /// What was being waited for.
        what: String,
        /// Tries made.
        attempts: u32,
    },
}

/// Wrapper result type for chain service calls.
pub type ChainResult<T> = Result<T, ChainError>;

/// Failure to put a transaction together.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// Builder failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Payload does not fit the active tier.
    #[error("payload: {0}")]
    Payload(CodecError),

    /// Address generation failed.
    #[error("address: {0}")]
    Address(#[from] AddrFmtError),

    /// Engine was created without keys.
    #[error("no account keys configured")]
    NoAccount,

    /// No token outputs for the tick.
    #[error("no token utxos for {tick}")]
    NoTokenUtxos {
        /// Token ticker.
        tick: String,
    },

    /// Requested token amounts add up past `u64::MAX`.
    #[error("requested {tick} amounts overflow")]
    AmountOverflow {
        /// Token ticker.
        tick: String,
    },

    /// Token outputs do not add up to the request.
    #[error("insufficient {tick} balance: have {balance}, need {requested}")]
    InsufficientTokens {
        /// Token ticker.
        tick: String,
        /// Sum of the available token outputs.
        balance: u64,
        /// Sum requested.
        requested: u64,
    },
}

/// Top-level error of the mint workflows.
#[derive(Debug, Error)]
pub enum MintError {
    /// A transaction could not be built.
    #[error("construction: {0}")]
    Construction(#[from] ConstructionError),

    /// Mining before the activation height.
    #[error("not yet active: best block {height}, starts at {start}")]
    Activation {
        /// Current best block height.
        height: u64,
        /// Activation height.
        start: u64,
    },

    /// The contract verifier rejected a matched attempt.
    #[error("contract verification failed: {0}")]
    Verification(String),

    /// Chain service failed.
    #[error("network: {0}")]
    Network(#[from] ChainError),

    /// Payload bytes are malformed.
    #[error("protocol data: {0}")]
    ProtocolData(CodecError),

    /// Cancelled through the token.
    #[error("cancelled")]
    Cancelled,
}

/// Coarse category of a [`MintError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MintErrorKind {
    /// See [`MintError::Construction`].
    Construction,
    /// See [`MintError::Activation`].
    Activation,
    /// See [`MintError::Verification`].
    Verification,
    /// See [`MintError::Network`].
    Network,
    /// See [`MintError::ProtocolData`].
    ProtocolData,
    /// See [`MintError::Cancelled`].
    Cancelled,
}

impl MintError {
    /// Gets the category.
    pub fn kind(&self) -> MintErrorKind {
        match self {
            MintError::Construction(_) => MintErrorKind::Construction,
            MintError::Activation { .. } => MintErrorKind::Activation,
            MintError::Verification(_) => MintErrorKind::Verification,
            MintError::Network(_) => MintErrorKind::Network,
            MintError::ProtocolData(_) => MintErrorKind::ProtocolData,
            MintError::Cancelled => MintErrorKind::Cancelled,
        }
    }

    /// Whether the same call may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self, MintError::Network(_) | MintError::Activation { .. })
    }
}

impl From<BuildError> for MintError {
    fn from(e: BuildError) -> Self {
        MintError::Construction(e.into())
    }
}

impl From<AddrFmtError> for MintError {
    fn from(e: AddrFmtError) -> Self {
        MintError::Construction(e.into())
    }
}

impl From<CodecError> for MintError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::PayloadTooLarge { .. } => {
                MintError::Construction(ConstructionError::Payload(e))
            }
            other => MintError::ProtocolData(other),
        }
    }
}

/// Wrapper result type.
pub type MintResult<T> = Result<T, MintError>;

#[cfg(test)]
mod tests {
    use note_tx_builder::FundsError;

    use super::*;

    #[test]
    fn test_kinds() {
        let cases = [
            (
                MintError::from(BuildError::Funds(FundsError::BelowMinimum { amount: 10 })),
                MintErrorKind::Construction,
            ),
            (
                MintError::from(CodecError::PayloadTooLarge { len: 401, limit: 400 }),
                MintErrorKind::Construction,
            ),
            (MintError::from(CodecError::BufTooShort), MintErrorKind::ProtocolData),
            (
                MintError::Activation { height: 1, start: 2 },
                MintErrorKind::Activation,
            ),
            (
                MintError::from(ChainError::Transport("timeout".into())),
                MintErrorKind::Network,
            ),
            (MintError::Verification("no".into()), MintErrorKind::Verification),
            (MintError::Cancelled, MintErrorKind::Cancelled),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn test_funds_kinds_stay_distinct() {
        let none = MintError::from(BuildError::Funds(FundsError::NoFund {
            total_input: 1,
            total_output: 2,
            fee: 3,
        }));
        let below = MintError::from(BuildError::Funds(FundsError::BelowMinimum { amount: 5 }));
        assert_ne!(none.to_string(), below.to_string());
    }
}
