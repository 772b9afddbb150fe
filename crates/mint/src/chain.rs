//! Boundary to the block-data service.

use async_trait::async_trait;
use note_addr_fmt::ScriptHash;
use note_tx_builder::Utxo;
use serde::{Deserialize, Serialize};

use crate::errors::{ChainError, ChainResult};

/// Balance of a script hash, in satoshis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Confirmed value.
    pub confirmed: i64,

    /// Unconfirmed delta, negative while spends are pending.
    pub unconfirmed: i64,
}

/// Fee rates in satoshis per kilo-vbyte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRates {
    /// Confirms in about an hour.
    pub slow_fee: u64,

    /// Confirms in about half an hour.
    pub avg_fee: u64,

    /// Confirms in the next block or so.
    pub fast_fee: u64,
}

/// Which of the [`FeeRates`] to pay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    /// [`FeeRates::slow_fee`].
    Slow,
    /// [`FeeRates::avg_fee`].
    #[default]
    Avg,
    /// [`FeeRates::fast_fee`].
    Fast,
}

impl FeeRates {
    /// Gets the rate of a tier.
    pub fn get(&self, tier: FeeTier) -> u64 {
        match tier {
            FeeTier::Slow => self.slow_fee,
            FeeTier::Avg => self.avg_fee,
            FeeTier::Fast => self.fast_fee,
        }
    }
}

/// Outcome of a broadcast the service answered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResult {
    /// Whether the transaction was accepted.
    pub success: bool,

    /// Id of the accepted transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,

    /// Service-specific rejection details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl BroadcastResult {
    /// Turns a rejection into an error.
    pub fn into_accepted(self) -> ChainResult<Self> {
        if self.success {
            return Ok(self);
        }
        let reason = self
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no reason given".to_owned());
        Err(ChainError::Rejected(reason))
    }
}

/// Chain tip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestBlock {
    /// Height of the tip.
    pub height: u64,

    /// Hash of the tip, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// An output carrying a token balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUtxo {
    /// The output itself.
    #[serde(flatten)]
    pub utxo: Utxo,

    /// Token amount it holds.
    pub amount: u64,
}

/// Block-data service the workflows read from and broadcast through.
#[async_trait]
pub trait ChainService: Send + Sync {
    /// Fetches the balance of a script hash.
    async fn balance(&self, script_hash: &ScriptHash) -> ChainResult<Balance>;

    /// Fetches the unspent outputs of a set of script hashes.
    async fn utxos(&self, script_hashes: &[ScriptHash]) -> ChainResult<Vec<Utxo>>;

    /// Fetches outputs holding `tick`, enough to cover `amount` when given.
    async fn token_utxos(
        &self,
        script_hashes: &[ScriptHash],
        tick: &str,
        amount: Option<u64>,
    ) -> ChainResult<Vec<TokenUtxo>>;

    /// Broadcasts a raw transaction.
    async fn broadcast(&self, raw_tx_hex: &str) -> ChainResult<BroadcastResult>;

    /// Fetches the current fee rates.
    async fn fees_per_kb(&self) -> ChainResult<FeeRates>;

    /// Fetches the chain tip.
    async fn best_block(&self) -> ChainResult<BestBlock>;

    /// Asks the service to reindex a script hash.
    async fn refresh(&self, script_hash: &ScriptHash) -> ChainResult<()>;
}
