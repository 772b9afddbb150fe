//! Token deploy and mint orchestration.

use std::sync::Arc;

use bitcoin::Txid;
use tracing::*;

use crate::{
    chain::{BroadcastResult, ChainService},
    config::PowMintConfig,
    engine::ProtocolEngine,
    errors::{MintError, MintResult},
    pow::{Bitwork, Hash256, PowHasher, PowSearch, SearchOutcome},
    records::{DeployRecord, MintRecord},
    status::{MintMonitor, MintPhase, StatusPublisher},
    verifier::{CallData, ContractVerifier, MINT_METHOD},
};

/// A token minted by plain payload transactions.
#[derive(Clone, Debug)]
pub struct SimpleToken {
    deploy: DeployRecord,
    mint: MintRecord,
}

impl SimpleToken {
    /// Constructs a new instance.
    pub fn new(deploy: DeployRecord, mint: MintRecord) -> Self {
        Self { deploy, mint }
    }

    /// Publishes the deploy record, with the dust output on the main address.
    pub async fn deploy<S: ChainService>(&self, engine: &ProtocolEngine<S>) -> MintResult<BroadcastResult> {
        let to = engine.main_address().locking_script().clone();
        engine.mint_payload(&self.deploy.to_value(), Some(to)).await
    }

    /// Mints to the token address.
    pub async fn mint<S: ChainService>(&self, engine: &ProtocolEngine<S>) -> MintResult<BroadcastResult> {
        engine.mint_payload(&self.mint.to_value(), None).await
    }
}

/// How a proof-of-work mint ended.
#[derive(Debug)]
pub enum MintOutcome {
    /// A matching attempt was handed to the chain service.
    Broadcast {
        /// Nonce of the match.
        nonce: u32,
        /// Its hash.
        hash: String,
        /// Attempts built.
        attempts: u64,
        /// Id of the broadcast transaction.
        txid: Txid,
        /// What the service said.
        result: BroadcastResult,
    },

    /// The nonce range ran out.
    Exhausted {
        /// Attempts built.
        attempts: u64,
    },

    /// The engine's cancel token fired.
    Cancelled {
        /// Attempts built.
        attempts: u64,
    },
}

/// A token whose mints must hit a hash prefix.
///
/// The deploy record is committed into a commit-data address. Mints grind the
/// locktime until the transaction hash starts with the bitwork, optionally
/// run the contract verifier on the match, then broadcast it.
pub struct PowToken<H = Hash256> {
    deploy: DeployRecord,
    mint: MintRecord,
    config: PowMintConfig,
    verifier: Option<Arc<dyn ContractVerifier>>,
    hasher: H,
    status: StatusPublisher,
    monitor: MintMonitor,
}

impl<H> std::fmt::Debug for PowToken<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowToken")
            .field("deploy", &self.deploy)
            .field("mint", &self.mint)
            .field("config", &self.config)
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

impl PowToken {
    /// Constructs a new instance hashing with double SHA-256, target and
    /// activation height taken from the deploy record.
    pub fn new(deploy: DeployRecord, mint: MintRecord) -> Self {
        let config = PowMintConfig::from_deploy(&deploy);
        let (status, monitor) = StatusPublisher::new();
        Self {
            deploy,
            mint,
            config,
            verifier: None,
            hasher: Hash256,
            status,
            monitor,
        }
    }
}

impl<H: PowHasher> PowToken<H> {
    /// Replaces the hasher.
    pub fn with_hasher<H2: PowHasher>(self, hasher: H2) -> PowToken<H2> {
        PowToken {
            deploy: self.deploy,
            mint: self.mint,
            config: self.config,
            verifier: self.verifier,
            hasher,
            status: self.status,
            monitor: self.monitor,
        }
    }

    /// Checks every match with `verifier` before broadcasting it.
    pub fn with_verifier(mut self, verifier: Arc<dyn ContractVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Replaces the mining settings.
    pub fn with_config(mut self, config: PowMintConfig) -> Self {
        self.config = config;
        self
    }

    /// Gets the mining settings.
    pub fn config(&self) -> &PowMintConfig {
        &self.config
    }

    /// Gets a handle on the mint status.
    pub fn monitor(&self) -> MintMonitor {
        self.monitor.clone()
    }

    /// Commits the deploy record into a commit-data address and reveals it
    /// to the main address.
    pub async fn deploy<S: ChainService>(&self, engine: &ProtocolEngine<S>) -> MintResult<BroadcastResult> {
        let to = engine.main_address().locking_script().clone();
        engine.commit_data(&self.deploy.to_value(), to).await
    }

    /// Mines and broadcasts one mint.
    pub async fn mint<S: ChainService>(&self, engine: &ProtocolEngine<S>) -> MintResult<MintOutcome> {
        self.status.reset();
        let result = self.mint_inner(engine).await;
        if let Err(e) = &result {
            error!(%e, tick = %self.mint.tick, "mint failed");
            let phase = match e {
                MintError::Cancelled => MintPhase::Cancelled,
                _ => MintPhase::Failed,
            };
            self.status.phase(phase);
        }
        result
    }

    async fn mint_inner<S: ChainService>(&self, engine: &ProtocolEngine<S>) -> MintResult<MintOutcome> {
        let height = engine.best_block_height().await?;
        if height < self.config.start_height {
            return Err(MintError::Activation {
                height,
                start: self.config.start_height,
            });
        }

        self.status.phase(MintPhase::Building);
        let carried = engine
            .prepare_payload(&self.mint.to_value(), None)
            .await?;

        let bitwork = Bitwork::from_hex(&self.config.bitwork);
        let builder = engine.builder();
        let outcome = PowSearch::new(
            &self.hasher,
            &bitwork,
            self.config.start_nonce,
            self.config.max_nonce,
        )
        .with_cancel(engine.cancel_token())
        .with_status(&self.status)
        .run_yielding(&builder, carried)
        .await?;

        let (built, nonce, hash, attempts) = match outcome {
            SearchOutcome::Matched {
                built,
                nonce,
                hash,
                attempts,
            } => (built, nonce, hash, attempts),
            SearchOutcome::Exhausted { attempts } => {
                warn!(%attempts, bitwork = %bitwork.as_str(), "no nonce hit the target");
                return Ok(MintOutcome::Exhausted { attempts });
            }
            SearchOutcome::Cancelled { attempts } => {
                return Ok(MintOutcome::Cancelled { attempts });
            }
        };

        if let Some(verifier) = &self.verifier {
            self.status.phase(MintPhase::Verifying);
            let call = CallData::for_mint(&self.deploy, &self.mint, height, &built.to_hex());
            let verdict = verifier.verify(&call, MINT_METHOD);
            if !verdict.success {
                return Err(MintError::Verification(
                    verdict.error.unwrap_or_else(|| "rejected".to_owned()),
                ));
            }
            debug!(%nonce, "contract accepted mint");
        }

        self.status.phase(MintPhase::Broadcasting);
        let result = engine.broadcast(&built).await?;
        self.status.phase(MintPhase::Done);

        Ok(MintOutcome::Broadcast {
            nonce,
            hash,
            attempts,
            txid: built.txid(),
            result,
        })
    }
}
