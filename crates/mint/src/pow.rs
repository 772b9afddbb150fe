//! Locktime-grinding proof-of-work search.
//!
//! Every attempt is a complete, signed rebuild of the same request with the
//! nonce as locktime. An attempt matches when the double SHA-256 of the
//! serialized transaction, as hex, starts with the bitwork prefix.

use bitcoin::{
    consensus,
    secp256k1::{Signing, Verification},
};
use note_tx_builder::{BuildResult, BuiltTx, TxBuilder, TxRequest};
use sha2::{Digest, Sha256};
use tracing::*;

use crate::{
    cancel::CancelToken,
    status::{MintPhase, StatusPublisher},
};

/// Double SHA-256 of `raw` as hex, in digest byte order.
pub fn hash256_hex(raw: &[u8]) -> String {
    let first = Sha256::digest(raw);
    hex::encode(Sha256::digest(first))
}

/// Hashes a serialized attempt.
pub trait PowHasher {
    /// Hashes the consensus serialization of a transaction to hex.
    fn hash_hex(&self, raw_tx: &[u8]) -> String;
}

/// The protocol hash, double SHA-256.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hash256;

impl PowHasher for Hash256 {
    fn hash_hex(&self, raw_tx: &[u8]) -> String {
        hash256_hex(raw_tx)
    }
}

impl<F: Fn(&[u8]) -> String> PowHasher for F {
    fn hash_hex(&self, raw_tx: &[u8]) -> String {
        self(raw_tx)
    }
}

/// Hex prefix a matching hash starts with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitwork(String);

impl Bitwork {
    /// Takes a hex prefix as is, lowercased.
    pub fn from_hex(prefix: &str) -> Self {
        Self(prefix.to_ascii_lowercase())
    }

    /// Gets the prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `hash_hex` hits the target. An empty prefix matches anything.
    pub fn matches(&self, hash_hex: &str) -> bool {
        hash_hex.starts_with(&self.0)
    }
}

/// State carried from one attempt to the next, so inputs, outputs and fee
/// rate stay put while only the nonce moves.
#[derive(Clone, Debug)]
pub struct Carried {
    /// The request every attempt builds.
    pub request: TxRequest,

    /// Fee rate every attempt pays.
    pub fee_per_kb: u64,
}

/// Builds the attempt for `nonce`.
///
/// Pure apart from signing: the same nonce and carried state always give the
/// same transaction.
pub fn attempt<C: Signing + Verification>(
    builder: &TxBuilder<'_, C>,
    nonce: u32,
    carried: Carried,
) -> BuildResult<(BuiltTx, Carried)> {
    let Carried {
        mut request,
        fee_per_kb,
    } = carried;
    request.locktime = Some(nonce);
    let built = builder.build(&request, fee_per_kb)?;
    let fee_per_kb = built.fee_per_kb().unwrap_or(fee_per_kb);
    Ok((
        built,
        Carried {
            request,
            fee_per_kb,
        },
    ))
}

/// How a search ended.
#[derive(Debug)]
pub enum SearchOutcome {
    /// An attempt hit the target.
    Matched {
        /// The matching transaction.
        built: BuiltTx,
        /// Its nonce.
        nonce: u32,
        /// Its hash.
        hash: String,
        /// Attempts built, the match included.
        attempts: u64,
    },

    /// No attempt in the nonce range matched.
    Exhausted {
        /// Attempts built.
        attempts: u64,
    },

    /// Cancelled between attempts.
    Cancelled {
        /// Attempts built.
        attempts: u64,
    },
}

/// Attempts between yields in [`PowSearch::run_yielding`].
pub const YIELD_EVERY: u64 = 64;

enum Step {
    Next(Carried),
    Done(SearchOutcome),
}

/// Nonce search over `[start_nonce, max_nonce)`.
#[derive(Debug)]
pub struct PowSearch<'a, H> {
    hasher: &'a H,
    bitwork: &'a Bitwork,
    start_nonce: u32,
    max_nonce: u32,
    cancel: Option<&'a CancelToken>,
    status: Option<&'a StatusPublisher>,
}

impl<'a, H: PowHasher> PowSearch<'a, H> {
    /// Constructs a new instance.
    pub fn new(hasher: &'a H, bitwork: &'a Bitwork, start_nonce: u32, max_nonce: u32) -> Self {
        Self {
            hasher,
            bitwork,
            start_nonce,
            max_nonce,
            cancel: None,
            status: None,
        }
    }

    /// Checks `cancel` before every attempt.
    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn with_status(mut self, status: &'a StatusPublisher) -> Self {
        self.status = Some(status);
        self
    }

    /// Runs the search on the current thread. Build errors end it.
    pub fn run<C: Signing + Verification>(
        &self,
        builder: &TxBuilder<'_, C>,
        carried: Carried,
    ) -> BuildResult<SearchOutcome> {
        let span = debug_span!("pow_search", bitwork = %self.bitwork.as_str(), start = self.start_nonce);
        let _g = span.enter();

        let mut carried = carried;
        let mut attempts = 0u64;
        for nonce in self.start_nonce..self.max_nonce {
            match self.step(builder, nonce, carried, &mut attempts)? {
                Step::Next(next) => carried = next,
                Step::Done(outcome) => return Ok(outcome),
            }
        }
        Ok(self.exhausted(attempts))
    }

    /// Runs the search inside a task, handing the worker back to the runtime
    /// every [`YIELD_EVERY`] attempts so other tasks, cancellers included,
    /// get to run.
    pub async fn run_yielding<C: Signing + Verification>(
        &self,
        builder: &TxBuilder<'_, C>,
        carried: Carried,
    ) -> BuildResult<SearchOutcome> {
        let span = debug_span!("pow_search", bitwork = %self.bitwork.as_str(), start = self.start_nonce);
        async move {
            let mut carried = carried;
            let mut attempts = 0u64;
            for nonce in self.start_nonce..self.max_nonce {
                match self.step(builder, nonce, carried, &mut attempts)? {
                    Step::Next(next) => carried = next,
                    Step::Done(outcome) => return Ok(outcome),
                }
                if attempts % YIELD_EVERY == 0 {
                    tokio::task::yield_now().await;
                }
            }
            Ok(self.exhausted(attempts))
        }
        .instrument(span)
        .await
    }

    fn step<C: Signing + Verification>(
        &self,
        builder: &TxBuilder<'_, C>,
        nonce: u32,
        carried: Carried,
        attempts: &mut u64,
    ) -> BuildResult<Step> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            info!(%nonce, %attempts, "search cancelled");
            self.publish_phase(MintPhase::Cancelled);
            return Ok(Step::Done(SearchOutcome::Cancelled {
                attempts: *attempts,
            }));
        }

        self.publish_phase(MintPhase::Building);
        let (built, next) = attempt(builder, nonce, carried)?;
        *attempts += 1;

        let hash = self.hasher.hash_hex(&consensus::serialize(built.tx()));
        trace!(%nonce, %hash, "checked attempt");
        if let Some(status) = self.status {
            status.attempt(nonce, *attempts, &hash);
        }

        if self.bitwork.matches(&hash) {
            info!(%nonce, %hash, txid = %built.txid(), "attempt hit target");
            return Ok(Step::Done(SearchOutcome::Matched {
                built,
                nonce,
                hash,
                attempts: *attempts,
            }));
        }
        Ok(Step::Next(next))
    }

    fn exhausted(&self, attempts: u64) -> SearchOutcome {
        debug!(%attempts, "nonce range exhausted");
        self.publish_phase(MintPhase::Exhausted);
        SearchOutcome::Exhausted { attempts }
    }

    fn publish_phase(&self, phase: MintPhase) {
        if let Some(status) = self.status {
            status.phase(phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{
        Network, ScriptBuf,
        secp256k1::{Secp256k1, SecretKey},
    };
    use note_addr_fmt::{AddressConfig, AddressType};
    use note_tx_builder::{InputResolver, Recipient, Utxo};

    use super::*;

    fn carried(secp: &Secp256k1<bitcoin::secp256k1::All>) -> Carried {
        let sk = SecretKey::from_slice(&[0x33; 32]).unwrap();
        let script: ScriptBuf = AddressConfig::new(Network::Regtest)
            .generate(secp, &sk.public_key(secp), AddressType::WitnessKeyHash, None)
            .unwrap()
            .locking_script()
            .clone();
        let utxo = Utxo::new(
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
                .parse()
                .unwrap(),
            0,
            50_000,
            script.clone(),
        )
        .with_type(AddressType::WitnessKeyHash);
        let input = InputResolver::new(secp, Network::Regtest, sk)
            .resolve(utxo)
            .unwrap();

        let mut request = TxRequest::new(script.clone());
        request.funding_inputs = vec![input];
        request.recipients = vec![Recipient::new(script, 546)];
        Carried {
            request,
            fee_per_kb: 1_000,
        }
    }

    /// Pretends the hash is the locktime, the last four bytes of the
    /// serialization.
    fn locktime_hasher(raw: &[u8]) -> String {
        let tail: [u8; 4] = raw[raw.len() - 4..].try_into().unwrap();
        format!("{:08x}", u32::from_le_bytes(tail))
    }

    #[test]
    fn test_hash256() {
        assert_eq!(
            hash256_hex(b""),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
        assert_eq!(Hash256.hash_hex(b"abc"), hash256_hex(b"abc"));
    }

    #[test]
    fn test_bitwork() {
        let bw = Bitwork::from_hex("32AB");
        assert_eq!(bw.as_str(), "32ab");
        assert!(bw.matches("32ab00"));
        assert!(!bw.matches("3200ab"));
        assert!(Bitwork::from_hex("").matches("ff"));
    }

    #[test]
    fn test_attempt_is_deterministic() {
        let secp = Secp256k1::new();
        let builder = TxBuilder::new(&secp);
        let (a, next) = attempt(&builder, 9, carried(&secp)).unwrap();
        let (b, _) = attempt(&builder, 9, next.clone()).unwrap();
        assert_eq!(a.tx(), b.tx());
        assert_eq!(a.tx().lock_time.to_consensus_u32(), 9);
        assert_eq!(next.fee_per_kb, 1_000);

        let (c, _) = attempt(&builder, 10, next).unwrap();
        assert_ne!(a.txid(), c.txid());
        assert_eq!(c.consumed(), a.consumed());
        assert_eq!(c.tx().output.len(), a.tx().output.len());
    }

    #[test]
    fn test_matches_at_reachable_nonce() {
        let secp = Secp256k1::new();
        let builder = TxBuilder::new(&secp);
        let bitwork = Bitwork::from_hex("00000003");
        let hasher = locktime_hasher;

        let outcome = PowSearch::new(&hasher, &bitwork, 0, 100)
            .run(&builder, carried(&secp))
            .unwrap();
        match outcome {
            SearchOutcome::Matched {
                built,
                nonce,
                hash,
                attempts,
            } => {
                assert_eq!(nonce, 3);
                assert_eq!(attempts, 4);
                assert_eq!(hash, "00000003");
                assert_eq!(built.tx().lock_time.to_consensus_u32(), 3);
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn test_exhausts_unreachable_target() {
        let secp = Secp256k1::new();
        let builder = TxBuilder::new(&secp);
        let bitwork = Bitwork::from_hex("ffff");
        let hasher = locktime_hasher;

        let outcome = PowSearch::new(&hasher, &bitwork, 0, 5)
            .run(&builder, carried(&secp))
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Exhausted { attempts: 5 }));
    }

    #[test]
    fn test_cancel_stops_search() {
        let secp = Secp256k1::new();
        let builder = TxBuilder::new(&secp);
        let bitwork = Bitwork::from_hex("ffff");
        let cancel = CancelToken::new();
        cancel.cancel();
        let (publisher, monitor) = StatusPublisher::new();

        let outcome = PowSearch::new(&Hash256, &bitwork, 0, u32::MAX)
            .with_cancel(&cancel)
            .with_status(&publisher)
            .run(&builder, carried(&secp))
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Cancelled { attempts: 0 }));
        assert_eq!(monitor.get_current().phase, MintPhase::Cancelled);
    }

    #[tokio::test]
    async fn test_yielding_search_sees_cancel_from_same_thread() {
        let secp = Secp256k1::new();
        let builder = TxBuilder::new(&secp);
        let bitwork = Bitwork::from_hex("ffff");
        let hasher = locktime_hasher;
        let cancel = CancelToken::new();

        let search = PowSearch::new(&hasher, &bitwork, 0, u32::MAX).with_cancel(&cancel);
        let (outcome, ()) = tokio::join!(search.run_yielding(&builder, carried(&secp)), async {
            tokio::task::yield_now().await;
            cancel.cancel();
        });

        match outcome.unwrap() {
            SearchOutcome::Cancelled { attempts } => {
                assert!(attempts > 0);
                assert_eq!(attempts % YIELD_EVERY, 0);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_yielding_search_matches_like_run() {
        let secp = Secp256k1::new();
        let builder = TxBuilder::new(&secp);
        let bitwork = Bitwork::from_hex("00000003");
        let hasher = locktime_hasher;

        let outcome = PowSearch::new(&hasher, &bitwork, 0, 100)
            .run_yielding(&builder, carried(&secp))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SearchOutcome::Matched {
                nonce: 3,
                attempts: 4,
                ..
            }
        ));
    }
}
