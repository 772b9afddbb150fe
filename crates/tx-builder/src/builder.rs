//! Draft assembly, signing and the two-pass fee build.

use bitcoin::{
    Amount, EcdsaSighashType, OutPoint, ScriptBuf, Sequence, TapSighashType, Transaction, TxIn,
    TxOut, Txid, Witness, absolute, ecdsa,
    consensus::encode::serialize_hex,
    hashes::Hash,
    script::{Builder, PushBytesBuf},
    secp256k1::{Keypair, Message, Secp256k1, Signing, Verification},
    sighash::{Prevouts, SighashCache},
    taproot, transaction,
};
use note_msg_fmt::NotePayload;
use tracing::*;

use crate::{
    constants::{DUST_LIMIT, ESTIMATE_FEE, MAX_SEQUENCE, TX_VERSION, fee_for_vsize},
    errors::{BuildError, BuildResult, FundsError},
    input::{InputKind, InputSpec},
    tweak::{tweak_secret_key, tweaked_output_key},
    utxo::Utxo,
    validator::{EcdsaValidator, SchnorrValidator, SignatureValidator, SigningPath},
    witness::note_leaf_witness,
};

/// A requested payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Locking script of the output.
    pub script_pubkey: ScriptBuf,

    /// Value in satoshis.
    pub amount: u64,
}

impl Recipient {
    /// Constructs a new instance.
    pub fn new(script_pubkey: ScriptBuf, amount: u64) -> Self {
        Self {
            script_pubkey,
            amount,
        }
    }
}

/// Everything one build needs.
///
/// Protocol-bound inputs come first in the transaction, then funding inputs,
/// each group in the given order.
#[derive(Debug, Clone)]
pub struct TxRequest {
    /// Payload carried by NOTE leaf spends.
    pub payload: Option<NotePayload>,

    /// Inputs spending NOTE outputs.
    pub note_inputs: Vec<InputSpec>,

    /// Inputs paying for the transaction.
    pub funding_inputs: Vec<InputSpec>,

    /// Outputs, in order.
    pub recipients: Vec<Recipient>,

    /// Where change goes.
    pub change_script: ScriptBuf,

    /// Locktime, taking precedence over the payload's.
    pub locktime: Option<u32>,
}

impl TxRequest {
    /// Constructs an empty request sending change to `change_script`.
    pub fn new(change_script: ScriptBuf) -> Self {
        Self {
            payload: None,
            note_inputs: Vec::new(),
            funding_inputs: Vec::new(),
            recipients: Vec::new(),
            change_script,
            locktime: None,
        }
    }

    /// Iterates all inputs in transaction order.
    pub fn inputs(&self) -> impl Iterator<Item = &InputSpec> {
        self.note_inputs.iter().chain(self.funding_inputs.iter())
    }

    /// Sums the values of all inputs.
    pub fn total_input(&self) -> Result<u64, FundsError> {
        checked_total(self.inputs().map(|i| i.utxo().satoshis))
    }

    /// Sums the requested output values.
    pub fn total_output(&self) -> Result<u64, FundsError> {
        checked_total(self.recipients.iter().map(|r| r.amount))
    }

    /// Whether the single recipient takes everything.
    pub fn is_send_all(&self) -> bool {
        matches!(self.recipients.as_slice(), [only] if Ok(only.amount) == self.total_input())
    }

    fn effective_locktime(&self) -> u32 {
        self.locktime
            .or_else(|| self.payload.as_ref().and_then(|p| p.locktime()))
            .unwrap_or(0)
    }
}

fn checked_total(amounts: impl IntoIterator<Item = u64>) -> Result<u64, FundsError> {
    amounts
        .into_iter()
        .try_fold(0u64, u64::checked_add)
        .ok_or(FundsError::AmountOverflow)
}

/// Applies the change rule.
///
/// Returns the change output value, or `None` when the leftover is at or below
/// the dust floor and folds into the fee.
pub fn compute_change(total_input: u64, total_output: u64, fee: u64) -> Result<Option<u64>, FundsError> {
    let spent = total_output.saturating_add(fee);
    let change = total_input.checked_sub(spent).ok_or(FundsError::NoFund {
        total_input,
        total_output,
        fee,
    })?;
    Ok((change > DUST_LIMIT).then_some(change))
}

/// Computes what a send-all recipient receives.
pub fn compute_send_all(total_input: u64, fee: u64) -> Result<u64, FundsError> {
    let amount = total_input.checked_sub(fee).ok_or(FundsError::NoFund {
        total_input,
        total_output: total_input,
        fee,
    })?;
    if amount < DUST_LIMIT {
        return Err(FundsError::BelowMinimum { amount });
    }
    Ok(amount)
}

/// A signed, finalized transaction and what went into it.
#[derive(Debug, Clone)]
pub struct BuiltTx {
    tx: Transaction,
    fee: u64,
    fee_per_kb: Option<u64>,
    signing_paths: Vec<SigningPath>,
    consumed: Vec<Utxo>,
    change: Option<u64>,
}

impl BuiltTx {
    /// Gets the transaction.
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// Takes the transaction.
    pub fn into_tx(self) -> Transaction {
        self.tx
    }

    /// Gets the fee the build was planned with. Dust change folded into the
    /// fee is not included.
    pub fn fee(&self) -> u64 {
        self.fee
    }

    /// Gets the fee rate, if the transaction came from a two-pass build.
    pub fn fee_per_kb(&self) -> Option<u64> {
        self.fee_per_kb
    }

    /// Gets how each input was signed, in input order.
    pub fn signing_paths(&self) -> &[SigningPath] {
        &self.signing_paths
    }

    /// Gets the spent outputs, in input order.
    pub fn consumed(&self) -> &[Utxo] {
        &self.consumed
    }

    /// Gets the change output value, if one was added.
    pub fn change(&self) -> Option<u64> {
        self.change
    }

    /// Computes the transaction id.
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    /// Gets the consensus serialization as hex.
    pub fn to_hex(&self) -> String {
        serialize_hex(&self.tx)
    }

    /// Gets the virtual size.
    pub fn vsize(&self) -> usize {
        self.tx.vsize()
    }
}

/// Builds and signs transactions.
#[derive(Debug)]
pub struct TxBuilder<'a, C: Signing + Verification> {
    secp: &'a Secp256k1<C>,
}

impl<'a, C: Signing + Verification> TxBuilder<'a, C> {
    /// Constructs a new instance.
    pub fn new(secp: &'a Secp256k1<C>) -> Self {
        Self { secp }
    }

    /// Builds twice: once with a placeholder fee to measure the size, then
    /// from scratch with the fee that size costs at `fee_per_kb`.
    pub fn build(&self, req: &TxRequest, fee_per_kb: u64) -> BuildResult<BuiltTx> {
        let span = debug_span!("build_tx", inputs = req.inputs().count(), fee_per_kb);
        let _g = span.enter();

        let estimate = self.build_with_fee(req, ESTIMATE_FEE)?;
        let vsize = estimate.vsize() as u64;
        let fee = fee_for_vsize(vsize, fee_per_kb);
        debug!(%vsize, %fee, "measured estimate pass");

        let mut built = self.build_with_fee(req, fee)?;
        built.fee_per_kb = Some(fee_per_kb);
        trace!(txid = %built.txid(), vsize = %built.vsize(), "built transaction");
        Ok(built)
    }

    /// Builds a signed transaction paying exactly `fee`.
    pub fn build_with_fee(&self, req: &TxRequest, fee: u64) -> BuildResult<BuiltTx> {
        let specs: Vec<&InputSpec> = req.inputs().collect();
        if specs.is_empty() {
            return Err(BuildError::NoSignableInput);
        }

        let total_input = req.total_input()?;
        let (mut output, change) = if req.is_send_all() {
            let amount = compute_send_all(total_input, fee)?;
            let out = TxOut {
                value: Amount::from_sat(amount),
                script_pubkey: req.recipients[0].script_pubkey.clone(),
            };
            (vec![out], None)
        } else {
            let outs: Vec<TxOut> = req
                .recipients
                .iter()
                .map(|r| TxOut {
                    value: Amount::from_sat(r.amount),
                    script_pubkey: r.script_pubkey.clone(),
                })
                .collect();
            (outs, compute_change(total_input, req.total_output()?, fee)?)
        };
        if let Some(change) = change {
            output.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: req.change_script.clone(),
            });
        }

        let input = specs
            .iter()
            .map(|s| TxIn {
                previous_output: s.utxo().outpoint(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence(MAX_SEQUENCE),
                witness: Witness::new(),
            })
            .collect();

        let mut tx = Transaction {
            version: transaction::Version(TX_VERSION),
            lock_time: absolute::LockTime::from_consensus(req.effective_locktime()),
            input,
            output,
        };

        let prevouts: Vec<TxOut> = specs
            .iter()
            .map(|s| TxOut {
                value: s.utxo().amount(),
                script_pubkey: s.utxo().script.clone(),
            })
            .collect();

        let mut unlocks = Vec::with_capacity(specs.len());
        let mut signing_paths = Vec::with_capacity(specs.len());
        {
            let mut cache = SighashCache::new(&tx);
            for (index, spec) in specs.iter().enumerate() {
                let signer = InputSigner {
                    secp: self.secp,
                    prevouts: &prevouts,
                    index,
                    spec,
                };
                unlocks.push(signer.sign(&mut cache, req.payload.as_ref())?);
                signing_paths.push(spec.kind().signing_path());
            }
        }

        for (txin, (script_sig, witness)) in tx.input.iter_mut().zip(unlocks) {
            txin.script_sig = script_sig;
            txin.witness = witness;
        }

        Ok(BuiltTx {
            tx,
            fee,
            fee_per_kb: None,
            signing_paths,
            consumed: specs.iter().map(|s| s.utxo().clone()).collect(),
            change,
        })
    }
}

/// Signs and finalizes one input.
struct InputSigner<'a, C: Signing + Verification> {
    secp: &'a Secp256k1<C>,
    prevouts: &'a [TxOut],
    index: usize,
    spec: &'a InputSpec,
}

impl<C: Signing + Verification> InputSigner<'_, C> {
    fn sign(
        &self,
        cache: &mut SighashCache<&Transaction>,
        payload: Option<&NotePayload>,
    ) -> BuildResult<(ScriptBuf, Witness)> {
        let utxo = self.spec.utxo();
        let signer = self.spec.signer();
        let pubkey = bitcoin::PublicKey::new(signer.public_key(self.secp));

        match self.spec.kind() {
            InputKind::PlainKeyHash => {
                let ty = self.ecdsa_type()?;
                let sighash = cache
                    .legacy_signature_hash(self.index, &utxo.script, ty.to_u32())
                    .map_err(|e| self.sighash_err(e))?;
                let sig = self.sign_ecdsa(sighash.to_byte_array(), ty)?;
                let script_sig = Builder::new()
                    .push_slice(push_bytes(sig)?)
                    .push_key(&pubkey)
                    .into_script();
                Ok((script_sig, Witness::new()))
            }

            InputKind::ScriptHash { redeem_script } => {
                let ty = self.ecdsa_type()?;
                let sighash = cache
                    .p2wpkh_signature_hash(self.index, redeem_script, utxo.amount(), ty)
                    .map_err(|e| self.sighash_err(e))?;
                let sig = self.sign_ecdsa(sighash.to_byte_array(), ty)?;
                let script_sig = Builder::new()
                    .push_slice(push_bytes(redeem_script.to_bytes())?)
                    .into_script();
                Ok((script_sig, Witness::from_slice(&[sig, pubkey.to_bytes()])))
            }

            InputKind::WitnessKeyHash => {
                let ty = self.ecdsa_type()?;
                let sighash = cache
                    .p2wpkh_signature_hash(self.index, &utxo.script, utxo.amount(), ty)
                    .map_err(|e| self.sighash_err(e))?;
                let sig = self.sign_ecdsa(sighash.to_byte_array(), ty)?;
                Ok((
                    ScriptBuf::new(),
                    Witness::from_slice(&[sig, pubkey.to_bytes()]),
                ))
            }

            InputKind::WitnessScriptHash { witness_script } => {
                let ty = self.ecdsa_type()?;
                let sighash = cache
                    .p2wsh_signature_hash(self.index, witness_script, utxo.amount(), ty)
                    .map_err(|e| self.sighash_err(e))?;
                let sig = self.sign_ecdsa(sighash.to_byte_array(), ty)?;
                Ok((
                    ScriptBuf::new(),
                    Witness::from_slice(&[sig, pubkey.to_bytes(), witness_script.to_bytes()]),
                ))
            }

            InputKind::TaprootKey { internal_key } => {
                let ty = self.tap_type()?;
                let sighash = cache
                    .taproot_key_spend_signature_hash(self.index, &Prevouts::All(self.prevouts), ty)
                    .map_err(|e| self.sighash_err(e))?;
                let tweaked = tweak_secret_key(self.secp, signer, None)?;
                let keypair = Keypair::from_secret_key(self.secp, &tweaked);
                let output_key = tweaked_output_key(self.secp, *internal_key, None).to_inner();
                let sig = self.sign_schnorr(sighash.to_byte_array(), &keypair, &output_key.serialize(), ty)?;
                Ok((ScriptBuf::new(), Witness::from_slice(&[sig.to_vec()])))
            }

            InputKind::TaprootNote { leaf, .. }
            | InputKind::TaprootCommitNote { leaf, .. }
            | InputKind::TaprootCommitData { leaf, .. } => {
                let ty = self.tap_type()?;
                let sighash = cache
                    .taproot_script_spend_signature_hash(
                        self.index,
                        &Prevouts::All(self.prevouts),
                        leaf.leaf_hash(),
                        ty,
                    )
                    .map_err(|e| self.sighash_err(e))?;
                let keypair = Keypair::from_secret_key(self.secp, signer);
                let (xonly, _) = keypair.x_only_public_key();
                let sig = self.sign_schnorr(sighash.to_byte_array(), &keypair, &xonly.serialize(), ty)?;

                let count = self.spec.kind().witness_segments();
                let segments: &[Vec<u8>] = match (count, payload) {
                    (0, _) => &[],
                    (n, Some(p)) => &p.segments()[..n],
                    (_, None) => return Err(BuildError::MissingPayload(self.index)),
                };
                Ok((ScriptBuf::new(), note_leaf_witness(&sig, segments, leaf)))
            }
        }
    }

    fn ecdsa_type(&self) -> BuildResult<EcdsaSighashType> {
        match self.spec.sighash_type() {
            None => Ok(EcdsaSighashType::All),
            Some(v) => EcdsaSighashType::from_standard(v).map_err(|_| BuildError::InvalidSighashType(v)),
        }
    }

    fn tap_type(&self) -> BuildResult<TapSighashType> {
        match self.spec.sighash_type() {
            None => Ok(TapSighashType::Default),
            Some(v) => u8::try_from(v)
                .ok()
                .and_then(|b| TapSighashType::from_consensus_u8(b).ok())
                .ok_or(BuildError::InvalidSighashType(v)),
        }
    }

    /// Signs with ECDSA, checks the result and returns the witness encoding.
    fn sign_ecdsa(&self, digest: [u8; 32], ty: EcdsaSighashType) -> BuildResult<Vec<u8>> {
        let signer = self.spec.signer();
        let signature = self.secp.sign_ecdsa(&Message::from_digest(digest), signer);
        let sig = ecdsa::Signature {
            signature,
            sighash_type: ty,
        }
        .to_vec();

        let key = signer.public_key(self.secp).serialize();
        EcdsaValidator::new(self.secp)
            .validate(&key, &digest, &sig)
            .map_err(|_| self.rejected(SigningPath::Ecdsa))?;
        Ok(sig)
    }

    /// Signs with Schnorr and checks the result against `key`.
    fn sign_schnorr(
        &self,
        digest: [u8; 32],
        keypair: &Keypair,
        key: &[u8; 32],
        ty: TapSighashType,
    ) -> BuildResult<taproot::Signature> {
        let signature = self
            .secp
            .sign_schnorr_no_aux_rand(&Message::from_digest(digest), keypair);
        let sig = taproot::Signature {
            signature,
            sighash_type: ty,
        };

        SchnorrValidator::new(self.secp)
            .validate(key, &digest, &sig.to_vec())
            .map_err(|_| self.rejected(self.spec.kind().signing_path()))?;
        Ok(sig)
    }

    fn sighash_err(&self, e: impl std::fmt::Display) -> BuildError {
        BuildError::Sighash {
            index: self.index,
            reason: e.to_string(),
        }
    }

    fn rejected(&self, path: SigningPath) -> BuildError {
        warn!(index = self.index, outpoint = %self.outpoint(), %path, "produced signature failed validation");
        BuildError::SignatureRejected {
            index: self.index,
            path,
        }
    }

    fn outpoint(&self) -> OutPoint {
        self.spec.utxo().outpoint()
    }
}

fn push_bytes(bytes: Vec<u8>) -> BuildResult<PushBytesBuf> {
    PushBytesBuf::try_from(bytes).map_err(|_| BuildError::PushTooLarge)
}
