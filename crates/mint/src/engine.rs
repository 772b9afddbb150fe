//! Protocol workflows over a chain service.
//!
//! The engine knows the account keys, their main and token addresses, and how
//! to turn a workflow (send, mint a payload, transfer, commit data, clear) into
//! a request for the transaction builder. Everything it fetches is stamped
//! with its address type and owning key before it is used as an input.

use bitcoin::{
    ScriptBuf,
    secp256k1::{All, Secp256k1, SecretKey},
};
use note_addr_fmt::{AddressConfig, AddressInfo, AddressType, LeafPath, ScriptHash};
use note_msg_fmt::{NotePayload, NoteValue, encode_commit_data};
use note_tx_builder::{
    BuildError, BuildResult, BuiltTx, DUST_LIMIT, InputResolver, InputSpec, Recipient, TxBuilder,
    TxRequest, Utxo,
};
use tracing::*;

use crate::{
    cancel::CancelToken,
    chain::{Balance, BroadcastResult, ChainService, TokenUtxo},
    config::EngineConfig,
    errors::{ChainError, ConstructionError, MintResult},
    pow::Carried,
    records::{TransferAmount, TransferRecord},
};

/// One key with its main and token addresses.
#[derive(Clone, Debug)]
pub struct Account {
    secret: SecretKey,
    main: AddressInfo,
    token: AddressInfo,
}

impl Account {
    /// Gets the signing key.
    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Gets the address holding plain funds and change.
    pub fn main(&self) -> &AddressInfo {
        &self.main
    }

    /// Gets the address holding token outputs.
    pub fn token(&self) -> &AddressInfo {
        &self.token
    }
}

/// Runs protocol workflows for a set of account keys.
///
/// The first account is the current one: it receives change and tokens and
/// signs NOTE inputs. Every account funds.
#[derive(Debug)]
pub struct ProtocolEngine<S> {
    chain: S,
    config: EngineConfig,
    secp: Secp256k1<All>,
    addrs: AddressConfig,
    accounts: Vec<Account>,
    cancel: CancelToken,
}

impl<S: ChainService> ProtocolEngine<S> {
    /// Constructs a new instance for `keys`, the current account first.
    pub fn new(chain: S, config: EngineConfig, keys: Vec<SecretKey>) -> MintResult<Self> {
        if keys.is_empty() {
            return Err(ConstructionError::NoAccount.into());
        }

        let secp = Secp256k1::new();
        let addrs = AddressConfig::new(config.network);
        let accounts = keys
            .into_iter()
            .map(|secret| -> MintResult<Account> {
                let pk = secret.public_key(&secp);
                Ok(Account {
                    secret,
                    main: addrs.generate(&secp, &pk, config.main_address_type, None)?,
                    token: addrs.generate(&secp, &pk, config.token_address_type, None)?,
                })
            })
            .collect::<MintResult<Vec<_>>>()?;

        Ok(Self {
            chain,
            config,
            secp,
            addrs,
            accounts,
            cancel: CancelToken::new(),
        })
    }

    /// Gets the chain service.
    pub fn chain(&self) -> &S {
        &self.chain
    }

    /// Gets the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gets the signing context.
    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    /// Gets the token that cancels polling and mining.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Gets all accounts, the current one first.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    fn current(&self) -> &Account {
        // Non-empty since construction.
        &self.accounts[0]
    }

    /// Gets the current main address.
    pub fn main_address(&self) -> &AddressInfo {
        self.current().main()
    }

    /// Gets the current token address.
    pub fn token_address(&self) -> &AddressInfo {
        self.current().token()
    }

    /// Gets a transaction builder.
    pub fn builder(&self) -> TxBuilder<'_, All> {
        TxBuilder::new(&self.secp)
    }

    fn resolver(&self) -> InputResolver<'_, All> {
        InputResolver::new(&self.secp, self.config.network, self.current().secret)
    }

    /// Fetches the fee rate of the configured tier.
    pub async fn fee_per_kb(&self) -> MintResult<u64> {
        Ok(self.chain.fees_per_kb().await?.get(self.config.fee_tier))
    }

    /// Fetches the chain tip height.
    pub async fn best_block_height(&self) -> MintResult<u64> {
        Ok(self.chain.best_block().await?.height)
    }

    /// Fetches the balance of the current main address.
    pub async fn balance(&self) -> MintResult<Balance> {
        Ok(self.chain.balance(&self.main_address().script_hash()).await?)
    }

    /// Asks the chain service to reindex the current addresses.
    pub async fn refresh(&self) -> MintResult<()> {
        self.chain.refresh(&self.main_address().script_hash()).await?;
        self.chain.refresh(&self.token_address().script_hash()).await?;
        Ok(())
    }

    /// Fetches the spendable outputs of every account's main address, stamped
    /// with type and key.
    pub async fn funding_utxos(&self) -> MintResult<Vec<Utxo>> {
        let hashes: Vec<ScriptHash> = self.accounts.iter().map(|a| a.main.script_hash()).collect();
        let utxos = self.chain.utxos(&hashes).await?;
        Ok(utxos
            .into_iter()
            .filter_map(|utxo| {
                let stamped = self.stamp_main(utxo);
                if stamped.is_none() {
                    trace!("skipping utxo not locked to a main address");
                }
                stamped
            })
            .collect())
    }

    fn stamp_main(&self, utxo: Utxo) -> Option<Utxo> {
        let account = self
            .accounts
            .iter()
            .find(|a| a.main.locking_script() == &utxo.script)?;
        Some(
            utxo.with_type(account.main.address_type())
                .with_signer(account.secret),
        )
    }

    fn stamp_token(&self, utxo: Utxo) -> Utxo {
        let current = self.current();
        utxo.with_type(current.token.address_type())
            .with_signer(current.secret)
    }

    /// Fetches the outputs on the current token address.
    pub async fn token_address_utxos(&self) -> MintResult<Vec<Utxo>> {
        let utxos = self
            .chain
            .utxos(&[self.token_address().script_hash()])
            .await?;
        Ok(utxos.into_iter().map(|u| self.stamp_token(u)).collect())
    }

    fn resolve_funding(&self, utxos: Vec<Utxo>) -> MintResult<Vec<InputSpec>> {
        let resolver = self.resolver();
        Ok(utxos
            .into_iter()
            .map(|u| resolver.resolve(u))
            .collect::<BuildResult<_>>()?)
    }

    /// Builds at the configured fee rate.
    async fn build(&self, req: &TxRequest) -> MintResult<BuiltTx> {
        let fee_per_kb = self.fee_per_kb().await?;
        Ok(self.builder().build(req, fee_per_kb)?)
    }

    /// Broadcasts, retrying a failed call once.
    pub async fn broadcast(&self, built: &BuiltTx) -> MintResult<BroadcastResult> {
        let raw = built.to_hex();
        let txid = built.txid();
        let result = match self.chain.broadcast(&raw).await {
            Ok(r) => r,
            Err(e) => {
                warn!(%e, %txid, "broadcast failed, retrying once");
                self.chain.broadcast(&raw).await?
            }
        };

        if result.success {
            info!(%txid, "broadcast accepted");
        } else {
            warn!(%txid, error = ?result.error, "broadcast rejected");
        }
        Ok(result)
    }

    /// Waits until the first output on `script_hash` shows up.
    pub async fn wait_for_utxo(&self, script_hash: ScriptHash) -> MintResult<Utxo> {
        let what = format!("utxo on {script_hash}");
        self.config
            .poll
            .poll(&what, &self.cancel, move || async move {
                let utxos = self.chain.utxos(&[script_hash]).await?;
                Ok::<_, ChainError>(utxos.into_iter().next())
            })
            .await
    }

    /// Pays plain funds to `recipients`, change to the main address.
    pub async fn send(&self, recipients: Vec<Recipient>) -> MintResult<BroadcastResult> {
        let span = debug_span!("send", outputs = recipients.len());
        async move {
            let mut req = TxRequest::new(self.main_address().locking_script().clone());
            req.funding_inputs = self.resolve_funding(self.funding_utxos().await?)?;
            req.recipients = recipients;
            let built = self.build(&req).await?;
            self.broadcast(&built).await
        }
        .instrument(span)
        .await
    }

    /// Gets an output on the token address to spend through the NOTE leaf,
    /// funding one with a dust output when there is none.
    pub async fn note_utxo(&self) -> MintResult<Utxo> {
        if let Some(utxo) = self.token_address_utxos().await?.into_iter().next() {
            return Ok(utxo);
        }

        debug!("no note utxo, funding one");
        let token = self.token_address();
        self.send(vec![Recipient::new(token.locking_script().clone(), DUST_LIMIT)])
            .await?
            .into_accepted()?;
        let utxo = self.wait_for_utxo(token.script_hash()).await?;
        Ok(self.stamp_token(utxo))
    }

    /// Prepares the request of a payload transaction: spends a note output
    /// with `value` in its witness and sends dust to `to`, or to the token
    /// address.
    pub async fn prepare_payload(&self, value: &NoteValue, to: Option<ScriptBuf>) -> MintResult<Carried> {
        let payload = NotePayload::from_value(value, self.config.payload_options())?;
        let note = self.note_utxo().await?;
        let resolver = self.resolver();

        let mut req = TxRequest::new(self.main_address().locking_script().clone());
        req.payload = Some(payload);
        req.note_inputs = vec![resolver.resolve_with(note, LeafPath::Note, None)?];
        req.funding_inputs = self.resolve_funding(self.funding_utxos().await?)?;
        let to = to.unwrap_or_else(|| self.token_address().locking_script().clone());
        req.recipients = vec![Recipient::new(to, DUST_LIMIT)];

        Ok(Carried {
            request: req,
            fee_per_kb: self.fee_per_kb().await?,
        })
    }

    /// Broadcasts a payload transaction.
    pub async fn mint_payload(&self, value: &NoteValue, to: Option<ScriptBuf>) -> MintResult<BroadcastResult> {
        let span = debug_span!("mint_payload");
        async move {
            let carried = self.prepare_payload(value, to).await?;
            let built = self.builder().build(&carried.request, carried.fee_per_kb)?;
            self.broadcast(&built).await
        }
        .instrument(span)
        .await
    }

    /// Transfers `amt` of `tick` to `to`.
    pub async fn transfer(&self, to: ScriptBuf, tick: &str, amt: u64) -> MintResult<BroadcastResult> {
        let span = debug_span!("transfer", %tick, %amt);
        self.transfer_inner(tick, TransferAmount::Single(amt), vec![to])
            .instrument(span)
            .await
    }

    /// Transfers `tick` to several recipients in one transaction.
    pub async fn transfer_multi(&self, tick: &str, to: Vec<(ScriptBuf, u64)>) -> MintResult<BroadcastResult> {
        let span = debug_span!("transfer_multi", %tick, recipients = to.len());
        let (scripts, amounts): (Vec<_>, Vec<_>) = to.into_iter().unzip();
        self.transfer_inner(tick, TransferAmount::Multi(amounts), scripts)
            .instrument(span)
            .await
    }

    async fn transfer_inner(
        &self,
        tick: &str,
        amt: TransferAmount,
        to: Vec<ScriptBuf>,
    ) -> MintResult<BroadcastResult> {
        let requested = amt.total().ok_or_else(|| ConstructionError::AmountOverflow {
            tick: tick.to_owned(),
        })?;
        let want = match amt {
            TransferAmount::Single(a) => Some(a),
            TransferAmount::Multi(_) => None,
        };
        let tokens: Vec<TokenUtxo> = self
            .chain
            .token_utxos(&[self.token_address().script_hash()], tick, want)
            .await?;
        if tokens.is_empty() {
            return Err(ConstructionError::NoTokenUtxos { tick: tick.to_owned() }.into());
        }

        let balance = tokens
            .iter()
            .try_fold(0u64, |acc, t| acc.checked_add(t.amount))
            .ok_or_else(|| ChainError::Decode(format!("{tick} token amounts overflow")))?;
        if balance < requested {
            return Err(ConstructionError::InsufficientTokens {
                tick: tick.to_owned(),
                balance,
                requested,
            }
            .into());
        }

        let mut recipients: Vec<Recipient> = to
            .into_iter()
            .map(|script| Recipient::new(script, DUST_LIMIT))
            .collect();
        if balance > requested {
            recipients.push(Recipient::new(
                self.token_address().locking_script().clone(),
                DUST_LIMIT,
            ));
        }

        let record = TransferRecord {
            tick: tick.to_owned(),
            amt,
        };
        let payload = NotePayload::from_value(&record.to_value(), self.config.payload_options())?;

        let resolver = self.resolver();
        let mut req = TxRequest::new(self.main_address().locking_script().clone());
        req.payload = Some(payload);
        req.note_inputs = tokens
            .into_iter()
            .map(|t| resolver.resolve_with(self.stamp_token(t.utxo), LeafPath::Note, None))
            .collect::<BuildResult<_>>()?;
        req.funding_inputs = self.resolve_funding(self.funding_utxos().await?)?;
        req.recipients = recipients;

        let built = self.build(&req).await?;
        self.broadcast(&built).await
    }

    /// Bakes `value` into a commit-data address, funds it, then spends it
    /// through its data leaf with dust to `to`.
    pub async fn commit_data(&self, value: &NoteValue, to: ScriptBuf) -> MintResult<BroadcastResult> {
        let span = debug_span!("commit_data");
        async move {
            let data = encode_commit_data(value)?;
            let current = self.current();
            let commit = self.addrs.generate(
                &self.secp,
                &current.secret.public_key(&self.secp),
                AddressType::TaprootCommitData,
                Some(&data),
            )?;
            debug!(address = %commit.address(), len = data.len(), "funding commit address");

            self.send(vec![Recipient::new(commit.locking_script().clone(), DUST_LIMIT)])
                .await?
                .into_accepted()?;
            let utxo = self
                .wait_for_utxo(commit.script_hash())
                .await?
                .with_type(AddressType::TaprootCommitData)
                .with_signer(current.secret);

            let mut req = TxRequest::new(self.main_address().locking_script().clone());
            req.note_inputs = vec![
                self.resolver()
                    .resolve_with(utxo, LeafPath::Note, Some(&data))?,
            ];
            req.funding_inputs = self.resolve_funding(self.funding_utxos().await?)?;
            req.recipients = vec![Recipient::new(to, DUST_LIMIT)];

            let built = self.build(&req).await?;
            self.broadcast(&built).await
        }
        .instrument(span)
        .await
    }

    /// Spends every output on the token address through the fallback leaf and
    /// sends everything to the main address.
    pub async fn clear(&self) -> MintResult<BroadcastResult> {
        let span = debug_span!("clear");
        async move {
            let resolver = self.resolver();
            let inputs = self
                .token_address_utxos()
                .await?
                .into_iter()
                .map(|u| resolver.resolve(u))
                .collect::<BuildResult<Vec<_>>>()?;

            let mut req = TxRequest::new(self.main_address().locking_script().clone());
            req.note_inputs = inputs;
            let total = req.total_input().map_err(BuildError::from)?;
            req.recipients = vec![Recipient::new(
                self.main_address().locking_script().clone(),
                total,
            )];

            let built = self.build(&req).await?;
            self.broadcast(&built).await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bitcoin::Network;

    use super::*;
    use crate::{
        chain::{Balance, BestBlock, FeeRates},
        errors::{ChainResult, MintError},
    };

    #[derive(Debug)]
    struct Offline;

    #[async_trait]
    impl ChainService for Offline {
        async fn balance(&self, _: &ScriptHash) -> ChainResult<Balance> {
            Ok(Balance::default())
        }
        async fn utxos(&self, _: &[ScriptHash]) -> ChainResult<Vec<Utxo>> {
            Ok(Vec::new())
        }
        async fn token_utxos(&self, _: &[ScriptHash], _: &str, _: Option<u64>) -> ChainResult<Vec<TokenUtxo>> {
            Ok(Vec::new())
        }
        async fn broadcast(&self, _: &str) -> ChainResult<BroadcastResult> {
            Err(crate::errors::ChainError::Transport("offline".into()))
        }
        async fn fees_per_kb(&self) -> ChainResult<FeeRates> {
            Ok(FeeRates {
                slow_fee: 1_000,
                avg_fee: 2_000,
                fast_fee: 3_000,
            })
        }
        async fn best_block(&self) -> ChainResult<BestBlock> {
            Ok(BestBlock { height: 1, hash: None })
        }
        async fn refresh(&self, _: &ScriptHash) -> ChainResult<()> {
            Ok(())
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            network: Network::Regtest,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_needs_a_key() {
        assert!(matches!(
            ProtocolEngine::new(Offline, config(), vec![]),
            Err(MintError::Construction(ConstructionError::NoAccount))
        ));
    }

    #[test]
    fn test_accounts() {
        let keys = vec![
            SecretKey::from_slice(&[1; 32]).unwrap(),
            SecretKey::from_slice(&[2; 32]).unwrap(),
        ];
        let engine = ProtocolEngine::new(Offline, config(), keys).unwrap();
        assert_eq!(engine.accounts().len(), 2);
        assert_eq!(engine.main_address().address_type(), AddressType::WitnessKeyHash);
        assert_eq!(engine.token_address().address_type(), AddressType::TaprootNote);
        assert_ne!(
            engine.accounts()[0].main().locking_script(),
            engine.accounts()[1].main().locking_script()
        );
    }

    #[test]
    fn test_stamp_main_picks_owner() {
        let keys = vec![
            SecretKey::from_slice(&[1; 32]).unwrap(),
            SecretKey::from_slice(&[2; 32]).unwrap(),
        ];
        let engine = ProtocolEngine::new(Offline, config(), keys.clone()).unwrap();
        let txid = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
            .parse()
            .unwrap();

        let second = engine.accounts()[1].main().locking_script().clone();
        let stamped = engine.stamp_main(Utxo::new(txid, 0, 1_000, second)).unwrap();
        assert_eq!(stamped.signer, Some(keys[1]));
        assert_eq!(stamped.address_type, Some(AddressType::WitnessKeyHash));

        let foreign = Utxo::new(txid, 1, 1_000, ScriptBuf::new());
        assert!(engine.stamp_main(foreign).is_none());
    }

    #[tokio::test]
    async fn test_fee_tier() {
        let engine = ProtocolEngine::new(
            Offline,
            config(),
            vec![SecretKey::from_slice(&[1; 32]).unwrap()],
        )
        .unwrap();
        assert_eq!(engine.fee_per_kb().await.unwrap(), 2_000);
    }

    #[tokio::test]
    async fn test_send_without_funds() {
        let engine = ProtocolEngine::new(
            Offline,
            config(),
            vec![SecretKey::from_slice(&[1; 32]).unwrap()],
        )
        .unwrap();
        let err = engine.send(vec![]).await.unwrap_err();
        // Nothing to spend, so the build fails before any broadcast.
        assert_eq!(err.kind(), crate::MintErrorKind::Construction);
    }
}
