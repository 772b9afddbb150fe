//! Address generation for every [`AddressType`].

use bitcoin::{
    Address, CompressedPublicKey, Network, ScriptBuf, WScriptHash,
    address::NetworkUnchecked,
    hashes::Hash,
    secp256k1::{self, Secp256k1, Verification},
};

use crate::{
    error::{AddrFmtError, AddrFmtResult},
    tree::NoteTaprootTree,
    types::{AddressType, ScriptHash},
};

/// A generated address with the data needed to fund and later spend it.
#[derive(Debug, Clone)]
pub struct AddressInfo {
    address: Address,
    locking_script: ScriptBuf,
    script_hash: ScriptHash,
    address_type: AddressType,

    /// Redeem script for P2SH, witness script for P2WSH.
    redeem_script: Option<ScriptBuf>,

    /// Script tree for the NOTE types.
    tree: Option<NoteTaprootTree>,
}

impl AddressInfo {
    /// Gets the address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the locking script.
    pub fn locking_script(&self) -> &ScriptBuf {
        &self.locking_script
    }

    /// Gets the locking script as hex.
    pub fn locking_script_hex(&self) -> String {
        self.locking_script.to_hex_string()
    }

    /// Gets the chain service index key.
    pub fn script_hash(&self) -> ScriptHash {
        self.script_hash
    }

    /// Gets the address type.
    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    /// Gets the redeem or witness script, for script-hash types.
    pub fn redeem_script(&self) -> Option<&ScriptBuf> {
        self.redeem_script.as_ref()
    }

    /// Gets the NOTE tree, for NOTE types.
    pub fn tree(&self) -> Option<&NoteTaprootTree> {
        self.tree.as_ref()
    }
}

/// Config for generating addresses.
#[derive(Clone, Copy, Debug)]
pub struct AddressConfig {
    network: Network,
}

impl AddressConfig {
    /// Constructs a new instance.
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    /// Gets the network.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Generates the address of `address_type` for `pubkey`.
    ///
    /// Commit variants require `commit_data`, the encoded payload baked into
    /// their NOTE leaf.
    pub fn generate<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        pubkey: &secp256k1::PublicKey,
        address_type: AddressType,
        commit_data: Option<&[u8]>,
    ) -> AddrFmtResult<AddressInfo> {
        let cpk = CompressedPublicKey(*pubkey);
        let mut redeem_script = None;
        let mut tree = None;

        let locking_script = match address_type {
            AddressType::PlainKeyHash => ScriptBuf::new_p2pkh(&cpk.pubkey_hash()),
            AddressType::ScriptHash => {
                let redeem = ScriptBuf::new_p2wpkh(&cpk.wpubkey_hash());
                let hash = bitcoin::ScriptHash::hash(redeem.as_bytes());
                redeem_script = Some(redeem);
                ScriptBuf::new_p2sh(&hash)
            }
            AddressType::WitnessKeyHash => ScriptBuf::new_p2wpkh(&cpk.wpubkey_hash()),
            AddressType::WitnessScriptHash => {
                let witness_script = ScriptBuf::new_p2pkh(&cpk.pubkey_hash());
                let hash = WScriptHash::hash(witness_script.as_bytes());
                redeem_script = Some(witness_script);
                ScriptBuf::new_p2wsh(&hash)
            }
            AddressType::TaprootKey => {
                let (internal_key, _) = pubkey.x_only_public_key();
                ScriptBuf::new_p2tr(secp, internal_key, None)
            }
            AddressType::TaprootNoteV1
            | AddressType::TaprootNote
            | AddressType::TaprootCommitNote
            | AddressType::TaprootCommitData => {
                let note_tree = NoteTaprootTree::new(secp, address_type, pubkey, commit_data)?;
                let script = note_tree.locking_script();
                tree = Some(note_tree);
                script
            }
        };

        let address = Address::from_script(&locking_script, self.network)
            .map_err(|_| AddrFmtError::UnsupportedScript)?;
        let script_hash = ScriptHash::from_script(&locking_script);

        Ok(AddressInfo {
            address,
            locking_script,
            script_hash,
            address_type,
            redeem_script,
            tree,
        })
    }

    /// Parses an address for this network and returns its locking script and
    /// chain service index key.
    pub fn address_to_script_hash(&self, address: &str) -> AddrFmtResult<(ScriptBuf, ScriptHash)> {
        let unchecked: Address<NetworkUnchecked> = address
            .parse()
            .map_err(|e: bitcoin::address::ParseError| AddrFmtError::InvalidAddress(e.to_string()))?;
        let checked = unchecked
            .require_network(self.network)
            .map_err(|_| AddrFmtError::NetworkMismatch(self.network))?;

        let locking_script = checked.script_pubkey();
        let script_hash = ScriptHash::from_script(&locking_script);
        Ok((locking_script, script_hash))
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::secp256k1::SecretKey;

    use super::*;

    fn setup() -> (Secp256k1<secp256k1::All>, secp256k1::PublicKey) {
        let secp = Secp256k1::new();
        let pk = SecretKey::from_slice(&[0x44; 32]).unwrap().public_key(&secp);
        (secp, pk)
    }

    #[test]
    fn test_every_type_generates() {
        let (secp, pk) = setup();
        let config = AddressConfig::new(Network::Regtest);

        for ty in AddressType::ALL {
            let info = config.generate(&secp, &pk, ty, Some(&[0xa1, 0x01])).unwrap();
            let script = info.locking_script();

            let shape_ok = match ty {
                AddressType::PlainKeyHash => script.is_p2pkh(),
                AddressType::ScriptHash => script.is_p2sh(),
                AddressType::WitnessKeyHash => script.is_p2wpkh(),
                AddressType::WitnessScriptHash => script.is_p2wsh(),
                _ => script.is_p2tr(),
            };
            assert!(shape_ok, "{ty} produced {script}");

            assert_eq!(info.address().script_pubkey(), *script);
            assert_eq!(info.script_hash(), ScriptHash::from_script(script));
            assert_eq!(info.tree().is_some(), ty.is_note_tree());
            assert_eq!(
                info.redeem_script().is_some(),
                matches!(
                    ty,
                    AddressType::ScriptHash | AddressType::WitnessScriptHash
                )
            );
        }
    }

    #[test]
    fn test_network_prefixes() {
        let (secp, pk) = setup();

        let regtest = AddressConfig::new(Network::Regtest)
            .generate(&secp, &pk, AddressType::WitnessKeyHash, None)
            .unwrap();
        assert!(regtest.address().to_string().starts_with("bcrt1q"));

        let mainnet = AddressConfig::new(Network::Bitcoin)
            .generate(&secp, &pk, AddressType::TaprootNote, None)
            .unwrap();
        assert!(mainnet.address().to_string().starts_with("bc1p"));
    }

    #[test]
    fn test_address_to_script_hash() {
        let (secp, pk) = setup();
        let config = AddressConfig::new(Network::Testnet);
        let info = config
            .generate(&secp, &pk, AddressType::TaprootNote, None)
            .unwrap();

        let (script, hash) = config
            .address_to_script_hash(&info.address().to_string())
            .unwrap();
        assert_eq!(&script, info.locking_script());
        assert_eq!(hash, info.script_hash());

        let mainnet = AddressConfig::new(Network::Bitcoin);
        assert!(matches!(
            mainnet.address_to_script_hash(&info.address().to_string()),
            Err(AddrFmtError::NetworkMismatch(Network::Bitcoin))
        ));
        assert!(matches!(
            config.address_to_script_hash("not-an-address"),
            Err(AddrFmtError::InvalidAddress(_))
        ));
    }
}
