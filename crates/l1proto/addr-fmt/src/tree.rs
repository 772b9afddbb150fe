//! Two-leaf Taproot trees wrapping NOTE leaf scripts.
//!
//! Leaf 0 is the NOTE script, leaf 1 a bare `<key> OP_CHECKSIG` fallback that
//! spends the output without protocol semantics. Both sit at depth 1 and the
//! internal key is the owner's x-only key.

use bitcoin::{
    Address, Network, ScriptBuf, XOnlyPublicKey,
    key::TweakedPublicKey,
    secp256k1::{self, Secp256k1, Verification},
    taproot::{ControlBlock, LeafVersion, TapLeafHash, TaprootBuilder, TaprootSpendInfo},
};
use note_envelope_fmt::builder::{
    FallbackKey, build_commit_data_script, build_commit_note_script, build_fallback_script,
    build_note_script,
};

use crate::{
    error::{AddrFmtError, AddrFmtResult},
    types::AddressType,
};

/// A leaf of a NOTE tree with everything needed to spend through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapLeaf {
    script: ScriptBuf,
    leaf_version: LeafVersion,
    control_block: ControlBlock,
}

impl TapLeaf {
    /// Gets the leaf script.
    pub fn script(&self) -> &ScriptBuf {
        &self.script
    }

    /// Gets the leaf version.
    pub fn leaf_version(&self) -> LeafVersion {
        self.leaf_version
    }

    /// Gets the control block proving the leaf is in the tree.
    pub fn control_block(&self) -> &ControlBlock {
        &self.control_block
    }

    /// Computes the leaf hash committed to by script-path sighashes.
    pub fn leaf_hash(&self) -> TapLeafHash {
        TapLeafHash::from_script(&self.script, self.leaf_version)
    }
}

/// Which leaf of a NOTE tree a spend goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafPath {
    /// The NOTE script.
    Note,
    /// The `<key> OP_CHECKSIG` fallback.
    Fallback,
}

/// Two-leaf Taproot tree for one of the NOTE address types.
#[derive(Debug, Clone)]
pub struct NoteTaprootTree {
    address_type: AddressType,
    internal_key: XOnlyPublicKey,
    spend_info: TaprootSpendInfo,
    note_leaf: TapLeaf,
    fallback_leaf: TapLeaf,
}

impl NoteTaprootTree {
    /// Builds the tree for `address_type` owned by `pubkey`.
    ///
    /// Commit variants embed `commit_data` in their NOTE leaf and require it.
    /// The other variants ignore it.
    pub fn new<C: Verification>(
        secp: &Secp256k1<C>,
        address_type: AddressType,
        pubkey: &secp256k1::PublicKey,
        commit_data: Option<&[u8]>,
    ) -> AddrFmtResult<Self> {
        let (internal_key, _) = pubkey.x_only_public_key();
        let missing = || AddrFmtError::MissingCommitData(address_type);

        let (note_script, fallback_key) = match address_type {
            AddressType::TaprootNoteV1 => (
                build_note_script(&internal_key),
                FallbackKey::Compressed(*pubkey),
            ),
            AddressType::TaprootNote => (
                build_note_script(&internal_key),
                FallbackKey::XOnly(internal_key),
            ),
            AddressType::TaprootCommitNote => (
                build_commit_note_script(&internal_key, commit_data.ok_or_else(missing)?)?,
                FallbackKey::XOnly(internal_key),
            ),
            AddressType::TaprootCommitData => (
                build_commit_data_script(&internal_key, commit_data.ok_or_else(missing)?)?,
                FallbackKey::XOnly(internal_key),
            ),
            other => return Err(AddrFmtError::NotNoteTree(other)),
        };
        let fallback_script = build_fallback_script(fallback_key);

        let spend_info = TaprootBuilder::new()
            .add_leaf(1, note_script.clone())?
            .add_leaf(1, fallback_script.clone())?
            .finalize(secp, internal_key)
            .map_err(|_| AddrFmtError::TreeNotFinalized)?;

        let note_leaf = make_leaf(&spend_info, note_script)?;
        let fallback_leaf = make_leaf(&spend_info, fallback_script)?;

        Ok(Self {
            address_type,
            internal_key,
            spend_info,
            note_leaf,
            fallback_leaf,
        })
    }

    /// Gets the address type the tree was built for.
    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    /// Gets the untweaked internal key.
    pub fn internal_key(&self) -> &XOnlyPublicKey {
        &self.internal_key
    }

    /// Gets the full spend info.
    pub fn spend_info(&self) -> &TaprootSpendInfo {
        &self.spend_info
    }

    /// Gets the tweaked output key.
    pub fn output_key(&self) -> TweakedPublicKey {
        self.spend_info.output_key()
    }

    /// Locking script of the tree output. Every leaf path shares it.
    pub fn locking_script(&self) -> ScriptBuf {
        ScriptBuf::new_p2tr_tweaked(self.output_key())
    }

    /// Address of the tree output on `network`.
    pub fn address(&self, network: Network) -> Address {
        Address::p2tr_tweaked(self.output_key(), network)
    }

    /// Gets the NOTE leaf.
    pub fn note_leaf(&self) -> &TapLeaf {
        &self.note_leaf
    }

    /// Gets the fallback leaf.
    pub fn fallback_leaf(&self) -> &TapLeaf {
        &self.fallback_leaf
    }

    /// Gets the leaf for a spend path.
    pub fn leaf(&self, path: LeafPath) -> &TapLeaf {
        match path {
            LeafPath::Note => &self.note_leaf,
            LeafPath::Fallback => &self.fallback_leaf,
        }
    }
}

fn make_leaf(spend_info: &TaprootSpendInfo, script: ScriptBuf) -> AddrFmtResult<TapLeaf> {
    let leaf_version = LeafVersion::TapScript;
    let control_block = spend_info
        .control_block(&(script.clone(), leaf_version))
        .ok_or(AddrFmtError::MissingControlBlock)?;
    Ok(TapLeaf {
        script,
        leaf_version,
        control_block,
    })
}

#[cfg(test)]
mod tests {
    use bitcoin::secp256k1::SecretKey;
    use note_envelope_fmt::parser::parse_note_script;

    use super::*;

    fn test_pubkey(secp: &Secp256k1<secp256k1::All>) -> secp256k1::PublicKey {
        SecretKey::from_slice(&[0x33; 32]).unwrap().public_key(secp)
    }

    #[test]
    fn test_control_blocks_verify() {
        let secp = Secp256k1::new();
        let pk = test_pubkey(&secp);

        for ty in [
            AddressType::TaprootNoteV1,
            AddressType::TaprootNote,
            AddressType::TaprootCommitNote,
            AddressType::TaprootCommitData,
        ] {
            let tree = NoteTaprootTree::new(&secp, ty, &pk, Some(b"hello")).unwrap();
            for path in [LeafPath::Note, LeafPath::Fallback] {
                let leaf = tree.leaf(path);
                assert_eq!(leaf.leaf_version().to_consensus(), 0xc0);
                assert!(
                    leaf.control_block().verify_taproot_commitment(
                        &secp,
                        tree.output_key().to_inner(),
                        leaf.script()
                    ),
                    "{ty} {path:?}"
                );
            }
            assert!(tree.locking_script().is_p2tr());
        }
    }

    #[test]
    fn test_generations_differ_in_fallback() {
        let secp = Secp256k1::new();
        let pk = test_pubkey(&secp);

        let v1 = NoteTaprootTree::new(&secp, AddressType::TaprootNoteV1, &pk, None).unwrap();
        let v2 = NoteTaprootTree::new(&secp, AddressType::TaprootNote, &pk, None).unwrap();

        assert_eq!(v1.note_leaf().script(), v2.note_leaf().script());
        assert_eq!(v1.fallback_leaf().script().len(), 35);
        assert_eq!(v2.fallback_leaf().script().len(), 34);
        assert_ne!(v1.locking_script(), v2.locking_script());
    }

    #[test]
    fn test_commit_address_depends_on_data() {
        let secp = Secp256k1::new();
        let pk = test_pubkey(&secp);
        let ty = AddressType::TaprootCommitData;

        let a = NoteTaprootTree::new(&secp, ty, &pk, Some(b"one")).unwrap();
        let b = NoteTaprootTree::new(&secp, ty, &pk, Some(b"two")).unwrap();
        let a_again = NoteTaprootTree::new(&secp, ty, &pk, Some(b"one")).unwrap();

        assert_ne!(a.locking_script(), b.locking_script());
        assert_eq!(a.locking_script(), a_again.locking_script());

        let parsed = parse_note_script(a.note_leaf().script()).unwrap();
        assert_eq!(parsed.data(), Some(&b"one"[..]));
    }

    #[test]
    fn test_non_note_types_and_missing_data() {
        let secp = Secp256k1::new();
        let pk = test_pubkey(&secp);

        assert!(matches!(
            NoteTaprootTree::new(&secp, AddressType::TaprootKey, &pk, None),
            Err(AddrFmtError::NotNoteTree(AddressType::TaprootKey))
        ));
        assert!(matches!(
            NoteTaprootTree::new(&secp, AddressType::TaprootCommitNote, &pk, None),
            Err(AddrFmtError::MissingCommitData(AddressType::TaprootCommitNote))
        ));
    }
}
