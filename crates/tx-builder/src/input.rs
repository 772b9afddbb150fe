//! Per-type input descriptors.

use bitcoin::{
    Network, ScriptBuf, XOnlyPublicKey,
    secp256k1::{Secp256k1, SecretKey, Signing, Verification},
};
use note_addr_fmt::{AddressConfig, AddressType, LeafPath, TapLeaf};
use note_envelope_fmt::builder::DropTail;

use crate::{
    errors::{BuildError, BuildResult},
    utxo::Utxo,
    validator::SigningPath,
};

/// What an input needs to be built, signed and finalized, by spend type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Legacy key hash. Signed over the legacy sighash, unlocked in the
    /// script sig.
    PlainKeyHash,

    /// Script hash wrapping a witness key hash.
    ScriptHash {
        /// The wrapped witness program.
        redeem_script: ScriptBuf,
    },

    /// Native witness key hash.
    WitnessKeyHash,

    /// Native witness script hash.
    WitnessScriptHash {
        /// The key-hash witness script.
        witness_script: ScriptBuf,
    },

    /// Taproot key-path spend.
    TaprootKey {
        /// Untweaked internal key.
        internal_key: XOnlyPublicKey,
    },

    /// Script-path spend of a mint NOTE tree, either generation.
    TaprootNote {
        /// Leaf being revealed.
        leaf: TapLeaf,
        /// Which of the two leaves it is.
        path: LeafPath,
    },

    /// Script-path spend of a commit-note tree.
    TaprootCommitNote {
        /// Leaf being revealed.
        leaf: TapLeaf,
        /// Which of the two leaves it is.
        path: LeafPath,
    },

    /// Script-path spend of a commit-data tree.
    TaprootCommitData {
        /// Leaf being revealed.
        leaf: TapLeaf,
        /// Which of the two leaves it is.
        path: LeafPath,
    },
}

impl InputKind {
    /// Gets the revealed leaf of a script-path spend.
    pub fn leaf(&self) -> Option<&TapLeaf> {
        match self {
            InputKind::TaprootNote { leaf, .. }
            | InputKind::TaprootCommitNote { leaf, .. }
            | InputKind::TaprootCommitData { leaf, .. } => Some(leaf),
            _ => None,
        }
    }

    /// Selects the signing path. A leaf wins over an internal key, anything
    /// else is ECDSA.
    pub fn signing_path(&self) -> SigningPath {
        match self {
            InputKind::TaprootNote { .. }
            | InputKind::TaprootCommitNote { .. }
            | InputKind::TaprootCommitData { .. } => SigningPath::ScriptPath,
            InputKind::TaprootKey { .. } => SigningPath::TweakedKey,
            InputKind::PlainKeyHash
            | InputKind::ScriptHash { .. }
            | InputKind::WitnessKeyHash
            | InputKind::WitnessScriptHash { .. } => SigningPath::Ecdsa,
        }
    }

    /// Number of payload segments the witness carries between the signature
    /// and the leaf script.
    pub fn witness_segments(&self) -> usize {
        let tail = match self {
            InputKind::TaprootNote {
                path: LeafPath::Note,
                ..
            }
            | InputKind::TaprootCommitNote {
                path: LeafPath::Note,
                ..
            } => DropTail::Segments,
            _ => DropTail::Tag,
        };
        tail.witness_segments()
    }
}

/// A resolved input: the output being spent, how, and with which key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    utxo: Utxo,
    kind: InputKind,
    signer: SecretKey,
    sighash_type: Option<u32>,
}

impl InputSpec {
    /// Gets the spent output.
    pub fn utxo(&self) -> &Utxo {
        &self.utxo
    }

    /// Gets the input kind.
    pub fn kind(&self) -> &InputKind {
        &self.kind
    }

    /// Gets the signing key.
    pub fn signer(&self) -> &SecretKey {
        &self.signer
    }

    /// Gets the sighash type override.
    pub fn sighash_type(&self) -> Option<u32> {
        self.sighash_type
    }

    /// Sets a sighash type override.
    pub fn with_sighash_type(mut self, sighash_type: u32) -> Self {
        self.sighash_type = Some(sighash_type);
        self
    }
}

/// Turns stamped UTXOs into [`InputSpec`]s.
#[derive(Debug)]
pub struct InputResolver<'a, C: Signing + Verification> {
    secp: &'a Secp256k1<C>,
    addrs: AddressConfig,
    primary: SecretKey,
}

impl<'a, C: Signing + Verification> InputResolver<'a, C> {
    /// Constructs a new instance. `primary` signs every UTXO without its own
    /// key.
    pub fn new(secp: &'a Secp256k1<C>, network: Network, primary: SecretKey) -> Self {
        Self {
            secp,
            addrs: AddressConfig::new(network),
            primary,
        }
    }

    /// Resolves a UTXO whose type needs no leaf choice or committed data.
    ///
    /// NOTE trees are spent through their fallback leaf.
    pub fn resolve(&self, utxo: Utxo) -> BuildResult<InputSpec> {
        self.resolve_with(utxo, LeafPath::Fallback, None)
    }

    /// Resolves a UTXO, spending NOTE trees through `path`.
    ///
    /// Commit types need the `commit_data` their address was derived from.
    pub fn resolve_with(
        &self,
        utxo: Utxo,
        path: LeafPath,
        commit_data: Option<&[u8]>,
    ) -> BuildResult<InputSpec> {
        let address_type = utxo
            .address_type
            .ok_or_else(|| BuildError::MissingAddressType(utxo.outpoint().to_string()))?;
        let signer = utxo.signer.unwrap_or(self.primary);
        let pubkey = signer.public_key(self.secp);

        let info = self
            .addrs
            .generate(self.secp, &pubkey, address_type, commit_data)?;
        if info.locking_script() != &utxo.script {
            return Err(BuildError::ScriptMismatch {
                outpoint: utxo.outpoint().to_string(),
                address_type,
            });
        }

        let leaf = || info.tree().map(|t| t.leaf(path).clone());
        let redeem = || info.redeem_script().cloned();
        let malformed = || BuildError::ScriptMismatch {
            outpoint: utxo.outpoint().to_string(),
            address_type,
        };

        let kind = match address_type {
            AddressType::PlainKeyHash => InputKind::PlainKeyHash,
            AddressType::ScriptHash => InputKind::ScriptHash {
                redeem_script: redeem().ok_or_else(malformed)?,
            },
            AddressType::WitnessKeyHash => InputKind::WitnessKeyHash,
            AddressType::WitnessScriptHash => InputKind::WitnessScriptHash {
                witness_script: redeem().ok_or_else(malformed)?,
            },
            AddressType::TaprootKey => InputKind::TaprootKey {
                internal_key: pubkey.x_only_public_key().0,
            },
            AddressType::TaprootNoteV1 | AddressType::TaprootNote => InputKind::TaprootNote {
                leaf: leaf().ok_or_else(malformed)?,
                path,
            },
            AddressType::TaprootCommitNote => InputKind::TaprootCommitNote {
                leaf: leaf().ok_or_else(malformed)?,
                path,
            },
            AddressType::TaprootCommitData => InputKind::TaprootCommitData {
                leaf: leaf().ok_or_else(malformed)?,
                path,
            },
        };

        Ok(InputSpec {
            utxo,
            kind,
            signer,
            sighash_type: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{Txid, secp256k1::All};

    use super::*;

    fn txid() -> Txid {
        "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
            .parse()
            .unwrap()
    }

    fn setup() -> (Secp256k1<All>, SecretKey) {
        (Secp256k1::new(), SecretKey::from_slice(&[0x07; 32]).unwrap())
    }

    fn utxo_for(
        secp: &Secp256k1<All>,
        sk: &SecretKey,
        ty: AddressType,
        commit: Option<&[u8]>,
    ) -> Utxo {
        let info = AddressConfig::new(Network::Regtest)
            .generate(secp, &sk.public_key(secp), ty, commit)
            .unwrap();
        Utxo::new(txid(), 0, 10_000, info.locking_script().clone()).with_type(ty)
    }

    #[test]
    fn test_signing_paths() {
        let (secp, sk) = setup();
        let resolver = InputResolver::new(&secp, Network::Regtest, sk);

        let cases = [
            (AddressType::PlainKeyHash, SigningPath::Ecdsa),
            (AddressType::ScriptHash, SigningPath::Ecdsa),
            (AddressType::WitnessKeyHash, SigningPath::Ecdsa),
            (AddressType::WitnessScriptHash, SigningPath::Ecdsa),
            (AddressType::TaprootKey, SigningPath::TweakedKey),
            (AddressType::TaprootNoteV1, SigningPath::ScriptPath),
            (AddressType::TaprootNote, SigningPath::ScriptPath),
            (AddressType::TaprootCommitNote, SigningPath::ScriptPath),
            (AddressType::TaprootCommitData, SigningPath::ScriptPath),
        ];
        for (ty, expected) in cases {
            let commit: &[u8] = &[0x80];
            let utxo = utxo_for(&secp, &sk, ty, Some(commit));
            let spec = resolver
                .resolve_with(utxo, LeafPath::Note, Some(commit))
                .unwrap();
            assert_eq!(spec.kind().signing_path(), expected, "{ty}");
            assert_eq!(spec.kind().leaf().is_some(), ty.is_note_tree(), "{ty}");
        }
    }

    #[test]
    fn test_witness_segments() {
        let (secp, sk) = setup();
        let resolver = InputResolver::new(&secp, Network::Regtest, sk);
        let commit: &[u8] = &[0x80];

        let cases = [
            (AddressType::TaprootNote, LeafPath::Note, 5),
            (AddressType::TaprootNoteV1, LeafPath::Note, 5),
            (AddressType::TaprootCommitNote, LeafPath::Note, 5),
            (AddressType::TaprootCommitData, LeafPath::Note, 0),
            (AddressType::TaprootNote, LeafPath::Fallback, 0),
            (AddressType::TaprootCommitNote, LeafPath::Fallback, 0),
        ];
        for (ty, path, expected) in cases {
            let utxo = utxo_for(&secp, &sk, ty, Some(commit));
            let spec = resolver.resolve_with(utxo, path, Some(commit)).unwrap();
            assert_eq!(spec.kind().witness_segments(), expected, "{ty} {path:?}");
        }
    }

    #[test]
    fn test_missing_type() {
        let (secp, sk) = setup();
        let resolver = InputResolver::new(&secp, Network::Regtest, sk);
        let mut utxo = utxo_for(&secp, &sk, AddressType::WitnessKeyHash, None);
        utxo.address_type = None;
        assert!(matches!(
            resolver.resolve(utxo),
            Err(BuildError::MissingAddressType(_))
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (secp, sk) = setup();
        let other = SecretKey::from_slice(&[0x08; 32]).unwrap();
        let resolver = InputResolver::new(&secp, Network::Regtest, other);
        let utxo = utxo_for(&secp, &sk, AddressType::WitnessKeyHash, None);
        assert!(matches!(
            resolver.resolve(utxo.clone()),
            Err(BuildError::ScriptMismatch { .. })
        ));

        // Per-utxo key overrides the primary.
        let spec = resolver.resolve(utxo.with_signer(sk)).unwrap();
        assert_eq!(spec.signer(), &sk);
    }

    #[test]
    fn test_commit_needs_data() {
        let (secp, sk) = setup();
        let resolver = InputResolver::new(&secp, Network::Regtest, sk);
        let utxo = utxo_for(&secp, &sk, AddressType::TaprootCommitData, Some(&[1, 2]));
        assert!(matches!(
            resolver.resolve(utxo),
            Err(BuildError::Address(_))
        ));
    }
}
