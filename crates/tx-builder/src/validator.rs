//! Signature validators run against every freshly signed input.
//!
//! A validator parses the key and signature bytes it is handed, then checks
//! the signature over a 32-byte sighash. Parsing and checking are split so the
//! same validator can reject malformed witness data and bad signatures with
//! distinct errors.

use std::fmt;

use bitcoin::{
    XOnlyPublicKey, ecdsa, taproot,
    secp256k1::{self, Message, Secp256k1, Verification},
};
use thiserror::Error;

/// How an input was signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningPath {
    /// Schnorr with the untweaked key, revealing a tapscript leaf.
    ScriptPath,

    /// Schnorr with the taproot-tweaked key.
    TweakedKey,

    /// ECDSA over a legacy or segwit v0 sighash.
    Ecdsa,
}

impl fmt::Display for SigningPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SigningPath::ScriptPath => "script-path",
            SigningPath::TweakedKey => "tweaked-key",
            SigningPath::Ecdsa => "ecdsa",
        })
    }
}

/// Failure to validate a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Public key bytes did not parse.
    #[error("bad public key: {0}")]
    BadKey(String),

    /// Signature bytes did not parse.
    #[error("bad signature: {0}")]
    BadSignature(String),

    /// Signature does not match key and message.
    #[error("signature does not verify")]
    Mismatch,
}

/// Checks a signature against a key and sighash.
pub trait SignatureValidator {
    /// Parsed key type.
    type Key;

    /// Parsed signature type.
    type Signature;

    /// Parses raw public key bytes.
    fn parse_key(&self, key: &[u8]) -> Result<Self::Key, ValidationError>;

    /// Parses raw signature bytes, as they appear in a witness.
    fn parse_signature(&self, sig: &[u8]) -> Result<Self::Signature, ValidationError>;

    /// Checks a parsed signature.
    fn verify_inner(
        &self,
        key: &Self::Key,
        msghash: &[u8; 32],
        sig: &Self::Signature,
    ) -> Result<(), ValidationError>;

    /// Parses and checks in one step.
    fn validate(&self, key: &[u8], msghash: &[u8; 32], sig: &[u8]) -> Result<(), ValidationError> {
        let key = self.parse_key(key)?;
        let sig = self.parse_signature(sig)?;
        self.verify_inner(&key, msghash, &sig)
    }
}

/// Validator for BIP-340 Schnorr signatures with a 32-byte x-only key.
#[derive(Debug)]
pub struct SchnorrValidator<'a, C: Verification> {
    secp: &'a Secp256k1<C>,
}

impl<'a, C: Verification> SchnorrValidator<'a, C> {
    /// Constructs a new instance.
    pub fn new(secp: &'a Secp256k1<C>) -> Self {
        Self { secp }
    }
}

impl<C: Verification> SignatureValidator for SchnorrValidator<'_, C> {
    type Key = XOnlyPublicKey;
    type Signature = taproot::Signature;

    fn parse_key(&self, key: &[u8]) -> Result<Self::Key, ValidationError> {
        XOnlyPublicKey::from_slice(key).map_err(|e| ValidationError::BadKey(e.to_string()))
    }

    fn parse_signature(&self, sig: &[u8]) -> Result<Self::Signature, ValidationError> {
        taproot::Signature::from_slice(sig).map_err(|e| ValidationError::BadSignature(e.to_string()))
    }

    fn verify_inner(
        &self,
        key: &Self::Key,
        msghash: &[u8; 32],
        sig: &Self::Signature,
    ) -> Result<(), ValidationError> {
        let msg = Message::from_digest(*msghash);
        self.secp
            .verify_schnorr(&sig.signature, &msg, key)
            .map_err(|_| ValidationError::Mismatch)
    }
}

/// Validator for DER ECDSA signatures with a trailing sighash byte.
#[derive(Debug)]
pub struct EcdsaValidator<'a, C: Verification> {
    secp: &'a Secp256k1<C>,
}

impl<'a, C: Verification> EcdsaValidator<'a, C> {
    /// Constructs a new instance.
    pub fn new(secp: &'a Secp256k1<C>) -> Self {
        Self { secp }
    }
}

impl<C: Verification> SignatureValidator for EcdsaValidator<'_, C> {
    type Key = secp256k1::PublicKey;
    type Signature = ecdsa::Signature;

    fn parse_key(&self, key: &[u8]) -> Result<Self::Key, ValidationError> {
        secp256k1::PublicKey::from_slice(key).map_err(|e| ValidationError::BadKey(e.to_string()))
    }

    fn parse_signature(&self, sig: &[u8]) -> Result<Self::Signature, ValidationError> {
        ecdsa::Signature::from_slice(sig).map_err(|e| ValidationError::BadSignature(e.to_string()))
    }

    fn verify_inner(
        &self,
        key: &Self::Key,
        msghash: &[u8; 32],
        sig: &Self::Signature,
    ) -> Result<(), ValidationError> {
        let msg = Message::from_digest(*msghash);
        self.secp
            .verify_ecdsa(&msg, &sig.signature, key)
            .map_err(|_| ValidationError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{
        EcdsaSighashType, TapSighashType,
        secp256k1::{Keypair, SecretKey},
    };

    use super::*;

    const MSG: [u8; 32] = [0x5a; 32];

    fn keys() -> (Secp256k1<secp256k1::All>, SecretKey) {
        let secp = Secp256k1::new();
        (secp, SecretKey::from_slice(&[0x21; 32]).unwrap())
    }

    #[test]
    fn test_schnorr_accepts_and_rejects() {
        let (secp, sk) = keys();
        let keypair = Keypair::from_secret_key(&secp, &sk);
        let (xonly, _) = keypair.x_only_public_key();
        let signature = secp.sign_schnorr_no_aux_rand(&Message::from_digest(MSG), &keypair);
        let sig = taproot::Signature {
            signature,
            sighash_type: TapSighashType::Default,
        }
        .to_vec();

        let v = SchnorrValidator::new(&secp);
        assert_eq!(v.validate(&xonly.serialize(), &MSG, &sig), Ok(()));
        assert_eq!(
            v.validate(&xonly.serialize(), &[0u8; 32], &sig),
            Err(ValidationError::Mismatch)
        );
        assert!(matches!(
            v.validate(&xonly.serialize()[1..], &MSG, &sig),
            Err(ValidationError::BadKey(_))
        ));
        assert!(matches!(
            v.validate(&xonly.serialize(), &MSG, &sig[..40]),
            Err(ValidationError::BadSignature(_))
        ));
    }

    #[test]
    fn test_ecdsa_accepts_and_rejects() {
        let (secp, sk) = keys();
        let pk = sk.public_key(&secp);
        let signature = secp.sign_ecdsa(&Message::from_digest(MSG), &sk);
        let sig = ecdsa::Signature {
            signature,
            sighash_type: EcdsaSighashType::All,
        }
        .to_vec();

        let v = EcdsaValidator::new(&secp);
        assert_eq!(v.validate(&pk.serialize(), &MSG, &sig), Ok(()));
        assert_eq!(
            v.validate(&pk.serialize(), &[1u8; 32], &sig),
            Err(ValidationError::Mismatch)
        );
    }

    #[test]
    fn test_validators_do_not_cross() {
        let (secp, sk) = keys();
        let pk = sk.public_key(&secp);
        let ecdsa_sig = ecdsa::Signature {
            signature: secp.sign_ecdsa(&Message::from_digest(MSG), &sk),
            sighash_type: EcdsaSighashType::All,
        }
        .to_vec();

        let (xonly, _) = pk.x_only_public_key();
        let schnorr = SchnorrValidator::new(&secp);
        assert!(schnorr.validate(&xonly.serialize(), &MSG, &ecdsa_sig).is_err());
    }
}
