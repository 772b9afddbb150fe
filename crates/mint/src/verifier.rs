//! Off-chain contract check of a matched mint attempt.

use std::collections::BTreeMap;

use note_msg_fmt::NoteValue;
use serde::{Deserialize, Serialize};

use crate::records::{DeployRecord, MintRecord, N20_PROTOCOL, text_to_hex};

/// Contract method a mint is checked against.
pub const MINT_METHOD: &str = "mint";

/// Arguments of each contract method, built once per verification.
#[derive(Clone, Debug, PartialEq)]
pub struct CallData {
    constructor: NoteValue,
    mint: NoteValue,
    transfer: NoteValue,
}

impl CallData {
    /// Builds the call data for minting `mint` of the token deployed by
    /// `deploy`, with the candidate transaction `tx_hex` at tip `height`.
    ///
    /// Text fields become the hex of their UTF-8 bytes. The mint arguments
    /// are the deploy fields overridden by the mint fields.
    pub fn for_mint(deploy: &DeployRecord, mint: &MintRecord, height: u64, tx_hex: &str) -> Self {
        let mut constructor = into_fields(deploy.to_value());
        hex_text_fields(&mut constructor, N20_PROTOCOL, "deploy", &deploy.tick);

        let mut mint_args = into_fields(deploy.to_value());
        mint_args.extend(into_fields(mint.to_value()));
        hex_text_fields(&mut mint_args, N20_PROTOCOL, "mint", &mint.tick);
        mint_args.insert("height".into(), height.into());
        mint_args.insert("total".into(), 0u64.into());
        mint_args.insert("tx".into(), tx_hex.into());

        let transfer = NoteValue::map([("tick", text_to_hex(&deploy.tick))]);

        Self {
            constructor: NoteValue::Map(constructor),
            mint: NoteValue::Map(mint_args),
            transfer,
        }
    }

    /// Gets the arguments of a method.
    pub fn method(&self, name: &str) -> Option<&NoteValue> {
        match name {
            "constructor" => Some(&self.constructor),
            MINT_METHOD => Some(&self.mint),
            "transfer" => Some(&self.transfer),
            _ => None,
        }
    }

    /// Gets all arguments keyed by method.
    pub fn to_value(&self) -> NoteValue {
        NoteValue::map([
            ("constructor", self.constructor.clone()),
            ("mint", self.mint.clone()),
            ("transfer", self.transfer.clone()),
        ])
    }
}

fn into_fields(value: NoteValue) -> BTreeMap<String, NoteValue> {
    match value {
        NoteValue::Map(m) => m,
        _ => BTreeMap::new(),
    }
}

fn hex_text_fields(fields: &mut BTreeMap<String, NoteValue>, p: &str, op: &str, tick: &str) {
    fields.insert("p".into(), text_to_hex(p).into());
    fields.insert("op".into(), text_to_hex(op).into());
    fields.insert("tick".into(), text_to_hex(tick).into());
}

/// What the verifier said.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Whether the contract accepts the call.
    pub success: bool,

    /// Why not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyResult {
    /// An accepting result.
    pub fn accepted() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A rejecting result.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
        }
    }
}

/// Runs a published contract against call data.
///
/// The contract artifact belongs to the implementation.
pub trait ContractVerifier: Send + Sync {
    /// Checks `method` with the arguments in `call_data`.
    fn verify(&self, call_data: &CallData, method: &str) -> VerifyResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy() -> DeployRecord {
        DeployRecord {
            tick: "NOTE".into(),
            max: 21_000_000,
            lim: 5_000,
            dec: 8,
            sch: "50b13619d4d936d7c5c7fb7dfbe752e33b85b33774e9e2b3779f16791fb1c749".into(),
            start: Some(27_530),
            bitwork: Some("20".into()),
        }
    }

    fn mint() -> MintRecord {
        MintRecord {
            tick: "NOTE".into(),
            amt: 5_000,
        }
    }

    #[test]
    fn test_mint_call_data() {
        let call = CallData::for_mint(&deploy(), &mint(), 30_000, "0200aa");

        let m = call.method(MINT_METHOD).unwrap();
        assert_eq!(m.get("p").and_then(NoteValue::as_str), Some("6e3230"));
        assert_eq!(m.get("op").and_then(NoteValue::as_str), Some("6d696e74"));
        assert_eq!(m.get("tick").and_then(NoteValue::as_str), Some("4e4f5445"));
        assert_eq!(m.get("amt").and_then(NoteValue::as_int), Some(5_000));
        assert_eq!(m.get("max").and_then(NoteValue::as_int), Some(21_000_000));
        assert_eq!(m.get("height").and_then(NoteValue::as_int), Some(30_000));
        assert_eq!(m.get("total").and_then(NoteValue::as_int), Some(0));
        assert_eq!(m.get("tx").and_then(NoteValue::as_str), Some("0200aa"));
        assert_eq!(m.get("bitwork").and_then(NoteValue::as_str), Some("3230"));

        let c = call.method("constructor").unwrap();
        assert_eq!(c.get("op").and_then(NoteValue::as_str), Some("6465706c6f79"));
        assert!(c.get("height").is_none());

        let t = call.method("transfer").unwrap();
        assert_eq!(t.as_map().map(|m| m.len()), Some(1));
        assert_eq!(t.get("tick").and_then(NoteValue::as_str), Some("4e4f5445"));

        assert!(call.method("burn").is_none());
        assert!(call.to_value().get("mint").is_some());
    }

    #[test]
    fn test_call_data_is_fresh_per_attempt() {
        let a = CallData::for_mint(&deploy(), &mint(), 30_000, "00");
        let b = CallData::for_mint(&deploy(), &mint(), 30_000, "01");
        assert_ne!(a, b);
        assert_eq!(a.method("constructor"), b.method("constructor"));
    }
}
