//! N20 token operations as payload values.

use note_msg_fmt::NoteValue;
use serde::{Deserialize, Serialize};

/// Protocol name every record carries in `p`.
pub const N20_PROTOCOL: &str = "n20";

/// Hex of the UTF-8 bytes of `s`, the form text fields take in contract call
/// data.
pub fn text_to_hex(s: &str) -> String {
    hex::encode(s.as_bytes())
}

/// Deploys a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRecord {
    /// Ticker.
    pub tick: String,

    /// Total supply.
    pub max: u64,

    /// Per-mint limit.
    pub lim: u64,

    /// Decimal places.
    pub dec: u8,

    /// Hash of the contract the token is bound to.
    pub sch: String,

    /// Activation height of proof-of-work minting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,

    /// Text whose UTF-8 hex a mint transaction hash must start with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitwork: Option<String>,
}

impl DeployRecord {
    /// Gets the hash prefix a proof-of-work mint must hit.
    pub fn bitwork_hex(&self) -> Option<String> {
        self.bitwork.as_deref().map(text_to_hex)
    }

    /// Builds the payload value.
    pub fn to_value(&self) -> NoteValue {
        let mut entries = vec![
            ("p", NoteValue::from(N20_PROTOCOL)),
            ("op", "deploy".into()),
            ("tick", self.tick.as_str().into()),
            ("max", self.max.into()),
            ("lim", self.lim.into()),
            ("dec", self.dec.into()),
            ("sch", self.sch.as_str().into()),
        ];
        if let Some(start) = self.start {
            entries.push(("start", start.into()));
        }
        if let Some(bitwork) = self.bitwork_hex() {
            entries.push(("bitwork", bitwork.into()));
        }
        NoteValue::map(entries)
    }
}

/// Mints an amount of a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRecord {
    /// Ticker.
    pub tick: String,

    /// Amount minted.
    pub amt: u64,
}

impl MintRecord {
    /// Builds the payload value.
    pub fn to_value(&self) -> NoteValue {
        NoteValue::map([
            ("p", NoteValue::from(N20_PROTOCOL)),
            ("op", "mint".into()),
            ("tick", self.tick.as_str().into()),
            ("amt", self.amt.into()),
        ])
    }
}

/// Amount field of a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransferAmount {
    /// One recipient.
    Single(u64),
    /// One amount per recipient, in output order.
    Multi(Vec<u64>),
}

impl TransferAmount {
    /// Sums the amounts, or `None` if the sum overflows.
    pub fn total(&self) -> Option<u64> {
        match self {
            TransferAmount::Single(a) => Some(*a),
            TransferAmount::Multi(v) => v.iter().try_fold(0u64, |acc, a| acc.checked_add(*a)),
        }
    }
}

/// Moves token balance to other outputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Ticker.
    pub tick: String,

    /// Amounts moved.
    pub amt: TransferAmount,
}

impl TransferRecord {
    /// Builds the payload value.
    pub fn to_value(&self) -> NoteValue {
        let amt = match &self.amt {
            TransferAmount::Single(a) => NoteValue::from(*a),
            TransferAmount::Multi(v) => NoteValue::from(v.clone()),
        };
        NoteValue::map([
            ("p", NoteValue::from(N20_PROTOCOL)),
            ("op", "transfer".into()),
            ("tick", self.tick.as_str().into()),
            ("amt", amt),
        ])
    }
}

#[cfg(test)]
mod tests {
    use note_msg_fmt::{NotePayload, PayloadOptions};

    use super::*;

    fn pow_deploy() -> DeployRecord {
        DeployRecord {
            tick: "POW#2".into(),
            max: 2_100 * 10_000 * 100_000_000,
            lim: 5_000 * 100_000_000,
            dec: 8,
            sch: "32cc76a2665d7205f7595a3bd614ed37".into(),
            start: Some(51_605),
            bitwork: Some("20".into()),
        }
    }

    #[test]
    fn test_text_to_hex() {
        assert_eq!(text_to_hex("n20"), "6e3230");
        assert_eq!(text_to_hex("20"), "3230");
        assert_eq!(text_to_hex(""), "");
    }

    #[test]
    fn test_deploy_value() {
        let value = pow_deploy().to_value();
        assert_eq!(value.get("op").and_then(NoteValue::as_str), Some("deploy"));
        assert_eq!(value.get("bitwork").and_then(NoteValue::as_str), Some("3230"));
        assert_eq!(value.get("start").and_then(NoteValue::as_int), Some(51_605));
        assert_eq!(
            value.get("max").and_then(NoteValue::as_int),
            Some(2_100_000_000_000_000)
        );

        let mut plain = pow_deploy();
        plain.start = None;
        plain.bitwork = None;
        let value = plain.to_value();
        assert!(value.get("start").is_none());
        assert!(value.get("bitwork").is_none());
    }

    #[test]
    fn test_records_fit_stack_tier() {
        let values = [
            pow_deploy().to_value(),
            MintRecord {
                tick: "POW#2".into(),
                amt: 500_000_000_000,
            }
            .to_value(),
            TransferRecord {
                tick: "POW#2".into(),
                amt: TransferAmount::Multi(vec![1, 2, 3]),
            }
            .to_value(),
        ];
        for value in values {
            let payload = NotePayload::from_value(&value, PayloadOptions::default()).unwrap();
            assert_eq!(payload.decode().unwrap(), Some(value));
        }
    }

    #[test]
    fn test_transfer_amount_json() {
        let single: TransferRecord = serde_json::from_str(r#"{"tick":"T","amt":5}"#).unwrap();
        assert_eq!(single.amt, TransferAmount::Single(5));
        let multi: TransferRecord = serde_json::from_str(r#"{"tick":"T","amt":[5,6]}"#).unwrap();
        assert_eq!(multi.amt.total(), Some(11));
        assert_eq!(TransferAmount::Multi(vec![u64::MAX, 1]).total(), None);
    }
}
