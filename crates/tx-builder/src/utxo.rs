//! Spendable outputs as reported by the chain service.

use bitcoin::{Amount, OutPoint, ScriptBuf, Txid, secp256k1::SecretKey};
use note_addr_fmt::{AddressType, ScriptHash};
use serde::{Deserialize, Serialize};

/// An unspent output.
///
/// Comes from the chain service without a signing key and usually without a
/// type. Callers stamp both before handing it to the builder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    /// Funding transaction id.
    pub tx_id: Txid,

    /// Output index within the funding transaction.
    pub output_index: u32,

    /// Value in satoshis.
    pub satoshis: u64,

    /// Locking script.
    pub script: ScriptBuf,

    /// Chain service index key of the locking script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_hash: Option<ScriptHash>,

    /// Spend type, which selects the input construction branch.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<AddressType>,

    /// Key that signs this input instead of the primary key.
    #[serde(skip)]
    pub signer: Option<SecretKey>,
}

impl Utxo {
    /// Constructs a new instance without type or key.
    pub fn new(tx_id: Txid, output_index: u32, satoshis: u64, script: ScriptBuf) -> Self {
        let script_hash = Some(ScriptHash::from_script(&script));
        Self {
            tx_id,
            output_index,
            satoshis,
            script,
            script_hash,
            address_type: None,
            signer: None,
        }
    }

    /// Stamps the address type.
    pub fn with_type(mut self, address_type: AddressType) -> Self {
        self.address_type = Some(address_type);
        self
    }

    /// Stamps the key that signs this input.
    pub fn with_signer(mut self, signer: SecretKey) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Gets the outpoint being spent.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_id, self.output_index)
    }

    /// Gets the value.
    pub fn amount(&self) -> Amount {
        Amount::from_sat(self.satoshis)
    }
}

/// Sums the values of a set of outputs, or `None` if the sum overflows.
pub fn total_satoshis<'a>(utxos: impl IntoIterator<Item = &'a Utxo>) -> Option<u64> {
    utxos
        .into_iter()
        .try_fold(0u64, |acc, u| acc.checked_add(u.satoshis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_service_json() {
        let json = r#"{
            "txId": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "outputIndex": 1,
            "satoshis": 10000,
            "script": "0014751e76e8199196d454941c45d1b3a323f1433bd6",
            "type": "P2WPKH"
        }"#;
        let utxo: Utxo = serde_json::from_str(json).unwrap();
        assert_eq!(utxo.output_index, 1);
        assert_eq!(utxo.satoshis, 10000);
        assert!(utxo.script.is_p2wpkh());
        assert_eq!(utxo.address_type, Some(AddressType::WitnessKeyHash));
        assert_eq!(utxo.script_hash, None);
        assert!(utxo.signer.is_none());
        assert_eq!(utxo.outpoint().vout, 1);
    }

    #[test]
    fn test_untyped_utxo() {
        let json = r#"{
            "txId": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "outputIndex": 0,
            "satoshis": 546,
            "script": "51"
        }"#;
        let utxo: Utxo = serde_json::from_str(json).unwrap();
        assert_eq!(utxo.address_type, None);
        let stamped = utxo.with_type(AddressType::TaprootNote);
        assert_eq!(stamped.address_type, Some(AddressType::TaprootNote));
    }

    #[test]
    fn test_total() {
        let txid: Txid = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
            .parse()
            .unwrap();
        let a = Utxo::new(txid, 0, 600, ScriptBuf::new());
        let b = Utxo::new(txid, 1, 400, ScriptBuf::new());
        assert_eq!(total_satoshis([&a, &b]), Some(1000));

        let huge = Utxo::new(txid, 2, u64::MAX, ScriptBuf::new());
        assert_eq!(total_satoshis([&a, &huge]), None);
    }
}
