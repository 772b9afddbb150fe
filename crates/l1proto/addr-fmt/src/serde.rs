use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Serialize};

use crate::types::{AddressType, SCRIPT_HASH_LEN, ScriptHash};

impl Serialize for AddressType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AddressType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct StrVisitor;

        impl de::Visitor<'_> for StrVisitor {
            type Value = AddressType;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "an address type name such as \"P2TR-NOTE\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<AddressType, E> {
                AddressType::from_str(v).map_err(E::custom)
            }
        }

        d.deserialize_str(StrVisitor)
    }
}

impl Serialize for ScriptHash {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.serialize_str(&self.to_string())
        } else {
            s.serialize_bytes(self.as_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for ScriptHash {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        if d.is_human_readable() {
            struct StrVisitor;

            impl de::Visitor<'_> for StrVisitor {
                type Value = ScriptHash;

                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "a {}-char hex string", SCRIPT_HASH_LEN * 2)
                }

                fn visit_str<E: de::Error>(self, v: &str) -> Result<ScriptHash, E> {
                    ScriptHash::from_str(v).map_err(E::custom)
                }
            }

            d.deserialize_str(StrVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> de::Visitor<'de> for BytesVisitor {
                type Value = ScriptHash;

                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{SCRIPT_HASH_LEN} bytes")
                }

                fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<ScriptHash, E> {
                    let bytes: [u8; SCRIPT_HASH_LEN] = v
                        .try_into()
                        .map_err(|_| E::invalid_length(v.len(), &self))?;
                    Ok(ScriptHash::new(bytes))
                }
            }

            d.deserialize_bytes(BytesVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::ScriptBuf;

    use super::*;

    #[test]
    fn test_address_type_json() {
        let json = serde_json::to_string(&AddressType::TaprootCommitData).unwrap();
        assert_eq!(json, "\"P2TR-COMMIT-DATA\"");
        let back: AddressType = serde_json::from_str("\"P2WPKH\"").unwrap();
        assert_eq!(back, AddressType::WitnessKeyHash);
        assert!(serde_json::from_str::<AddressType>("\"P2XX\"").is_err());
    }

    #[test]
    fn test_script_hash_json() {
        let hash = ScriptHash::from_script(&ScriptBuf::from_bytes(vec![0x51]));
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{hash}\""));
        let back: ScriptHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_script_hash_invalid_length() {
        let result: Result<ScriptHash, _> = serde_json::from_str("\"abcd\"");
        assert!(result.is_err());
    }
}
