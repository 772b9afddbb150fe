//! Engine and mining configuration.

use bitcoin::Network;
use note_addr_fmt::AddressType;
use note_msg_fmt::{PayloadOptions, SegmentMode};
use note_tx_builder::MAX_LOCKTIME;
use serde::{Deserialize, Serialize};

use crate::{chain::FeeTier, records::DeployRecord, retry::RetryPolicy};

/// Settings of a [`ProtocolEngine`](crate::ProtocolEngine).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Network addresses are generated for.
    pub network: Network,

    /// Fee rate tier to pay.
    pub fee_tier: FeeTier,

    /// Let payloads over the stack tier use 520-byte segments.
    pub allow_script_tier: bool,

    /// Address type holding plain funds and change.
    pub main_address_type: AddressType,

    /// Address type holding token outputs.
    pub token_address_type: AddressType,

    /// Polling for freshly funded outputs.
    pub poll: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            fee_tier: FeeTier::Avg,
            allow_script_tier: false,
            main_address_type: AddressType::WitnessKeyHash,
            token_address_type: AddressType::TaprootNote,
            poll: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Gets the payload encoding options.
    pub fn payload_options(&self) -> PayloadOptions {
        PayloadOptions {
            mode: SegmentMode::Split,
            allow_script_tier: self.allow_script_tier,
        }
    }
}

/// Settings of a proof-of-work mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowMintConfig {
    /// Hex prefix the transaction hash must start with.
    pub bitwork: String,

    /// Height from which mining is allowed.
    pub start_height: u64,

    /// First nonce tried.
    pub start_nonce: u32,

    /// Nonce ceiling, exclusive.
    pub max_nonce: u32,
}

impl Default for PowMintConfig {
    fn default() -> Self {
        Self {
            bitwork: String::new(),
            start_height: 0,
            start_nonce: 0,
            max_nonce: MAX_LOCKTIME,
        }
    }
}

impl PowMintConfig {
    /// Takes target and activation height from a deploy record.
    pub fn from_deploy(deploy: &DeployRecord) -> Self {
        Self {
            bitwork: deploy.bitwork_hex().unwrap_or_default(),
            start_height: deploy.start.unwrap_or(0),
            ..Self::default()
        }
    }
}
