//! Addresses, locking scripts and chain service index keys for every spend
//! type the NOTE engine handles, including the 2-leaf Taproot trees that wrap
//! NOTE leaf scripts.

mod address;
mod error;
mod serde;
mod tree;
mod types;

pub use address::{AddressConfig, AddressInfo};
pub use error::{AddrFmtError, AddrFmtResult};
pub use tree::{LeafPath, NoteTaprootTree, TapLeaf};
pub use types::{AddressType, SCRIPT_HASH_LEN, ScriptHash};
