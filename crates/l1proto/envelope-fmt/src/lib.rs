//! NOTE protocol locking-script utilities.
//!
//! This crate builds and parses the tapscript leaves that carry NOTE protocol
//! data. Every leaf starts with the 4-byte protocol tag (ASCII `NOTE`) and ends
//! with a public key check.
//!
//! # Mint grammar
//!
//! The payload is supplied at spend time as five witness items that sit below
//! the tag and get dropped, so the script itself carries no data:
//! ```text
//! <tag> OP_2DROP OP_2DROP OP_2DROP <xonly_pubkey> OP_CHECKSIG
//! ```
//!
//! # Commit grammar
//!
//! The payload is baked into the script inside an envelope that is never
//! executed. Chunks are at most 520 bytes each:
//! ```text
//! <tag> OP_FALSE OP_IF <chunk_0> ... <chunk_n> OP_ENDIF OP_2DROP OP_2DROP OP_2DROP <xonly_pubkey> OP_CHECKSIG
//! <tag> OP_FALSE OP_IF <chunk_0> ... <chunk_n> OP_ENDIF OP_DROP <xonly_pubkey> OP_CHECKSIG
//! ```
//!
//! The first form is the commit-note leaf, the second the commit-data leaf.
//!
//! # Examples
//!
//! ```
//! use bitcoin::{XOnlyPublicKey, secp256k1::{Secp256k1, SecretKey}};
//! use note_envelope_fmt::{builder::build_commit_data_script, parser::parse_note_script};
//!
//! let secp = Secp256k1::new();
//! let sk = SecretKey::from_slice(&[0x11; 32]).unwrap();
//! let (xonly, _) = sk.x_only_public_key(&secp);
//!
//! let script = build_commit_data_script(&xonly, &[1, 2, 3, 4, 5]).unwrap();
//! let parsed = parse_note_script(&script).unwrap();
//! assert_eq!(parsed.data(), Some(&[1u8, 2, 3, 4, 5][..]));
//! ```

/// NOTE leaf script builders.
pub mod builder;

/// Consensus and protocol size limits.
pub mod constants;

/// Error types for envelope operations.
pub mod errors;

/// NOTE leaf script parser.
pub mod parser;

mod tag;

pub use tag::{InvalidProtocolTag, NOTE_TAG, PROTOCOL_TAG_LEN, ProtocolTag};
