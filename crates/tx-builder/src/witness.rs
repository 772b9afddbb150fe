//! Witness stacks for NOTE script-path spends.

use bitcoin::{Witness, consensus, taproot};
use note_addr_fmt::TapLeaf;

/// Serializes a witness stack in its consensus encoding: a count-prefixed
/// vector of count-prefixed items.
pub fn serialize_witness_stack<T: AsRef<[u8]>>(items: &[T]) -> Vec<u8> {
    consensus::serialize(&Witness::from_slice(items))
}

/// Assembles the witness of a NOTE leaf spend.
///
/// The order is signature, then `segments`, then the leaf script and its
/// control block. Leaves that only drop the tag take no segments.
pub(crate) fn note_leaf_witness(
    signature: &taproot::Signature,
    segments: &[Vec<u8>],
    leaf: &TapLeaf,
) -> Witness {
    let mut witness = Witness::new();
    witness.push(signature.to_vec());
    for segment in segments {
        witness.push(segment);
    }
    witness.push(leaf.script().as_bytes());
    witness.push(leaf.control_block().serialize());
    witness
}
