/// Smallest output value the network relays, and the value of token outputs.
pub const DUST_LIMIT: u64 = 546;

/// Sequence of every input. No relative timelocks are used.
pub const MAX_SEQUENCE: u32 = 0xffff_ffff;

/// Upper bound of the locktime field, which doubles as the mining nonce.
pub const MAX_LOCKTIME: u32 = 0xffff_ffff;

/// Placeholder fee for the first, size-measuring build pass.
pub const ESTIMATE_FEE: u64 = 1000;

/// Transaction version.
pub const TX_VERSION: i32 = 2;

/// Computes the fee for a transaction of `vsize` at `fee_per_kb` sat/kvB.
///
/// The extra satoshi keeps the rebuilt transaction from underpaying when its
/// size drifts by a byte.
pub fn fee_for_vsize(vsize: u64, fee_per_kb: u64) -> u64 {
    vsize.saturating_mul(fee_per_kb) / 1000 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_for_vsize() {
        let cases = [(0, 1000, 1), (250, 1000, 251), (141, 2500, 353), (200, 0, 1)];
        for (vsize, rate, expected) in cases {
            assert_eq!(fee_for_vsize(vsize, rate), expected, "{vsize} @ {rate}");
        }
    }
}
