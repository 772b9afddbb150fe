/// Consensus limit on a single pushed script element.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Largest witness stack item relayed by standard policy.
pub const MAX_STANDARD_STACK_ITEM_SIZE: usize = 80;

/// Number of payload segments a mint spend carries in its witness.
pub const MAX_DATA_SEGMENTS: usize = 5;

/// Ceiling on the number of chunks embedded in a commit envelope.
pub const MAX_DATA_SEGMENTS_LIMIT: usize = 190;

/// Payload ceiling for the stack tier (5 x 80).
pub const MAX_STACK_FULL_SIZE: usize = MAX_STANDARD_STACK_ITEM_SIZE * MAX_DATA_SEGMENTS;

/// Payload ceiling for the script-element tier (5 x 520).
pub const MAX_SCRIPT_FULL_SIZE: usize = MAX_SCRIPT_ELEMENT_SIZE * MAX_DATA_SEGMENTS;

/// Payload ceiling for commit envelopes (190 x 520).
pub const MAX_COMMIT_FULL_SIZE: usize = MAX_SCRIPT_ELEMENT_SIZE * MAX_DATA_SEGMENTS_LIMIT;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ceilings() {
        assert_eq!(MAX_STACK_FULL_SIZE, 400);
        assert_eq!(MAX_SCRIPT_FULL_SIZE, 2600);
        assert_eq!(MAX_COMMIT_FULL_SIZE, 98_800);
    }
}
