use alloy_primitives::B256;
use alloy_rpc_types_engine::ForkchoiceState as AlloyForkchoiceState;

/// The fork choice state sent to the execution engine.
///
/// The driver always moves the `head`, while `safe` and `finalized` are only moved to the latest
/// block verified by the protocol; `None` leaves them untouched.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ForkchoiceState {
    head: B256,
    safe: Option<B256>,
    finalized: Option<B256>,
}

impl ForkchoiceState {
    /// Creates a new [`ForkchoiceState`] instance.
    pub const fn new(head: B256, safe: Option<B256>, finalized: Option<B256>) -> Self {
        Self { head, safe, finalized }
    }

    /// Creates a [`ForkchoiceState`] only moving the head.
    pub const fn head_only(head: B256) -> Self {
        Self::new(head, None, None)
    }

    /// Creates a [`ForkchoiceState`] moving the head, and the safe and finalized blocks to the
    /// provided verified block hash.
    pub const fn with_verified(head: B256, verified: Option<B256>) -> Self {
        Self::new(head, verified, verified)
    }

    /// Returns the `head` block hash.
    pub const fn head(&self) -> B256 {
        self.head
    }

    /// Returns the `safe` block hash.
    pub const fn safe(&self) -> Option<B256> {
        self.safe
    }

    /// Returns the `finalized` block hash.
    pub const fn finalized(&self) -> Option<B256> {
        self.finalized
    }

    /// Returns the [`AlloyForkchoiceState`] representation of the fork choice state, the zero
    /// hash standing for an unset block.
    pub fn get_alloy_fcs(&self) -> AlloyForkchoiceState {
        AlloyForkchoiceState {
            head_block_hash: self.head,
            safe_block_hash: self.safe.unwrap_or_default(),
            finalized_block_hash: self.finalized.unwrap_or_default(),
        }
    }
}

impl From<ForkchoiceState> for AlloyForkchoiceState {
    fn from(value: ForkchoiceState) -> Self {
        value.get_alloy_fcs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_blocks_map_to_zero_hash() {
        let head = B256::repeat_byte(1);

        let fcs = ForkchoiceState::head_only(head).get_alloy_fcs();

        assert_eq!(fcs.head_block_hash, head);
        assert_eq!(fcs.safe_block_hash, B256::ZERO);
        assert_eq!(fcs.finalized_block_hash, B256::ZERO);
    }

    #[test]
    fn test_verified_sets_safe_and_finalized() {
        let verified = B256::repeat_byte(2);

        let fcs: AlloyForkchoiceState =
            ForkchoiceState::with_verified(B256::repeat_byte(1), Some(verified)).into();

        assert_eq!(fcs.safe_block_hash, verified);
        assert_eq!(fcs.finalized_block_hash, verified);
    }
}
