use super::{BaseFeeConfig, ITaikoAnchor};
use alloy_primitives::{Bytes, B256};
use alloy_sol_types::SolCall;

/// Returns the calldata of an Ontake-era `anchor` transaction.
pub fn anchor_v1_input(
    l1_block_hash: B256,
    l1_state_root: B256,
    l1_block_id: u64,
    parent_gas_used: u32,
) -> Bytes {
    ITaikoAnchor::anchorCall {
        l1BlockHash: l1_block_hash,
        l1StateRoot: l1_state_root,
        l1BlockId: l1_block_id,
        parentGasUsed: parent_gas_used,
    }
    .abi_encode()
    .into()
}

/// Returns the calldata of an Ontake `anchorV2` transaction.
pub fn anchor_v2_input(
    anchor_block_id: u64,
    anchor_state_root: B256,
    parent_gas_used: u32,
    base_fee_config: BaseFeeConfig,
) -> Bytes {
    ITaikoAnchor::anchorV2Call {
        anchorBlockId: anchor_block_id,
        anchorStateRoot: anchor_state_root,
        parentGasUsed: parent_gas_used,
        baseFeeConfig: base_fee_config,
    }
    .abi_encode()
    .into()
}

/// Returns the calldata of a Pacaya `anchorV3` transaction.
pub fn anchor_v3_input(
    anchor_block_id: u64,
    anchor_state_root: B256,
    parent_gas_used: u32,
    base_fee_config: BaseFeeConfig,
    signal_slots: Vec<B256>,
) -> Bytes {
    ITaikoAnchor::anchorV3Call {
        anchorBlockId: anchor_block_id,
        anchorStateRoot: anchor_state_root,
        parentGasUsed: parent_gas_used,
        baseFeeConfig: base_fee_config,
        signalSlots: signal_slots,
    }
    .abi_encode()
    .into()
}

/// A decoded call to the anchor contract, of any version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorCall {
    /// A call to `anchor`.
    V1(ITaikoAnchor::anchorCall),
    /// A call to `anchorV2`.
    V2(ITaikoAnchor::anchorV2Call),
    /// A call to `anchorV3`.
    V3(ITaikoAnchor::anchorV3Call),
}

impl AnchorCall {
    /// Tries to decode the input of an anchor transaction.
    pub fn try_decode(input: &[u8]) -> Option<Self> {
        let selector: [u8; 4] = input.get(0..4)?.try_into().ok()?;
        match selector {
            ITaikoAnchor::anchorCall::SELECTOR => {
                ITaikoAnchor::anchorCall::abi_decode(input).map(Self::V1).ok()
            }
            ITaikoAnchor::anchorV2Call::SELECTOR => {
                ITaikoAnchor::anchorV2Call::abi_decode(input).map(Self::V2).ok()
            }
            ITaikoAnchor::anchorV3Call::SELECTOR => {
                ITaikoAnchor::anchorV3Call::abi_decode(input).map(Self::V3).ok()
            }
            _ => None,
        }
    }

    /// Returns the anchored L1 block id.
    pub const fn anchor_block_id(&self) -> u64 {
        match self {
            Self::V1(call) => call.l1BlockId,
            Self::V2(call) => call.anchorBlockId,
            Self::V3(call) => call.anchorBlockId,
        }
    }

    /// Returns the anchored L1 state root.
    pub const fn anchor_state_root(&self) -> B256 {
        match self {
            Self::V1(call) => call.l1StateRoot,
            Self::V2(call) => call.anchorStateRoot,
            Self::V3(call) => call.anchorStateRoot,
        }
    }

    /// Returns the gas used by the parent block.
    pub const fn parent_gas_used(&self) -> u32 {
        match self {
            Self::V1(call) => call.parentGasUsed,
            Self::V2(call) => call.parentGasUsed,
            Self::V3(call) => call.parentGasUsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_decode_anchor_calls() {
        let root = B256::repeat_byte(0x11);
        let config = BaseFeeConfig { adjustmentQuotient: 8, sharingPctg: 75, ..Default::default() };

        let v1 = AnchorCall::try_decode(&anchor_v1_input(B256::ZERO, root, 10, 21_000)).unwrap();
        let v2 = AnchorCall::try_decode(&anchor_v2_input(11, root, 22_000, config.clone())).unwrap();
        let v3 = AnchorCall::try_decode(&anchor_v3_input(12, root, 23_000, config, vec![root]))
            .unwrap();

        assert_eq!((v1.anchor_block_id(), v1.parent_gas_used()), (10, 21_000));
        assert_eq!((v2.anchor_block_id(), v2.parent_gas_used()), (11, 22_000));
        assert_eq!((v3.anchor_block_id(), v3.parent_gas_used()), (12, 23_000));
        assert!(matches!(v3, AnchorCall::V3(ref call) if call.signalSlots == vec![root]));
        assert_eq!(v2.anchor_state_root(), root);
    }

    #[test]
    fn test_should_not_decode_unknown_selector() {
        assert!(AnchorCall::try_decode(&[0xde, 0xad, 0xbe, 0xef]).is_none());
        assert!(AnchorCall::try_decode(&[0xde]).is_none());
    }
}
