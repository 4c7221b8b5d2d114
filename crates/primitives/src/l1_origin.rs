use alloy_primitives::{FixedBytes, B256, B64};
use alloy_rpc_types_engine::PayloadId;
use serde::{Deserialize, Serialize};

/// The record linking an L2 block to the L1 proposal it was derived from. It is persisted by the
/// execution engine and read back through the `taiko_*` RPC namespace.
///
/// `l2_block_hash` is unknown until the execution engine inserted the block, and blocks that were
/// built from a preconfirmation have no L1 height or hash yet.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Origin {
    /// The L2 block number.
    #[serde(rename = "blockID", with = "alloy_serde::quantity")]
    pub block_id: u64,
    /// The L2 block hash.
    #[serde(rename = "l2BlockHash", default, skip_serializing_if = "Option::is_none")]
    pub l2_block_hash: Option<B256>,
    /// The height of the L1 block which emitted the proposal.
    #[serde(
        rename = "l1BlockHeight",
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub l1_block_height: Option<u64>,
    /// The hash of the L1 block which emitted the proposal.
    #[serde(rename = "l1BlockHash", default, skip_serializing_if = "Option::is_none")]
    pub l1_block_hash: Option<B256>,
    /// The id of the payload build arguments the block was built with.
    #[serde(rename = "buildPayloadArgsID", default)]
    pub build_payload_args_id: B64,
    /// Marks the last block of a batch.
    #[serde(default)]
    pub end_of_block: bool,
    /// Marks the last block of a preconfirmation period.
    #[serde(default)]
    pub end_of_preconf: bool,
    /// The batch the block belongs to.
    #[serde(
        rename = "batchID",
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub batch_id: Option<u64>,
    /// Whether the block is a forced inclusion.
    #[serde(default)]
    pub is_forced_inclusion: bool,
    /// The preconfirmation signature, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<FixedBytes<65>>,
}

impl L1Origin {
    /// Returns a new [`L1Origin`] for a block derived from the given L1 block.
    pub fn new(block_id: u64, l1_block_height: u64, l1_block_hash: B256) -> Self {
        Self {
            block_id,
            l1_block_height: Some(l1_block_height),
            l1_block_hash: Some(l1_block_hash),
            ..Default::default()
        }
    }

    /// Returns a new [`L1Origin`] for a preconfirmation block.
    pub fn preconf(block_id: u64) -> Self {
        Self { block_id, ..Default::default() }
    }

    /// Returns true if the block was built from a preconfirmation and was not yet derived from L1.
    pub const fn is_preconf_block(&self) -> bool {
        self.l1_block_height.is_none()
    }

    /// Sets the payload build arguments id.
    pub const fn with_payload_id(mut self, id: PayloadId) -> Self {
        self.build_payload_args_id = id.0;
        self
    }

    /// Returns the payload build arguments id, if one was recorded.
    pub fn payload_id(&self) -> Option<PayloadId> {
        (self.build_payload_args_id != B64::ZERO).then_some(PayloadId(self.build_payload_args_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_camel_case_quantities() {
        let origin = L1Origin {
            l2_block_hash: Some(B256::repeat_byte(2)),
            batch_id: Some(3),
            ..L1Origin::new(16, 255, B256::repeat_byte(1))
        };

        let json = serde_json::to_value(&origin).unwrap();

        assert_eq!(json["blockID"], "0x10");
        assert_eq!(json["l1BlockHeight"], "0xff");
        assert_eq!(json["batchID"], "0x3");
        assert_eq!(json["endOfBlock"], false);
        let decoded: L1Origin = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, origin);
    }

    #[test]
    fn test_preconf_origin_has_no_l1_height() {
        let origin: L1Origin =
            serde_json::from_str(r#"{"blockID":"0x5","buildPayloadArgsID":"0x0000000000000001"}"#)
                .unwrap();

        assert!(origin.is_preconf_block());
        assert!(origin.l2_block_hash.is_none());
        assert_eq!(origin.payload_id(), Some(PayloadId::new([0, 0, 0, 0, 0, 0, 0, 1])));
    }
}
