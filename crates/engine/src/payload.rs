//! Taiko flavoured types of the engine API.

use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rpc_types_engine::{ExecutionPayloadInputV2, ExecutionPayloadV1, PayloadId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use taiko_primitives::{BlockInfo, L1Origin};

/// The version byte of the payload ids built through `engine_forkchoiceUpdatedV2`.
pub const PAYLOAD_VERSION_V2: u8 = 2;

/// The block metadata embedded in the [`TaikoPayloadAttributes`], instructing the execution engine
/// which block to build instead of picking transactions from its pool.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMetadata {
    /// The block beneficiary.
    pub beneficiary: Address,
    /// The block gas limit, anchor gas included.
    #[serde(with = "alloy_serde::quantity")]
    pub gas_limit: u64,
    /// The block timestamp.
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// The RLP encoded transactions of the block, anchor transaction first.
    pub tx_list: Bytes,
    /// The block mix hash.
    pub mix_hash: B256,
    /// The block extra data.
    pub extra_data: Bytes,
    /// The batch the block belongs to.
    #[serde(
        rename = "batchID",
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub batch_id: Option<u64>,
}

/// The payload attributes of `engine_forkchoiceUpdatedV2`, extended with the Taiko block
/// metadata, base fee and L1 origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaikoPayloadAttributes {
    /// The block timestamp.
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// The block difficulty.
    pub prev_randao: B256,
    /// The fee recipient.
    pub suggested_fee_recipient: Address,
    /// The withdrawals, always empty on Taiko.
    pub withdrawals: Vec<Withdrawal>,
    /// The base fee of the block.
    pub base_fee_per_gas: U256,
    /// The block metadata.
    pub block_metadata: BlockMetadata,
    /// The L1 origin the engine persists along the block.
    pub l1_origin: L1Origin,
}

/// An execution payload as returned by `engine_getPayloadV2` on a Taiko execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaikoExecutionPayload {
    /// The inner payload.
    #[serde(flatten)]
    pub payload_inner: ExecutionPayloadV1,
    /// The withdrawals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// The transactions root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    /// The withdrawals root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_hash: Option<B256>,
    /// Marks a payload the engine built from Taiko block metadata.
    #[serde(default)]
    pub taiko_block: bool,
}

impl TaikoExecutionPayload {
    /// Returns the block hash.
    pub const fn block_hash(&self) -> B256 {
        self.payload_inner.block_hash
    }

    /// Returns the block number.
    pub const fn block_number(&self) -> u64 {
        self.payload_inner.block_number
    }

    /// Returns the parent hash.
    pub const fn parent_hash(&self) -> B256 {
        self.payload_inner.parent_hash
    }

    /// Returns the [`BlockInfo`] of the payload.
    pub const fn block_info(&self) -> BlockInfo {
        BlockInfo::new(self.payload_inner.block_number, self.payload_inner.block_hash)
    }
}

impl From<ExecutionPayloadInputV2> for TaikoExecutionPayload {
    fn from(value: ExecutionPayloadInputV2) -> Self {
        Self {
            payload_inner: value.execution_payload,
            withdrawals: value.withdrawals,
            tx_hash: None,
            withdrawals_hash: None,
            taiko_block: false,
        }
    }
}

/// The response of `engine_getPayloadV2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaikoExecutionPayloadEnvelope {
    /// The built payload.
    pub execution_payload: TaikoExecutionPayload,
    /// The fees collected by the block.
    #[serde(default)]
    pub block_value: U256,
}

/// The arguments the execution engine derives the payload id from. The driver computes the same
/// id to record it in the [`L1Origin`] of the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPayloadArgs {
    /// The parent block hash.
    pub parent: B256,
    /// The block timestamp.
    pub timestamp: u64,
    /// The fee recipient.
    pub fee_recipient: Address,
    /// The block difficulty.
    pub random: B256,
    /// The withdrawals.
    pub withdrawals: Vec<Withdrawal>,
    /// The keccak hash of the RLP encoded transaction list.
    pub tx_list_hash: B256,
    /// The payload version.
    pub version: u8,
}

impl BuildPayloadArgs {
    /// Returns the payload id: the first 8 bytes of the sha256 digest of the arguments, the first
    /// byte replaced by the payload version.
    pub fn id(&self) -> PayloadId {
        let mut withdrawals = Vec::new();
        alloy_rlp::encode_list::<_, Withdrawal>(&self.withdrawals, &mut withdrawals);

        let mut hasher = Sha256::new();
        hasher.update(self.parent);
        hasher.update(self.timestamp.to_be_bytes());
        hasher.update(self.random);
        hasher.update(self.fee_recipient);
        hasher.update(&withdrawals);
        hasher.update(self.tx_list_hash);
        let digest = hasher.finalize();

        let mut id = [0u8; 8];
        id.copy_from_slice(&digest[..8]);
        id[0] = self.version;
        PayloadId::new(id)
    }
}

/// Everything needed to build an L2 block through the execution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBuildParams {
    /// The parent block.
    pub parent: BlockInfo,
    /// The block timestamp.
    pub timestamp: u64,
    /// The block difficulty, also used as mix hash.
    pub difficulty: B256,
    /// The fee recipient.
    pub fee_recipient: Address,
    /// The gas limit, anchor gas included.
    pub gas_limit: u64,
    /// The base fee.
    pub base_fee: U256,
    /// The extra data.
    pub extra_data: Bytes,
    /// The L1 origin of the block.
    pub l1_origin: L1Origin,
    /// The batch the block belongs to, for Pacaya blocks.
    pub batch_id: Option<u64>,
    /// The RLP encoded transaction list, anchor transaction first.
    pub tx_list: Bytes,
}

impl BlockBuildParams {
    /// Returns the id of the block.
    pub const fn block_id(&self) -> u64 {
        self.l1_origin.block_id
    }

    /// Returns the [`BuildPayloadArgs`] of the block.
    pub fn build_payload_args(&self) -> BuildPayloadArgs {
        BuildPayloadArgs {
            parent: self.parent.hash,
            timestamp: self.timestamp,
            fee_recipient: self.fee_recipient,
            random: self.difficulty,
            withdrawals: vec![],
            tx_list_hash: alloy_primitives::keccak256(&self.tx_list),
            version: PAYLOAD_VERSION_V2,
        }
    }

    /// Returns the payload attributes of the block, recording the payload id in its L1 origin.
    pub fn into_attributes(self) -> TaikoPayloadAttributes {
        let id = self.build_payload_args().id();
        TaikoPayloadAttributes {
            timestamp: self.timestamp,
            prev_randao: self.difficulty,
            suggested_fee_recipient: self.fee_recipient,
            withdrawals: vec![],
            base_fee_per_gas: self.base_fee,
            block_metadata: BlockMetadata {
                beneficiary: self.fee_recipient,
                gas_limit: self.gas_limit,
                timestamp: self.timestamp,
                tx_list: self.tx_list,
                mix_hash: self.difficulty,
                extra_data: self.extra_data,
                batch_id: self.batch_id,
            },
            l1_origin: self.l1_origin.with_payload_id(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b64;

    fn args() -> BuildPayloadArgs {
        BuildPayloadArgs {
            parent: B256::repeat_byte(0x11),
            timestamp: 1_700_000_000,
            fee_recipient: Address::repeat_byte(0x33),
            random: B256::repeat_byte(0x22),
            withdrawals: vec![],
            tx_list_hash: B256::repeat_byte(0x44),
            version: PAYLOAD_VERSION_V2,
        }
    }

    #[test]
    fn test_should_compute_payload_id() {
        let id = args().id();

        assert_eq!(id.0, b64!("02311bf76bd95ce9"));
    }

    #[test]
    fn test_payload_id_depends_on_tx_list() {
        let other = BuildPayloadArgs { tx_list_hash: B256::repeat_byte(0x45), ..args() };

        assert_ne!(args().id(), other.id());
        assert_eq!(other.id().0[0], PAYLOAD_VERSION_V2);
    }

    #[test]
    fn test_should_record_payload_id_in_l1_origin() {
        let params = BlockBuildParams {
            parent: BlockInfo::new(9, B256::repeat_byte(1)),
            timestamp: 100,
            difficulty: B256::repeat_byte(2),
            fee_recipient: Address::repeat_byte(3),
            gas_limit: 1_000_000,
            base_fee: U256::from(10),
            extra_data: Bytes::new(),
            l1_origin: L1Origin::new(10, 5, B256::repeat_byte(4)),
            batch_id: Some(1),
            tx_list: Bytes::from_static(&[0xc0]),
        };
        let id = params.build_payload_args().id();

        let attributes = params.into_attributes();

        assert_eq!(attributes.l1_origin.payload_id(), Some(id));
        assert_eq!(attributes.block_metadata.mix_hash, B256::repeat_byte(2));
        assert_eq!(attributes.block_metadata.beneficiary, Address::repeat_byte(3));
    }

    #[test]
    fn test_should_serialize_attributes() -> eyre::Result<()> {
        let attributes = TaikoPayloadAttributes {
            timestamp: 16,
            prev_randao: B256::ZERO,
            suggested_fee_recipient: Address::ZERO,
            withdrawals: vec![],
            base_fee_per_gas: U256::from(7),
            block_metadata: BlockMetadata { gas_limit: 255, batch_id: Some(2), ..Default::default() },
            l1_origin: L1Origin::preconf(3),
        };

        let json = serde_json::to_value(&attributes)?;

        assert_eq!(json["timestamp"], "0x10");
        assert_eq!(json["baseFeePerGas"], "0x7");
        assert_eq!(json["blockMetadata"]["gasLimit"], "0xff");
        assert_eq!(json["blockMetadata"]["batchID"], "0x2");
        assert_eq!(json["l1Origin"]["blockID"], "0x3");
        assert_eq!(serde_json::from_value::<TaikoPayloadAttributes>(json)?, attributes);

        Ok(())
    }
}
