use alloy_eips::BlockNumHash;
use alloy_primitives::B256;
use alloy_rpc_types_engine::ExecutionPayloadV1;
use alloy_rpc_types_eth::Header;

/// Information about a block.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
}

impl BlockInfo {
    /// Returns a new instance of [`BlockInfo`].
    pub const fn new(number: u64, hash: B256) -> Self {
        Self { number, hash }
    }
}

impl core::fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{} ({})", self.number, self.hash)
    }
}

impl From<&Header> for BlockInfo {
    fn from(value: &Header) -> Self {
        Self { number: value.inner.number, hash: value.hash }
    }
}

impl From<&ExecutionPayloadV1> for BlockInfo {
    fn from(value: &ExecutionPayloadV1) -> Self {
        Self { number: value.block_number, hash: value.block_hash }
    }
}

impl From<BlockNumHash> for BlockInfo {
    fn from(value: BlockNumHash) -> Self {
        Self { number: value.number, hash: value.hash }
    }
}

#[cfg(feature = "arbitrary")]
impl arbitrary::Arbitrary<'_> for BlockInfo {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let number = u.int_in_range(0..=u32::MAX)?;
        let hash = B256::arbitrary(u)?;
        Ok(Self { number: number as u64, hash })
    }
}

/// An L2 block together with the header fields the driver inspects when deciding on the parent of
/// a new block.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct L2BlockInfo {
    /// The block info.
    pub block_info: BlockInfo,
    /// The parent hash.
    pub parent_hash: B256,
    /// The block timestamp.
    pub timestamp: u64,
    /// The gas used by the block.
    pub gas_used: u64,
}

impl From<&Header> for L2BlockInfo {
    fn from(value: &Header) -> Self {
        Self {
            block_info: value.into(),
            parent_hash: value.inner.parent_hash,
            timestamp: value.inner.timestamp,
            gas_used: value.inner.gas_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::Header as ConsensusHeader;

    #[test]
    fn test_should_convert_rpc_header() {
        let inner = ConsensusHeader {
            number: 12,
            timestamp: 1_000,
            gas_used: 21_000,
            parent_hash: B256::repeat_byte(1),
            ..Default::default()
        };
        let hash = inner.hash_slow();
        let header = Header { hash, inner, total_difficulty: None, size: None };

        let info: L2BlockInfo = (&header).into();

        assert_eq!(info.block_info, BlockInfo::new(12, hash));
        assert_eq!(info.parent_hash, B256::repeat_byte(1));
        assert_eq!(info.gas_used, 21_000);
        assert_eq!(info.timestamp, 1_000);
    }
}
