//! Metadata of the L1 proposals the driver derives L2 blocks from.

use alloy_primitives::{Address, Bytes, B256};
use core::ops::Range;

/// The parameters of the L2 base fee calculation, shared by the Ontake and Pacaya forks.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct BaseFeeConfig {
    /// The base fee adjustment quotient.
    pub adjustment_quotient: u8,
    /// The percentage of the base fee shared with the coinbase.
    pub sharing_pctg: u8,
    /// The gas issued per second.
    pub gas_issuance_per_second: u32,
    /// The minimum gas excess.
    pub min_gas_excess: u64,
    /// The maximum gas issued per block.
    pub max_gas_issuance_per_block: u32,
}

/// The parameters of a single block in a Pacaya batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct BlockParams {
    /// The number of transactions of the batch's transaction list included in the block.
    pub num_transactions: u16,
    /// The timestamp difference with the previous block of the batch.
    pub time_shift: u8,
    /// The signal slots to relay in the anchor transaction.
    pub signal_slots: Vec<B256>,
}

/// The metadata of an Ontake `BlockProposedV2` event, describing a single L2 block.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct OntakeMetadata {
    /// The L2 block id.
    pub block_id: u64,
    /// The L2 block timestamp.
    pub timestamp: u64,
    /// The L2 block difficulty.
    pub difficulty: B256,
    /// The L1 block anchored by the L2 block.
    pub anchor_block_id: u64,
    /// The hash of the anchored L1 block.
    pub anchor_block_hash: B256,
    /// The coinbase of the L2 block.
    pub coinbase: Address,
    /// The extra data of the L2 block.
    pub extra_data: Bytes,
    /// The gas limit of the L2 block, excluding the anchor gas.
    pub gas_limit: u32,
    /// Whether the transaction list lives in a blob.
    pub blob_used: bool,
    /// The versioned hash of the blob, when one is used.
    pub blob_hash: B256,
    /// The offset of the transaction list in the blob.
    pub blob_tx_list_offset: u32,
    /// The length of the transaction list in the blob.
    pub blob_tx_list_length: u32,
    /// The base fee configuration.
    pub base_fee_config: BaseFeeConfig,
    /// The proposer of the block.
    pub proposer: Address,
    /// The L1 block the proposal transaction was included in.
    pub proposed_in: u64,
    /// The height of the L1 block which emitted the event.
    pub raw_block_height: u64,
    /// The hash of the L1 block which emitted the event.
    pub raw_block_hash: B256,
}

/// The metadata of a Pacaya `BatchProposed` event, describing a batch of consecutive L2 blocks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(arbitrary::Arbitrary))]
pub struct PacayaMetadata {
    /// The batch id.
    pub batch_id: u64,
    /// The id of the last L2 block of the batch.
    pub last_block_id: u64,
    /// The timestamp of the last L2 block of the batch.
    pub last_block_timestamp: u64,
    /// The per-block parameters, in block order.
    pub blocks: Vec<BlockParams>,
    /// The versioned hashes of the blobs carrying the transaction list. Empty for calldata.
    pub blob_hashes: Vec<B256>,
    /// The L1 block the blobs were created in, zero if they were created with the proposal.
    pub blob_created_in: u64,
    /// The offset of the transaction list in the concatenated blob data or calldata.
    pub blob_byte_offset: u32,
    /// The size of the transaction list.
    pub blob_byte_size: u32,
    /// The hash of the transaction list.
    pub txs_hash: B256,
    /// The coinbase of the batch blocks.
    pub coinbase: Address,
    /// The extra data of the batch blocks.
    pub extra_data: Bytes,
    /// The gas limit of each block, excluding the anchor gas.
    pub gas_limit: u32,
    /// The L1 block anchored by the batch blocks.
    pub anchor_block_id: u64,
    /// The hash of the anchored L1 block.
    pub anchor_block_hash: B256,
    /// The base fee configuration.
    pub base_fee_config: BaseFeeConfig,
    /// The proposer of the batch.
    pub proposer: Address,
    /// The L1 block the proposal transaction was included in.
    pub proposed_in: u64,
    /// The height of the L1 block which emitted the event.
    pub raw_block_height: u64,
    /// The hash of the L1 block which emitted the event.
    pub raw_block_hash: B256,
}

impl PacayaMetadata {
    /// Returns the id of the first L2 block of the batch.
    pub fn first_block_id(&self) -> u64 {
        (self.last_block_id + 1).saturating_sub(self.blocks.len() as u64)
    }

    /// Returns the id of the block at `index` in the batch.
    pub fn block_id(&self, index: usize) -> u64 {
        self.first_block_id() + index as u64
    }

    /// Returns the timestamp of the block at `index`, derived from the last block timestamp by
    /// subtracting the time shifts of every later block in the batch.
    pub fn block_timestamp(&self, index: usize) -> u64 {
        self.blocks
            .iter()
            .skip(index + 1)
            .fold(self.last_block_timestamp, |ts, block| ts.saturating_sub(block.time_shift as u64))
    }

    /// Returns the range of the batch's decoded transactions belonging to the block at `index`. A
    /// block declaring more transactions than remain takes what is left.
    pub fn block_transactions(&self, index: usize, total: usize) -> Range<usize> {
        let cursor: usize =
            self.blocks.iter().take(index).map(|block| block.num_transactions as usize).sum();
        let count = self.blocks.get(index).map(|block| block.num_transactions as usize);
        match count {
            Some(count) if cursor + count <= total => cursor..cursor + count,
            Some(_) if cursor < total => cursor..total,
            _ => 0..0,
        }
    }

    /// Returns the L1 block the blobs of the batch were created in.
    pub const fn blob_origin_height(&self) -> u64 {
        if self.blob_created_in != 0 {
            self.blob_created_in
        } else {
            self.raw_block_height
        }
    }
}

/// The metadata of a proposal event, for either protocol fork.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum ProposalMetadata {
    /// A single Ontake block.
    Ontake(OntakeMetadata),
    /// A Pacaya batch.
    Pacaya(PacayaMetadata),
}

impl ProposalMetadata {
    /// Returns true for a Pacaya batch.
    pub const fn is_pacaya(&self) -> bool {
        matches!(self, Self::Pacaya(_))
    }

    /// Returns the id of the proposal: the block id for Ontake, the batch id for Pacaya.
    pub const fn proposal_id(&self) -> u64 {
        match self {
            Self::Ontake(meta) => meta.block_id,
            Self::Pacaya(meta) => meta.batch_id,
        }
    }

    /// Returns the id of the first L2 block of the proposal.
    pub fn first_block_id(&self) -> u64 {
        match self {
            Self::Ontake(meta) => meta.block_id,
            Self::Pacaya(meta) => meta.first_block_id(),
        }
    }

    /// Returns the id of the last L2 block of the proposal. Zero marks the genesis proposal.
    pub const fn last_block_id(&self) -> u64 {
        match self {
            Self::Ontake(meta) => meta.block_id,
            Self::Pacaya(meta) => meta.last_block_id,
        }
    }

    /// Returns the timestamp of the last L2 block of the proposal.
    pub const fn last_block_timestamp(&self) -> u64 {
        match self {
            Self::Ontake(meta) => meta.timestamp,
            Self::Pacaya(meta) => meta.last_block_timestamp,
        }
    }

    /// Returns the number of L2 blocks described by the proposal.
    pub fn block_count(&self) -> usize {
        match self {
            Self::Ontake(_) => 1,
            Self::Pacaya(meta) => meta.blocks.len(),
        }
    }

    /// Returns the height of the L1 block which emitted the event.
    pub const fn raw_block_height(&self) -> u64 {
        match self {
            Self::Ontake(meta) => meta.raw_block_height,
            Self::Pacaya(meta) => meta.raw_block_height,
        }
    }

    /// Returns the hash of the L1 block which emitted the event.
    pub const fn raw_block_hash(&self) -> B256 {
        match self {
            Self::Ontake(meta) => meta.raw_block_hash,
            Self::Pacaya(meta) => meta.raw_block_hash,
        }
    }

    /// Returns the coinbase of the proposed blocks.
    pub const fn coinbase(&self) -> Address {
        match self {
            Self::Ontake(meta) => meta.coinbase,
            Self::Pacaya(meta) => meta.coinbase,
        }
    }

    /// Returns true if the transaction list lives in blobs.
    pub fn blob_used(&self) -> bool {
        match self {
            Self::Ontake(meta) => meta.blob_used,
            Self::Pacaya(meta) => !meta.blob_hashes.is_empty(),
        }
    }

    /// Returns the anchored L1 block id.
    pub const fn anchor_block_id(&self) -> u64 {
        match self {
            Self::Ontake(meta) => meta.anchor_block_id,
            Self::Pacaya(meta) => meta.anchor_block_id,
        }
    }

    /// Returns the hash of the anchored L1 block.
    pub const fn anchor_block_hash(&self) -> B256 {
        match self {
            Self::Ontake(meta) => meta.anchor_block_hash,
            Self::Pacaya(meta) => meta.anchor_block_hash,
        }
    }

    /// Returns the base fee configuration.
    pub const fn base_fee_config(&self) -> &BaseFeeConfig {
        match self {
            Self::Ontake(meta) => &meta.base_fee_config,
            Self::Pacaya(meta) => &meta.base_fee_config,
        }
    }

    /// Returns the gas limit of each proposed block, excluding the anchor gas.
    pub const fn gas_limit(&self) -> u32 {
        match self {
            Self::Ontake(meta) => meta.gas_limit,
            Self::Pacaya(meta) => meta.gas_limit,
        }
    }

    /// Returns the extra data of the proposed blocks.
    pub const fn extra_data(&self) -> &Bytes {
        match self {
            Self::Ontake(meta) => &meta.extra_data,
            Self::Pacaya(meta) => &meta.extra_data,
        }
    }

    /// Returns the proposer.
    pub const fn proposer(&self) -> Address {
        match self {
            Self::Ontake(meta) => meta.proposer,
            Self::Pacaya(meta) => meta.proposer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(shifts_and_counts: &[(u8, u16)]) -> PacayaMetadata {
        PacayaMetadata {
            batch_id: 10,
            last_block_id: 100,
            last_block_timestamp: 1_000,
            blocks: shifts_and_counts
                .iter()
                .map(|(time_shift, num_transactions)| BlockParams {
                    num_transactions: *num_transactions,
                    time_shift: *time_shift,
                    signal_slots: vec![],
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_should_derive_block_ids() {
        let meta = batch(&[(0, 1), (2, 1), (3, 1)]);

        assert_eq!(meta.first_block_id(), 98);
        assert_eq!(meta.block_id(2), 100);
        assert_eq!(ProposalMetadata::from(meta).block_count(), 3);
    }

    #[test]
    fn test_should_subtract_later_time_shifts_only() {
        let meta = batch(&[(5, 0), (2, 0), (3, 0)]);

        assert_eq!(meta.block_timestamp(2), 1_000);
        assert_eq!(meta.block_timestamp(1), 997);
        // the first block's own time shift is never applied.
        assert_eq!(meta.block_timestamp(0), 995);
    }

    #[test]
    fn test_should_partition_transactions() {
        let meta = batch(&[(0, 2), (0, 3), (0, 4)]);

        assert_eq!(meta.block_transactions(0, 10), 0..2);
        assert_eq!(meta.block_transactions(1, 10), 2..5);
        assert_eq!(meta.block_transactions(2, 10), 5..9);
    }

    #[test]
    fn test_should_truncate_overrunning_block() {
        let meta = batch(&[(0, 2), (0, 3), (0, 4)]);

        assert_eq!(meta.block_transactions(1, 4), 2..4);
        assert_eq!(meta.block_transactions(2, 4), 0..0);
        assert_eq!(meta.block_transactions(3, 4), 0..0);
    }

    #[test]
    fn test_blob_origin_falls_back_to_proposal_block() {
        let mut meta = PacayaMetadata { raw_block_height: 50, ..Default::default() };
        assert_eq!(meta.blob_origin_height(), 50);

        meta.blob_created_in = 42;
        assert_eq!(meta.blob_origin_height(), 42);
    }
}
