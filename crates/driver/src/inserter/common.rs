use super::BlocksInserter;
use crate::DriverError;
use alloy_consensus::TxEnvelope;
use alloy_primitives::{Bytes, B256};
use alloy_rpc_types_eth::Header;
use std::time::Duration;
use taiko_engine::TaikoEngineApi;
use taiko_providers::{
    BlobProvider, L1ChainProvider, L1OriginProvider, L2ChainProvider, ProtocolProvider,
};

/// The interval between two polls of a newly inserted L2 header.
#[cfg(any(test, feature = "test-utils"))]
const WAIT_HEADER_INTERVAL: Duration = Duration::from_millis(1);
/// The interval between two polls of a newly inserted L2 header.
#[cfg(not(any(test, feature = "test-utils")))]
const WAIT_HEADER_INTERVAL: Duration = Duration::from_secs(1);

/// The parent of the first block of a proposal, as decided by the beacon sync tracker.
#[derive(Debug)]
pub(super) enum SyncedParent {
    /// No beacon sync was triggered, the parent is read from the L2 chain.
    Untriggered,
    /// The proposal was already imported by the beacon sync.
    AlreadySynced,
    /// The beacon sync target to build on.
    Target(Header),
}

/// Returns the RLP encoded transaction list of a block: the anchor transaction followed by the
/// proposed transactions.
pub(super) fn assemble_tx_list(anchor: TxEnvelope, txs: &[TxEnvelope]) -> Bytes {
    let mut list = Vec::with_capacity(txs.len() + 1);
    list.push(anchor);
    list.extend_from_slice(txs);
    alloy_rlp::encode(list).into()
}

impl<L1, P, B, L2, EC> BlocksInserter<L1, P, B, L2, EC>
where
    L1: L1ChainProvider,
    P: ProtocolProvider,
    B: BlobProvider,
    L2: L2ChainProvider + L1OriginProvider,
    EC: TaikoEngineApi,
{
    /// Resolves the parent of a proposal ending at `last_block_id` through the beacon sync
    /// tracker.
    pub(super) async fn synced_parent(&self, last_block_id: u64) -> Result<SyncedParent, DriverError> {
        if !self.tracker.triggered() {
            return Ok(SyncedParent::Untriggered)
        }
        let Some(target) = self.tracker.last_synced_block() else {
            return Ok(SyncedParent::Untriggered)
        };
        if last_block_id <= target.number {
            tracing::debug!(
                target: "taiko::driver",
                last_block_id,
                synced = %target,
                "skipping proposal already imported by beacon sync"
            );
            return Ok(SyncedParent::AlreadySynced)
        }
        Ok(SyncedParent::Target(self.l2_header_by_hash(target.hash).await?))
    }

    /// Returns the canonical L2 header at the height.
    pub(super) async fn l2_header(&self, number: u64) -> Result<Header, DriverError> {
        self.l2
            .l2_header_by_number(number.into())
            .await?
            .ok_or(DriverError::MissingL2Header(number))
    }

    /// Returns the L2 header with the hash.
    pub(super) async fn l2_header_by_hash(&self, hash: B256) -> Result<Header, DriverError> {
        self.l2.l2_header_by_hash(hash).await?.ok_or(DriverError::MissingL2HeaderByHash(hash))
    }

    /// Returns the state root of the anchored L1 block.
    pub(super) async fn anchor_state_root(&self, hash: B256) -> Result<B256, DriverError> {
        let header =
            self.l1.l1_header_by_hash(hash).await?.ok_or(DriverError::MissingL1HeaderByHash(hash))?;
        Ok(header.state_root)
    }

    /// Returns the hash of the last verified block if the block is above it, which then becomes
    /// the safe and finalized block.
    pub(super) async fn verified_block_hash(&self, block_id: u64) -> Result<Option<B256>, DriverError> {
        let verified = self.protocol.last_verified_block().await?;
        Ok((block_id > verified.block_id).then_some(verified.block_hash))
    }

    /// Waits until the L2 header at the height is available.
    pub(super) async fn wait_l2_header(&self, number: u64) -> Result<Header, DriverError> {
        loop {
            if let Some(header) = self.l2.l2_header_by_number(number.into()).await? {
                return Ok(header)
            }
            tracing::trace!(target: "taiko::driver", number, "waiting for L2 header");
            tokio::time::sleep(WAIT_HEADER_INTERVAL).await;
        }
    }
}
