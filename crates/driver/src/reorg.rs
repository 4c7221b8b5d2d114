//! Detection of the L1 reorgs invalidating already inserted L2 blocks.

use crate::DriverError;
use alloy_consensus::Transaction;
use alloy_rpc_types_eth::Header;
use taiko_l1::AnchorCall;
use taiko_primitives::{ForkHeights, ReorgCheckResult};
use taiko_providers::{L1ChainProvider, L1OriginProvider, L2ChainProvider, ProtocolProvider};

/// The number of blocks the Ontake verified block walk rewinds per mismatch.
const ONTAKE_REORG_STRIDE: u64 = 10;

/// Checks whether the L2 chain still matches the L1 chain and the protocol's verified state,
/// finding the point to rewind to when it doesn't.
#[derive(Debug)]
pub struct ReorgChecker<L1, P, L2> {
    /// The L1 execution client.
    l1: L1,
    /// The Taiko inbox.
    protocol: P,
    /// The L2 execution engine client.
    l2: L2,
    /// The fork activation heights.
    fork_heights: ForkHeights,
    /// The L1 block the inbox was deployed in.
    genesis_l1_header: Header,
}

impl<L1, P, L2> ReorgChecker<L1, P, L2>
where
    L1: L1ChainProvider,
    P: ProtocolProvider,
    L2: L2ChainProvider + L1OriginProvider,
{
    /// Returns a new [`ReorgChecker`].
    pub const fn new(
        l1: L1,
        protocol: P,
        l2: L2,
        fork_heights: ForkHeights,
        genesis_l1_header: Header,
    ) -> Self {
        Self { l1, protocol, l2, fork_heights, genesis_l1_header }
    }

    /// Runs both reorg checks before inserting the proposal starting at `first_block_id`: the
    /// verified block check first, then the L1 origin check of the parent block.
    pub async fn check_reorg(
        &self,
        l1_current: &Header,
        l2_head: u64,
        last_inserted_block_id: Option<u64>,
        first_block_id: u64,
    ) -> Result<ReorgCheckResult, DriverError> {
        if l1_current.number == self.genesis_l1_header.number {
            return Ok(ReorgCheckResult::default())
        }

        let result = self.check_last_verified_block_mismatch(l2_head, last_inserted_block_id).await?;
        if result.is_reorged {
            return Ok(result)
        }
        self.check_l1_reorg_from_l2_ee(first_block_id.saturating_sub(1)).await
    }

    /// Compares the last block verified by the protocol with the local block at its height. On
    /// mismatch, walks back the verified batches, then the verified Ontake blocks, to the last
    /// local block matching its verified hash.
    pub async fn check_last_verified_block_mismatch(
        &self,
        l2_head: u64,
        last_inserted_block_id: Option<u64>,
    ) -> Result<ReorgCheckResult, DriverError> {
        let verified = self.protocol.last_verified_block().await?;
        if l2_head < verified.block_id ||
            last_inserted_block_id.is_some_and(|id| id < verified.block_id)
        {
            return Ok(ReorgCheckResult::default())
        }

        let header = self.l2_header(verified.block_id).await?;
        if header.hash == verified.block_hash {
            return Ok(ReorgCheckResult::default())
        }
        tracing::warn!(
            target: "taiko::driver",
            block_id = verified.block_id,
            local = ?header.hash,
            verified = ?verified.block_hash,
            "last verified block mismatch"
        );

        match verified.batch_id {
            Some(batch_id) => self.walk_verified_batches(batch_id).await,
            None => self.walk_verified_ontake_blocks(verified.block_id).await,
        }
    }

    async fn walk_verified_batches(&self, mut batch_id: u64) -> Result<ReorgCheckResult, DriverError> {
        while batch_id > 0 && batch_id >= self.fork_heights.pacaya {
            let batch = self.protocol.batch(batch_id).await?;
            if batch.verifiedTransitionId.is_zero() {
                batch_id -= 1;
                continue
            }

            let transition = self.protocol.batch_verifying_transition(batch_id).await?;
            let header = self.l2_header(batch.lastBlockId).await?;
            if header.hash == transition.blockHash {
                tracing::info!(
                    target: "taiko::driver",
                    batch_id,
                    block_id = batch.lastBlockId,
                    hash = ?header.hash,
                    "verified batch matched, rewinding"
                );
                let l1_current = self.l1_header(batch.anchorBlockId).await?;
                return Ok(ReorgCheckResult::reorged(l1_current, batch.lastBlockId))
            }

            tracing::info!(
                target: "taiko::driver",
                batch_id,
                block_id = batch.lastBlockId,
                local = ?header.hash,
                verified = ?transition.blockHash,
                "verified batch mismatch"
            );
            batch_id -= 1;
        }

        self.walk_verified_ontake_blocks(self.fork_heights.pacaya.saturating_sub(1)).await
    }

    async fn walk_verified_ontake_blocks(
        &self,
        mut block_id: u64,
    ) -> Result<ReorgCheckResult, DriverError> {
        while block_id > 0 {
            let block = self.protocol.ontake_block(block_id).await?;
            if block.verifiedTransitionId.is_zero() {
                block_id = block_id.saturating_sub(ONTAKE_REORG_STRIDE);
                continue
            }

            let transition = self
                .protocol
                .ontake_transition(block_id, block.verifiedTransitionId.saturating_to::<u32>())
                .await?;
            let header = self.l2_header(block_id).await?;
            if header.hash == transition.blockHash {
                tracing::info!(target: "taiko::driver", block_id, hash = ?header.hash, "verified block matched, rewinding");
                let height = match self.l2.l1_origin_by_id(block_id).await? {
                    Some(origin) => origin.l1_block_height.unwrap_or(block.proposedIn),
                    None => block.proposedIn,
                };
                let l1_current = if height == 0 {
                    self.genesis_l1_header.clone()
                } else {
                    self.l1_header(height).await?
                };
                return Ok(ReorgCheckResult::reorged(l1_current, block_id))
            }
            block_id = block_id.saturating_sub(ONTAKE_REORG_STRIDE);
        }

        tracing::warn!(target: "taiko::driver", "no verified block matched, rewinding to genesis");
        Ok(ReorgCheckResult::reorged(self.genesis_l1_header.clone(), 0))
    }

    /// Walks down from `block_id` to the first L2 block whose L1 origin and anchor transaction
    /// still match the L1 chain.
    pub async fn check_l1_reorg_from_l2_ee(
        &self,
        mut block_id: u64,
    ) -> Result<ReorgCheckResult, DriverError> {
        let mut is_reorged = false;
        loop {
            if block_id == 0 {
                return Ok(ReorgCheckResult {
                    is_reorged,
                    l1_current_to_reset: Some(self.genesis_l1_header.clone()),
                    last_handled_block_id_to_reset: Some(0),
                })
            }

            let Some(origin) = self.l2.l1_origin_by_id(block_id).await? else {
                if self.l2.head_l1_origin().await?.is_none() {
                    tracing::info!(target: "taiko::driver", block_id, "L1 origin not found on a P2P synced chain");
                    return Ok(ReorgCheckResult::default())
                }
                tracing::info!(target: "taiko::driver", block_id, "reorg detected, L1 origin not found");
                is_reorged = true;
                block_id -= 1;
                continue
            };
            let Some(height) = origin.l1_block_height else {
                block_id -= 1;
                continue
            };

            let l1_header = self.l1.l1_header_by_number(height.into()).await?;
            let Some(l1_header) = l1_header.filter(|h| Some(h.hash) == origin.l1_block_hash) else {
                tracing::info!(
                    target: "taiko::driver",
                    block_id,
                    l1_height = height,
                    l1_hash = ?origin.l1_block_hash,
                    "reorg detected, L1 origin block replaced"
                );
                is_reorged = true;
                block_id -= 1;
                continue
            };

            if self.anchor_mismatch(block_id, height).await? {
                is_reorged = true;
                block_id -= 1;
                continue
            }

            tracing::debug!(target: "taiko::driver", is_reorged, block_id, l1_height = height, "checked L1 reorg from L2 execution engine");
            return Ok(ReorgCheckResult {
                is_reorged,
                l1_current_to_reset: Some(l1_header),
                last_handled_block_id_to_reset: Some(block_id),
            })
        }
    }

    /// Returns true if the anchor transaction of the block doesn't match its parent or the
    /// anchored L1 block.
    async fn anchor_mismatch(&self, block_id: u64, l1_height: u64) -> Result<bool, DriverError> {
        let block = self
            .l2
            .l2_block_by_number(block_id)
            .await?
            .ok_or(DriverError::MissingL2Header(block_id))?;
        let anchor = block
            .transactions
            .as_transactions()
            .and_then(|txs| txs.first())
            .and_then(|tx| AnchorCall::try_decode(tx.input()))
            .ok_or(DriverError::MissingAnchor(block_id))?;
        let parent = self
            .l2
            .l2_header_by_hash(block.header.parent_hash)
            .await?
            .ok_or(DriverError::MissingL2HeaderByHash(block.header.parent_hash))?;

        if anchor.parent_gas_used() != parent.gas_used as u32 {
            tracing::info!(target: "taiko::driver", block_id, anchored = anchor.parent_gas_used(), parent = parent.gas_used, "reorg detected, parent gas used mismatch");
            return Ok(true)
        }
        if let AnchorCall::V1(call) = &anchor {
            if call.l1BlockId + 1 != l1_height {
                tracing::info!(target: "taiko::driver", block_id, anchored = call.l1BlockId, l1_height, "reorg detected, L1 height mismatch");
                return Ok(true)
            }
        }

        let Some(anchored) = self.l1.l1_header_by_number(anchor.anchor_block_id().into()).await?
        else {
            tracing::info!(target: "taiko::driver", block_id, anchored = anchor.anchor_block_id(), "reorg detected, anchored L1 block missing");
            return Ok(true)
        };
        if let AnchorCall::V1(call) = &anchor {
            if anchored.hash != call.l1BlockHash {
                tracing::info!(target: "taiko::driver", block_id, "reorg detected, anchored L1 hash mismatch");
                return Ok(true)
            }
        }
        if anchored.state_root != anchor.anchor_state_root() {
            tracing::info!(target: "taiko::driver", block_id, "reorg detected, anchored L1 state root mismatch");
            return Ok(true)
        }
        Ok(false)
    }

    async fn l2_header(&self, number: u64) -> Result<Header, DriverError> {
        self.l2
            .l2_header_by_number(number.into())
            .await?
            .ok_or(DriverError::MissingL2Header(number))
    }

    async fn l1_header(&self, number: u64) -> Result<Header, DriverError> {
        self.l1
            .l1_header_by_number(number.into())
            .await?
            .ok_or(DriverError::MissingL1Header(number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{transfers, DriverHarness};
    use alloy_primitives::{aliases::U24, B256};
    use taiko_engine::test_utils::MockL2Node;
    use taiko_l1::{BlockV2, TransitionStateOntake};
    use taiko_primitives::VerifiedBlock;
    use taiko_providers::test_utils::{MockL1Provider, MockProtocolProvider};

    fn checker(
        harness: &DriverHarness,
    ) -> eyre::Result<ReorgChecker<MockL1Provider, MockProtocolProvider, MockL2Node>> {
        let genesis = harness.l1.header(0).ok_or_else(|| eyre::eyre!("missing L1 genesis"))?;
        Ok(ReorgChecker::new(
            harness.l1.clone(),
            harness.protocol.clone(),
            harness.l2.clone(),
            harness.config.fork_heights,
            genesis,
        ))
    }

    /// Proposes one single block batch per L1 block, after an empty L1 block, and syncs them.
    async fn synced_batches(harness: &DriverHarness, count: u64) -> eyre::Result<()> {
        harness.l1.push_block(vec![]);
        for batch_id in 1..=count {
            harness.propose_batch(batch_id, &[1], &transfers(batch_id - 1, 1)).await?;
        }
        let (mut syncer, _) = harness.chain_syncer().await?;
        syncer.sync().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_should_not_detect_reorg_on_consistent_chain() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        synced_batches(&harness, 3).await?;
        let checker = checker(&harness)?;
        let l1_current = harness.l1.head();

        // When
        let result = checker.check_reorg(&l1_current, 3, Some(3), 4).await?;

        // Then
        assert!(!result.is_reorged);
        assert_eq!(result.l1_current_to_reset, Some(l1_current));
        assert_eq!(result.last_handled_block_id_to_reset, Some(3));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_skip_checks_at_genesis_cursor() -> eyre::Result<()> {
        let harness = DriverHarness::new();
        synced_batches(&harness, 1).await?;
        harness.verify_batch(1, B256::repeat_byte(0xff)).await?;
        let genesis = harness.l1.header(0).unwrap();

        let result = checker(&harness)?.check_reorg(&genesis, 1, Some(1), 2).await?;

        assert_eq!(result, ReorgCheckResult::default());

        Ok(())
    }

    #[tokio::test]
    async fn test_should_walk_back_to_last_matching_verified_batch() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        synced_batches(&harness, 3).await?;
        harness.verify_batch(1, harness.l2_header(1).await?.hash).await?;
        harness.verify_batch(2, B256::repeat_byte(0xff)).await?;

        // When
        let result = checker(&harness)?.check_last_verified_block_mismatch(3, Some(3)).await?;

        // Then
        let anchor = harness.l1.header(1).unwrap();
        assert_eq!(result, ReorgCheckResult::reorged(anchor, 1));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_rewind_to_genesis_without_matching_verified_block() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        synced_batches(&harness, 2).await?;
        harness.verify_batch(1, B256::repeat_byte(0xff)).await?;

        // When
        let result = checker(&harness)?.check_last_verified_block_mismatch(2, Some(2)).await?;

        // Then
        assert_eq!(result, ReorgCheckResult::reorged(harness.l1.header(0).unwrap(), 0));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_ignore_verified_block_above_inserted_blocks() -> eyre::Result<()> {
        let harness = DriverHarness::new();
        synced_batches(&harness, 2).await?;
        harness.verify_batch(2, B256::repeat_byte(0xff)).await?;

        let result = checker(&harness)?.check_last_verified_block_mismatch(2, Some(1)).await?;

        assert!(!result.is_reorged);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_walk_verified_ontake_blocks_by_stride() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        harness.propose_batch(1, &[0; 12], &[]).await?;
        let (mut syncer, _) = harness.chain_syncer().await?;
        syncer.sync().await?;

        let matching = harness.l2_header(2).await?;
        for (block_id, block_hash) in [(12, B256::repeat_byte(0xff)), (2, matching.hash)] {
            harness.protocol.insert_ontake_block(BlockV2 {
                blockId: block_id,
                proposedIn: 1,
                verifiedTransitionId: U24::from(1),
                ..Default::default()
            });
            harness.protocol.insert_ontake_transition(
                block_id,
                1,
                TransitionStateOntake { blockHash: block_hash, ..Default::default() },
            );
        }
        harness.protocol.set_last_verified_transition(Some(VerifiedBlock {
            batch_id: None,
            block_id: 12,
            block_hash: B256::repeat_byte(0xff),
        }));

        // When
        let result = checker(&harness)?.check_last_verified_block_mismatch(12, None).await?;

        // Then
        assert_eq!(result, ReorgCheckResult::reorged(harness.l1.header(1).unwrap(), 2));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_detect_replaced_l1_origin_block() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        let first = harness.propose_batch(1, &[1], &transfers(0, 1)).await?;
        harness.propose_batch(2, &[1], &transfers(1, 1)).await?;
        let (mut syncer, _) = harness.chain_syncer().await?;
        syncer.sync().await?;

        // When
        harness.l1.reorg(1);
        harness.l1.push_block(vec![]);
        let result = checker(&harness)?.check_l1_reorg_from_l2_ee(2).await?;

        // Then
        assert_eq!(result, ReorgCheckResult::reorged(first, 1));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_rewind_to_genesis_when_every_origin_reorged() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        harness.l1.push_block(vec![]);
        harness.l1.push_block(vec![]);
        harness.propose_batch(1, &[1], &transfers(0, 1)).await?;
        let (mut syncer, _) = harness.chain_syncer().await?;
        syncer.sync().await?;

        // When
        harness.l1.reorg(1);
        let result = checker(&harness)?.check_l1_reorg_from_l2_ee(1).await?;

        // Then
        assert_eq!(result, ReorgCheckResult::reorged(harness.l1.header(0).unwrap(), 0));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_trust_p2p_synced_chain_without_origins() -> eyre::Result<()> {
        let harness = DriverHarness::new();

        let result = checker(&harness)?.check_l1_reorg_from_l2_ee(5).await?;

        assert_eq!(result, ReorgCheckResult::default());

        Ok(())
    }
}
