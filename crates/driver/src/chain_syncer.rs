//! The top level syncer, deriving the L2 chain from the L1 proposals or beacon syncing it from a
//! checkpoint node.

use crate::{
    BlocksInserter, DriverConfig, DriverError, DriverMetrics, ReorgChecker, ReplayGuard, State,
    SyncProgressTracker,
};
use alloy_eips::BlockId;
use alloy_primitives::Address;
use alloy_rpc_types_engine::PayloadStatusEnum;
use alloy_rpc_types_eth::Filter;
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use taiko_engine::{ForkchoiceState, TaikoEngineApi, TaikoExecutionPayload};
use taiko_l1::{decode_proposal, proposal_event_signatures};
use taiko_primitives::{BlockInfo, ProposalMetadata};
use taiko_providers::{
    BlobProvider, ExecutionPayloadProvider, L1ChainProvider, L1OriginProvider, L2ChainProvider,
    ProtocolProvider,
};

/// The outcome of the processing of a single proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProposalOutcome {
    /// The proposal was inserted or skipped, the pass goes on.
    Continue,
    /// A reorg was detected and the cursors were rewound, the pass must start over.
    Reorged,
}

/// Drives the L2 execution engine: beacon syncs it from a checkpoint node when it lags too far
/// behind, then inserts the blocks of every proposal emitted by the inbox.
///
/// Passes must be serialized by the caller, the syncer keeps its bookkeeping without locking.
#[derive(Debug)]
pub struct ChainSyncer<L1, P, B, L2, EC, CP> {
    /// The driver cursors.
    state: Arc<State<L1, L2>>,
    /// The blocks inserter, shared with the preconfirmation handler.
    inserter: Arc<BlocksInserter<L1, P, B, L2, EC>>,
    /// The reorg checker.
    reorg: ReorgChecker<L1, P, L2>,
    /// The beacon sync tracker.
    tracker: Arc<SyncProgressTracker<L2>>,
    /// The checkpoint node to beacon sync from.
    checkpoint: Option<CP>,
    /// The L1 execution client.
    l1: L1,
    /// The L2 execution engine client.
    l2: L2,
    /// The address of the Taiko inbox.
    inbox: Address,
    /// Whether the engine may beacon sync.
    p2p_sync: bool,
    /// How already inserted proposals are recognized.
    replay_guard: ReplayGuard,
    /// The last block id inserted from a proposal.
    last_inserted_block_id: Option<u64>,
    /// The batch id of the last inserted proposal.
    last_inserted_batch_id: Option<u64>,
    /// The metrics of the driver.
    metrics: DriverMetrics,
}

impl<L1, P, B, L2, EC, CP> ChainSyncer<L1, P, B, L2, EC, CP>
where
    L1: L1ChainProvider + Clone,
    P: ProtocolProvider,
    B: BlobProvider,
    L2: L2ChainProvider + L1OriginProvider + Clone,
    EC: TaikoEngineApi,
    CP: ExecutionPayloadProvider,
{
    /// Returns a new [`ChainSyncer`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<State<L1, L2>>,
        inserter: Arc<BlocksInserter<L1, P, B, L2, EC>>,
        protocol: P,
        tracker: Arc<SyncProgressTracker<L2>>,
        checkpoint: Option<CP>,
        l1: L1,
        l2: L2,
        config: &DriverConfig,
    ) -> Self {
        let reorg = ReorgChecker::new(
            l1.clone(),
            protocol,
            l2.clone(),
            config.fork_heights,
            state.genesis_l1_header().clone(),
        );
        Self {
            state,
            inserter,
            reorg,
            tracker,
            checkpoint,
            l1,
            l2,
            inbox: config.inbox,
            p2p_sync: config.p2p_sync,
            replay_guard: config.replay_guard,
            last_inserted_block_id: None,
            last_inserted_batch_id: None,
            metrics: DriverMetrics::default(),
        }
    }

    /// Returns the driver cursors.
    pub const fn state(&self) -> &Arc<State<L1, L2>> {
        &self.state
    }

    /// Returns the last block id inserted from a proposal.
    pub const fn last_inserted_block_id(&self) -> Option<u64> {
        self.last_inserted_block_id
    }

    /// Runs a sync step: triggers a beacon sync when the engine lags behind the checkpoint node,
    /// otherwise inserts the proposals emitted since the L1 cursor.
    pub async fn sync(&mut self) -> Result<(), DriverError> {
        let (block_id_to_sync, need_beacon_sync) = self.need_new_beacon_sync_triggered().await?;
        if need_beacon_sync {
            return self.trigger_beacon_sync(block_id_to_sync).await
        }

        self.tracker.mark_finished();
        if self.tracker.triggered() {
            self.set_up_event_sync(block_id_to_sync).await?;
        }

        self.process_l1_blocks().await
    }

    /// Returns the checkpoint head and whether a new beacon sync towards it must be triggered.
    async fn need_new_beacon_sync_triggered(&self) -> Result<(u64, bool), DriverError> {
        if !self.p2p_sync || self.tracker.finished() {
            return Ok((0, false))
        }
        let Some(checkpoint) = &self.checkpoint else { return Ok((0, false)) };
        let Some(head) = checkpoint.execution_payload_by_block(BlockId::latest()).await? else {
            return Ok((0, false))
        };

        let block_id = head.execution_payload.block_number;
        if block_id == 0 {
            return Ok((0, false))
        }
        Ok((block_id, !self.ahead_of_head_to_sync(block_id) && !self.tracker.out_of_sync()))
    }

    /// Returns true if the L2 head caught up with the block, or with the beacon sync target when
    /// one is tracked.
    pub fn ahead_of_head_to_sync(&self, height_to_sync: u64) -> bool {
        let height_to_sync = height_to_sync.saturating_sub(1);
        let l2_head = self.state.l2_head().number;
        if l2_head < height_to_sync {
            return false
        }
        self.tracker.last_synced_block_id().is_none_or(|id| l2_head >= id)
    }

    /// Points the execution engine at the checkpoint block, starting a beacon sync towards it.
    #[tracing::instrument(skip(self))]
    pub async fn trigger_beacon_sync(&self, block_id: u64) -> Result<(), DriverError> {
        let Some(checkpoint) = &self.checkpoint else { return Ok(()) };
        let payload = checkpoint
            .execution_payload_by_block(BlockId::number(block_id))
            .await?
            .ok_or(DriverError::MissingCheckpointPayload(block_id))?;

        if !self.tracker.need_resync(block_id).await? {
            tracing::trace!(target: "taiko::driver", block_id, "beacon sync in progress");
            return Ok(())
        }

        let payload = TaikoExecutionPayload::from(payload);
        let head = payload.block_hash();
        let engine = self.inserter.engine();

        let status = engine.new_payload(payload).await?;
        if !matches!(status, PayloadStatusEnum::Valid | PayloadStatusEnum::Syncing) {
            return Err(DriverError::BeaconSyncStatus(status))
        }
        let updated = engine.update_forkchoice(ForkchoiceState::head_only(head)).await?;
        match updated.payload_status.status {
            PayloadStatusEnum::Valid | PayloadStatusEnum::Syncing => {}
            status => return Err(DriverError::BeaconSyncStatus(status)),
        }

        tracing::info!(target: "taiko::driver", block_id, ?head, "beacon sync triggered");
        self.tracker.update_meta(block_id, head);
        Ok(())
    }

    /// Rewinds the L1 cursor to the L1 block the beacon synced head was proposed in, so that
    /// the event sync picks up where the beacon sync stopped.
    async fn set_up_event_sync(&self, block_id_to_sync: u64) -> Result<(), DriverError> {
        let head = if self.tracker.out_of_sync() {
            self.l2.l2_head().await?
        } else {
            self.l2
                .l2_header_by_number(block_id_to_sync.into())
                .await?
                .ok_or(DriverError::MissingL2Header(block_id_to_sync))?
        };

        tracing::info!(target: "taiko::driver", head = %BlockInfo::from(&head), "beacon sync finished, starting event sync");
        self.state.reset_l1_current(head.number).await?;
        self.tracker.update_meta(head.number, head.hash);
        Ok(())
    }

    /// Inserts the blocks of every proposal emitted between the L1 cursor and the L1 head,
    /// starting over from the rewound cursor whenever a reorg is detected.
    pub async fn process_l1_blocks(&mut self) -> Result<(), DriverError> {
        while self.process_l1_blocks_once().await? {
            self.metrics.reorgs.increment(1);
            tracing::info!(
                target: "taiko::driver",
                l1_current = %BlockInfo::from(&self.state.l1_current()),
                last_inserted_block_id = ?self.last_inserted_block_id,
                "restarting L1 blocks processing after reorg"
            );
        }
        Ok(())
    }

    /// Runs a single pass over the proposals, returning true if it stopped on a reorg.
    async fn process_l1_blocks_once(&mut self) -> Result<bool, DriverError> {
        let l1_head = self.state.l1_head();
        let mut l1_current = self.state.l1_current();

        if l1_current.number >= l1_head.number && l1_current.hash != l1_head.hash {
            let number = l1_head.number.saturating_sub(1);
            let header = self
                .l1
                .l1_header_by_number(number.into())
                .await?
                .ok_or(DriverError::MissingL1Header(number))?;
            tracing::info!(
                target: "taiko::driver",
                l1_current = %BlockInfo::from(&l1_current),
                l1_head = %BlockInfo::from(&l1_head),
                "L1 cursor reorged, rewinding it below the L1 head"
            );
            self.state.set_l1_current(header.clone());
            self.last_inserted_block_id = None;
            self.last_inserted_batch_id = None;
            l1_current = header;
        }

        if l1_current.number < l1_head.number {
            let filter = Filter::new()
                .address(self.inbox)
                .event_signature(proposal_event_signatures().to_vec())
                .from_block(l1_current.number + 1)
                .to_block(l1_head.number);

            for log in self.l1.l1_logs(&filter).await? {
                let Some(meta) = decode_proposal(&log) else { continue };
                if self.process_proposal(&meta).await? == ProposalOutcome::Reorged {
                    return Ok(true)
                }
            }
        }

        self.state.set_l1_current(l1_head);
        Ok(false)
    }

    /// Inserts the blocks of the proposal, unless a reorg is detected first or the proposal was
    /// already inserted.
    #[tracing::instrument(skip_all, fields(proposal_id = meta.proposal_id(), last_block_id = meta.last_block_id()))]
    async fn process_proposal(
        &mut self,
        meta: &ProposalMetadata,
    ) -> Result<ProposalOutcome, DriverError> {
        if meta.last_block_id() == 0 {
            tracing::debug!(target: "taiko::driver", "skipping genesis proposal");
            return Ok(ProposalOutcome::Continue)
        }

        if !self.tracker.triggered() {
            let l1_current = self.state.l1_current();
            let l2_head = self.l2.l2_head().await?.number;
            let result = self
                .reorg
                .check_reorg(&l1_current, l2_head, self.last_inserted_block_id, meta.first_block_id())
                .await?;

            if let (true, Some(l1_current_to_reset)) =
                (result.is_reorged, result.l1_current_to_reset)
            {
                tracing::warn!(
                    target: "taiko::driver",
                    l1_current_old = %BlockInfo::from(&l1_current),
                    l1_current_new = %BlockInfo::from(&l1_current_to_reset),
                    last_inserted_block_id_old = ?self.last_inserted_block_id,
                    last_inserted_block_id_new = ?result.last_handled_block_id_to_reset,
                    "reorg detected"
                );
                self.state.set_l1_current(l1_current_to_reset);
                self.reset_last_inserted(result.last_handled_block_id_to_reset).await?;
                return Ok(ProposalOutcome::Reorged)
            }
        }

        if self.is_replayed(meta) {
            tracing::debug!(
                target: "taiko::driver",
                last_inserted_block_id = ?self.last_inserted_block_id,
                last_inserted_batch_id = ?self.last_inserted_batch_id,
                "skipping already inserted proposal"
            );
            return Ok(ProposalOutcome::Continue)
        }

        let timestamp = meta.last_block_timestamp();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        if timestamp > now {
            tracing::info!(target: "taiko::driver", timestamp, now, "waiting for the proposal timestamp");
            tokio::time::sleep(Duration::from_secs(timestamp - now)).await;
        }

        self.inserter.insert_blocks(meta).await?;

        self.last_inserted_block_id = Some(meta.last_block_id());
        if let ProposalMetadata::Pacaya(meta) = meta {
            self.last_inserted_batch_id = Some(meta.batch_id);
        }
        self.metrics.l2_head_height.set(meta.last_block_id() as f64);
        if self.tracker.triggered() {
            self.tracker.clear_meta();
        }
        Ok(ProposalOutcome::Continue)
    }

    /// Returns true if the proposal is at or below the last inserted one.
    fn is_replayed(&self, meta: &ProposalMetadata) -> bool {
        match (self.replay_guard, meta) {
            (ReplayGuard::BatchId, ProposalMetadata::Pacaya(meta)) => {
                self.last_inserted_batch_id.is_some_and(|id| meta.batch_id <= id)
            }
            _ => self.last_inserted_block_id.is_some_and(|id| meta.last_block_id() <= id),
        }
    }

    /// Rewinds the replay guard to the last block left untouched by a reorg.
    async fn reset_last_inserted(&mut self, block_id: Option<u64>) -> Result<(), DriverError> {
        self.last_inserted_block_id = block_id;
        self.last_inserted_batch_id = match block_id {
            Some(id) if id > 0 => {
                self.l2.l1_origin_by_id(id).await?.and_then(|origin| origin.batch_id)
            }
            _ => None,
        };
        Ok(())
    }
}
