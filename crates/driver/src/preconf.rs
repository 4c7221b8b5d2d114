//! The handler behind the preconfirmation API: validates the requests, caches the envelopes and
//! inserts the blocks through the shared [`BlocksInserter`].

use crate::{BlocksInserter, DriverConfig, DriverError, SyncProgressTracker};
use alloy_primitives::B256;
use alloy_rpc_types_eth::Header;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use taiko_engine::TaikoEngineApi;
use taiko_preconf::{
    BuildPreconfBlockRequest, BuildPreconfBlockResponse, Envelope, EnvelopeQueue, PayloadQueue,
    PreconfError, PreconfMetrics, PreconfStatus, PreconfValidator,
};
use taiko_primitives::BlockInfo;
use taiko_providers::{
    BlobProvider, L1ChainProvider, L1OriginProvider, L2ChainProvider, ProtocolProvider,
};

/// Builds preconfirmation blocks from the requests of the preconfirmation API.
#[derive(Debug)]
pub struct PreconfBlockHandler<L1, P, B, L2, EC> {
    /// The blocks inserter, shared with the chain syncer.
    inserter: Arc<BlocksInserter<L1, P, B, L2, EC>>,
    /// The beacon sync tracker.
    tracker: Arc<SyncProgressTracker<L2>>,
    /// The request validator.
    validator: PreconfValidator,
    /// The envelopes received, competing forks included.
    envelopes: EnvelopeQueue,
    /// The payloads of the inserted blocks.
    payloads: PayloadQueue,
    /// The highest preconfirmation block received.
    highest_unsafe_block_id: AtomicU64,
    /// The metrics of the preconfirmations.
    metrics: PreconfMetrics,
}

impl<L1, P, B, L2, EC> PreconfBlockHandler<L1, P, B, L2, EC>
where
    L1: L1ChainProvider,
    P: ProtocolProvider,
    B: BlobProvider,
    L2: L2ChainProvider + L1OriginProvider,
    EC: TaikoEngineApi,
{
    /// Returns a new [`PreconfBlockHandler`].
    pub fn new(
        inserter: Arc<BlocksInserter<L1, P, B, L2, EC>>,
        tracker: Arc<SyncProgressTracker<L2>>,
        config: &DriverConfig,
    ) -> Self {
        Self {
            inserter,
            tracker,
            validator: PreconfValidator {
                pacaya_fork_height: config.fork_heights.pacaya,
                anchor: config.anchor,
                max_tx_list_bytes: config.max_tx_list_bytes,
            },
            envelopes: EnvelopeQueue::default(),
            payloads: PayloadQueue::default(),
            highest_unsafe_block_id: AtomicU64::new(0),
            metrics: PreconfMetrics::default(),
        }
    }

    /// Handles a `POST /preconfBlocks` body, returning the header of the inserted block.
    pub async fn build_preconf_block(
        &self,
        body: &[u8],
    ) -> Result<BuildPreconfBlockResponse, PreconfError> {
        let result = match BuildPreconfBlockRequest::from_json(body) {
            Ok(request) => self.build(&request).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            self.metrics.rejected_requests.increment(1);
            tracing::warn!(target: "taiko::preconf", %err, status = err.status_code(), "preconfirmation request rejected");
        }
        result
    }

    async fn build(
        &self,
        request: &BuildPreconfBlockRequest,
    ) -> Result<BuildPreconfBlockResponse, PreconfError> {
        if self.engine_syncing().await? {
            return Err(PreconfError::EngineSyncing)
        }

        let envelope = self.validator.validate(request)?;
        let number = envelope.number();
        self.highest_unsafe_block_id.fetch_max(number, Ordering::Relaxed);

        let parent_hash = envelope.parent_hash();
        let parent = self
            .inserter
            .l2()
            .l2_header_by_hash(parent_hash)
            .await
            .map_err(|err| PreconfError::ParentLookup { hash: parent_hash, message: err.to_string() })?;
        if parent.is_none() {
            self.envelopes.put(number, envelope);
            return Err(PreconfError::ParentLookup {
                hash: parent_hash,
                message: "parent not found, envelope cached".to_string(),
            })
        }

        let header = self.insert(Arc::new(envelope.clone())).await?;
        let mut envelope = envelope;
        envelope.payload.block_hash = header.hash;
        self.payloads.put(number, envelope.payload.clone());
        self.envelopes.put(number, envelope);

        Ok(BuildPreconfBlockResponse { block_header: header })
    }

    /// Inserts the longest chain of cached envelopes extending the L2 head, returning the headers
    /// of the inserted blocks.
    pub async fn import_pending_blocks_from_cache(&self) -> Result<Vec<Header>, PreconfError> {
        let head = self.inserter.l2().l2_head().await.map_err(insert_error)?;
        let children = self.envelopes.get_children(head.number, head.hash);
        if children.is_empty() {
            return Ok(vec![])
        }

        tracing::info!(
            target: "taiko::preconf",
            head = %BlockInfo::from(&head),
            blocks = children.len(),
            "importing cached preconfirmation blocks"
        );
        let headers = self
            .inserter
            .insert_preconf_blocks_from_execution_payloads(&children)
            .await
            .map_err(insert_error)?;
        for (envelope, header) in children.iter().zip(&headers) {
            let mut payload = envelope.payload.clone();
            payload.block_hash = header.hash;
            self.payloads.put(header.number, payload);
        }
        Ok(headers)
    }

    /// Handles a `DELETE /preconfBlocks` request, truncating the L2 chain to the block.
    pub async fn remove_preconf_blocks(&self, new_last_block_id: u64) -> Result<Header, PreconfError> {
        self.inserter.remove_preconf_blocks(new_last_block_id).await.map_err(insert_error)
    }

    /// Returns the preconfirmation status of the node.
    pub fn status(&self) -> PreconfStatus {
        PreconfStatus {
            total_cached: self.envelopes.total_cached(),
            highest_unsafe_l2_payload_block_id: self.highest_unsafe_block_id.load(Ordering::Relaxed),
        }
    }

    /// Returns true if the payload of the inserted block is cached.
    pub fn has_payload(&self, number: u64, hash: B256) -> bool {
        self.payloads.has(number, hash)
    }

    async fn insert(&self, envelope: Arc<Envelope>) -> Result<Header, PreconfError> {
        let headers = self
            .inserter
            .insert_preconf_blocks_from_execution_payloads(&[envelope])
            .await
            .map_err(insert_error)?;
        headers.into_iter().next().ok_or_else(|| PreconfError::Insert("no block inserted".to_string()))
    }

    /// Returns true while the engine is P2P syncing or a triggered beacon sync is not finished.
    async fn engine_syncing(&self) -> Result<bool, PreconfError> {
        if self.tracker.triggered() && !self.tracker.finished() {
            return Ok(true)
        }
        let progress = self.inserter.l2().sync_progress().await.map_err(insert_error)?;
        Ok(progress.is_some())
    }
}

fn insert_error(err: impl Into<DriverError>) -> PreconfError {
    PreconfError::Insert(err.into().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{transfers, DriverHarness, MockPreconfBlockHandler};
    use taiko_primitives::SyncProgress;

    /// Returns a handler over a harness whose L1 holds a block to anchor to.
    fn handler(harness: &DriverHarness) -> eyre::Result<MockPreconfBlockHandler> {
        harness.l1.push_block(vec![]);
        let inserter = harness.inserter(harness.tracker())?;
        Ok(harness.preconf_handler(inserter))
    }

    async fn body(harness: &DriverHarness, parent: &Header, nonce: u64) -> eyre::Result<Vec<u8>> {
        let request = harness.preconf_request(parent, 1, &transfers(nonce, 2)).await?;
        Ok(serde_json::to_vec(&request)?)
    }

    #[tokio::test]
    async fn test_should_insert_preconf_block() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        let handler = handler(&harness)?;
        let genesis = harness.l2_header(0).await?;

        // When
        let response = handler.build_preconf_block(&body(&harness, &genesis, 0).await?).await?;

        // Then
        let header = response.block_header;
        assert_eq!(header.number, 1);
        assert_eq!(header.parent_hash, genesis.hash);
        assert_eq!(harness.l2.canonical_hash(1), Some(header.hash));
        assert_eq!(harness.l2.transactions(header.hash).map(|txs| txs.len()), Some(3));
        assert!(harness.l2.l1_origin_by_id(1).await?.is_some_and(|origin| origin.is_preconf_block()));
        assert!(handler.has_payload(1, header.hash));
        assert_eq!(
            handler.status(),
            PreconfStatus { total_cached: 1, highest_unsafe_l2_payload_block_id: 1 }
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_should_adopt_preconf_block_proposed_in_batch() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        let handler = handler(&harness)?;
        let genesis = harness.l2_header(0).await?;
        let header = handler.build_preconf_block(&body(&harness, &genesis, 0).await?).await?.block_header;
        let payloads = harness.l2.new_payloads();

        // When
        let l1_block = harness.propose_batch(1, &[2], &transfers(0, 2)).await?;
        let (mut syncer, _) = harness.chain_syncer().await?;
        syncer.sync().await?;

        // Then
        assert_eq!(harness.l2.new_payloads(), payloads);
        assert_eq!(harness.l2.canonical_hash(1), Some(header.hash));
        let origin = harness.l2.l1_origin_by_id(1).await?.unwrap();
        assert_eq!(origin.l1_block_hash, Some(l1_block.hash));
        assert_eq!(origin.l2_block_hash, Some(header.hash));
        assert_eq!(origin.batch_id, Some(1));
        assert_eq!(harness.l2.head_l1_origin().await?.map(|origin| origin.block_id), Some(1));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reject_preconf_block_behind_head_origin() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        harness.propose_batch(1, &[1], &transfers(0, 1)).await?;
        let (mut syncer, inserter) = harness.chain_syncer().await?;
        syncer.sync().await?;
        let handler = harness.preconf_handler(inserter);
        let genesis = harness.l2_header(0).await?;
        let head = harness.l2_header(1).await?;

        // When
        let result = handler.build_preconf_block(&body(&harness, &genesis, 0).await?).await;

        // Then
        let err = result.unwrap_err();
        assert!(matches!(err, PreconfError::Insert(_)));
        assert_eq!(err.status_code(), 500);
        assert_eq!(harness.l2.canonical_hash(1), Some(head.hash));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_cache_envelope_with_unknown_parent() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        let handler = handler(&harness)?;
        let mut parent = harness.l2_header(0).await?;
        parent.hash = B256::repeat_byte(0x42);

        // When
        let result = handler.build_preconf_block(&body(&harness, &parent, 0).await?).await;

        // Then
        assert!(matches!(result, Err(PreconfError::ParentLookup { hash, .. }) if hash == parent.hash));
        assert_eq!(handler.status().total_cached, 1);
        assert_eq!(harness.l2.head_number(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reimport_removed_blocks_from_cache() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        let handler = handler(&harness)?;
        let genesis = harness.l2_header(0).await?;
        let first = handler.build_preconf_block(&body(&harness, &genesis, 0).await?).await?.block_header;
        let second = handler.build_preconf_block(&body(&harness, &first, 2).await?).await?.block_header;

        // When
        let head = handler.remove_preconf_blocks(1).await?;

        // Then
        assert_eq!(head.hash, first.hash);
        assert_eq!(harness.l2.head_number(), 1);

        // When
        let imported = handler.import_pending_blocks_from_cache().await?;

        // Then
        assert_eq!(imported.iter().map(|header| header.hash).collect::<Vec<_>>(), vec![second.hash]);
        assert_eq!(harness.l2.canonical_hash(2), Some(second.hash));
        assert!(handler.import_pending_blocks_from_cache().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_should_refuse_removing_blocks_below_head_origin() -> eyre::Result<()> {
        let harness = DriverHarness::new();
        harness.propose_batch(1, &[1, 1], &transfers(0, 2)).await?;
        let (mut syncer, inserter) = harness.chain_syncer().await?;
        syncer.sync().await?;
        let handler = harness.preconf_handler(inserter);

        let err = handler.remove_preconf_blocks(1).await.unwrap_err();

        assert_eq!(err.status_code(), 500);
        assert_eq!(harness.l2.head_number(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reject_requests_while_engine_syncing() -> eyre::Result<()> {
        // Given
        let harness = DriverHarness::new();
        let handler = handler(&harness)?;
        let genesis = harness.l2_header(0).await?;
        harness.l2.set_sync_progress(Some(SyncProgress {
            current_block: 10,
            highest_block: 100,
            ..Default::default()
        }));

        // When
        let result = handler.build_preconf_block(&body(&harness, &genesis, 0).await?).await;

        // Then
        assert!(matches!(result, Err(PreconfError::EngineSyncing)));
        assert_eq!(handler.status().total_cached, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reject_undecodable_body() -> eyre::Result<()> {
        let harness = DriverHarness::new();
        let handler = handler(&harness)?;

        let err = handler.build_preconf_block(b"{\"executableData\":").await.unwrap_err();

        assert!(matches!(err, PreconfError::InvalidBody(_)));
        assert_eq!(err.status_code(), 422);

        Ok(())
    }
}
