use crate::{
    api::{forkchoice_updated, get_payload, new_payload},
    metrics::EngineMetrics,
    BlockBuildParams, EngineError, ForkchoiceState, TaikoEngineApi, TaikoExecutionPayload,
};
use alloy_primitives::B256;
use alloy_rpc_types_engine::{ForkchoiceUpdated, PayloadStatusEnum};
use std::time::Instant;
use tokio::time::Duration;
use tracing::{debug, info, instrument};

const ENGINE_BACKOFF_INTERVAL: Duration = Duration::from_secs(1);

/// Builds L2 blocks through the engine API of the execution engine.
#[derive(Debug, Clone)]
pub struct EngineDriver<EC> {
    /// The engine API client.
    client: EC,
    /// The metrics of the driver.
    metrics: EngineMetrics,
}

impl<EC: TaikoEngineApi> EngineDriver<EC> {
    /// Returns a new [`EngineDriver`].
    pub fn new(client: EC) -> Self {
        Self { client, metrics: EngineMetrics::default() }
    }

    /// Initialize the driver and wait for the engine server to be ready, probing it with a fork
    /// choice update to the current head.
    pub async fn init_and_wait_for_engine(client: EC, head: B256) -> Self {
        let fcs = ForkchoiceState::head_only(head).get_alloy_fcs();

        // wait on engine
        loop {
            match client.forkchoice_updated_v2(fcs, None).await {
                Err(err) => {
                    debug!(target: "taiko::engine", ?err, "waiting on engine client");
                    tokio::time::sleep(ENGINE_BACKOFF_INTERVAL).await;
                }
                Ok(status) => {
                    info!(target: "taiko::engine", payload_status = ?status.payload_status.status, "engine ready");
                    break;
                }
            }
        }

        Self::new(client)
    }

    /// Returns the engine API client.
    pub const fn client(&self) -> &EC {
        &self.client
    }

    /// Builds the block on top of its parent and has the engine execute it, without moving the
    /// canonical head.
    ///
    /// The fork choice update starting the build must be `VALID` and return a payload id, and the
    /// built payload must be `VALID`.
    #[instrument(skip_all, fields(block_id = params.block_id(), parent = %params.parent))]
    pub async fn create_execution_payloads(
        &self,
        params: BlockBuildParams,
    ) -> Result<TaikoExecutionPayload, EngineError> {
        let fcs = ForkchoiceState::head_only(params.parent.hash);
        let attributes = params.into_attributes();

        let update = self.forkchoice_updated(fcs, Some(attributes)).await?;
        if !update.payload_status.status.is_valid() {
            return Err(EngineError::ForkchoiceUpdateStatus(update.payload_status.status))
        }
        let id = update.payload_id.ok_or(EngineError::MissingPayloadId)?;

        let now = Instant::now();
        let payload = get_payload(&self.client, id).await?;
        self.metrics.get_payload_duration.record(now.elapsed().as_secs_f64());
        debug!(
            target: "taiko::engine",
            block = %payload.block_info(),
            transactions = payload.payload_inner.transactions.len(),
            gas_used = payload.payload_inner.gas_used,
            "payload built"
        );

        let status = self.new_payload(payload.clone()).await?;
        if !status.is_valid() {
            return Err(EngineError::NewPayloadStatus(status))
        }

        Ok(payload)
    }

    /// Builds the block with [`Self::create_execution_payloads`] and makes it the canonical head.
    /// The safe and finalized blocks are moved to `verified` when provided.
    pub async fn create_payload_and_set_head(
        &self,
        params: BlockBuildParams,
        verified: Option<B256>,
    ) -> Result<TaikoExecutionPayload, EngineError> {
        let payload = self.create_execution_payloads(params).await?;

        let fcs = ForkchoiceState::with_verified(payload.block_hash(), verified);
        let update = self.forkchoice_updated(fcs, None).await?;
        if !update.payload_status.status.is_valid() {
            return Err(EngineError::ForkchoiceUpdateStatus(update.payload_status.status))
        }

        info!(target: "taiko::engine", block = %payload.block_info(), "new L2 head");
        Ok(payload)
    }

    /// Makes the block the canonical head, truncating every later block. The update must be
    /// `VALID`.
    pub async fn set_head(&self, head: B256) -> Result<(), EngineError> {
        let update = self.forkchoice_updated(ForkchoiceState::head_only(head), None).await?;
        if !update.payload_status.status.is_valid() {
            return Err(EngineError::ForkchoiceUpdateStatus(update.payload_status.status))
        }
        Ok(())
    }

    /// Submits the payload to the execution engine, returning its status.
    pub async fn new_payload(
        &self,
        payload: TaikoExecutionPayload,
    ) -> Result<PayloadStatusEnum, EngineError> {
        let now = Instant::now();
        let status = new_payload(&self.client, payload).await;
        self.metrics.new_payload_duration.record(now.elapsed().as_secs_f64());
        status
    }

    /// Updates the fork choice of the execution engine without payload attributes.
    pub async fn update_forkchoice(
        &self,
        fcs: ForkchoiceState,
    ) -> Result<ForkchoiceUpdated, EngineError> {
        self.forkchoice_updated(fcs, None).await
    }

    async fn forkchoice_updated(
        &self,
        fcs: ForkchoiceState,
        attributes: Option<crate::TaikoPayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, EngineError> {
        let now = Instant::now();
        let update = forkchoice_updated(&self.client, fcs.get_alloy_fcs(), attributes).await;
        self.metrics.forkchoice_updated_duration.record(now.elapsed().as_secs_f64());
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{empty_tx_list, MockL2Node};
    use alloy_primitives::{Address, Bytes, U256};
    use taiko_primitives::{BlockInfo, L1Origin};
    use taiko_providers::{L1OriginProvider, L2ChainProvider};

    fn params(parent: BlockInfo, l1_origin: L1Origin) -> BlockBuildParams {
        BlockBuildParams {
            parent,
            timestamp: parent.number * 2 + 2,
            difficulty: B256::repeat_byte(9),
            fee_recipient: Address::repeat_byte(1),
            gas_limit: 31_000_000,
            base_fee: U256::from(10_000_000),
            extra_data: Bytes::new(),
            l1_origin,
            batch_id: Some(1),
            tx_list: empty_tx_list(),
        }
    }

    #[tokio::test]
    async fn test_should_create_payload_and_set_head() -> eyre::Result<()> {
        // Given
        let node = MockL2Node::new();
        let engine = EngineDriver::new(node.clone());
        let genesis = BlockInfo::from(&node.l2_head().await?);

        // When
        let payload = engine
            .create_payload_and_set_head(params(genesis, L1Origin::new(1, 4, B256::ZERO)), None)
            .await?;

        // Then
        let head = node.l2_head().await?;
        assert_eq!(head.hash, payload.block_hash());
        assert_eq!(head.number, 1);
        assert_eq!(head.parent_hash, genesis.hash);
        let origin = node.l1_origin_by_id(1).await?.expect("origin");
        assert_eq!(origin.l2_block_hash, Some(payload.block_hash()));
        assert_eq!(origin.payload_id(), Some(params(genesis, L1Origin::default()).build_payload_args().id()));
        assert_eq!(node.head_l1_origin().await?.map(|o| o.block_id), Some(1));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_execution_payloads_keeps_head() -> eyre::Result<()> {
        // Given
        let node = MockL2Node::new();
        let engine = EngineDriver::new(node.clone());
        let genesis = BlockInfo::from(&node.l2_head().await?);

        // When
        let payload =
            engine.create_execution_payloads(params(genesis, L1Origin::preconf(1))).await?;

        // Then
        assert_eq!(node.l2_head().await?.number, 0);
        assert!(node.l2_header_by_hash(payload.block_hash()).await?.is_some());

        engine.set_head(payload.block_hash()).await?;
        assert_eq!(node.l2_head().await?.hash, payload.block_hash());

        Ok(())
    }

    #[tokio::test]
    async fn test_should_fail_on_invalid_payload() -> eyre::Result<()> {
        // Given
        let node = MockL2Node::new();
        node.fail_new_payload_at(1);
        let engine = EngineDriver::new(node.clone());
        let genesis = BlockInfo::from(&node.l2_head().await?);

        // When
        let result = engine.create_payload_and_set_head(params(genesis, L1Origin::preconf(1)), None).await;

        // Then
        assert!(matches!(result, Err(EngineError::NewPayloadStatus(PayloadStatusEnum::Invalid { .. }))));
        assert_eq!(node.l2_head().await?.number, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reject_unknown_parent() -> eyre::Result<()> {
        // Given
        let node = MockL2Node::new();
        let engine = EngineDriver::new(node);
        let unknown = BlockInfo::new(5, B256::repeat_byte(5));

        // When
        let result = engine.create_execution_payloads(params(unknown, L1Origin::preconf(6))).await;

        // Then
        assert!(matches!(result, Err(EngineError::ForkchoiceUpdateStatus(PayloadStatusEnum::Syncing))));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_move_safe_and_finalized() -> eyre::Result<()> {
        // Given
        let node = MockL2Node::new();
        let engine = EngineDriver::new(node.clone());
        let genesis = BlockInfo::from(&node.l2_head().await?);

        // When
        engine
            .create_payload_and_set_head(params(genesis, L1Origin::preconf(1)), Some(genesis.hash))
            .await?;

        // Then
        let fcs = node.last_forkchoice_state();
        assert_eq!(fcs.safe_block_hash, genesis.hash);
        assert_eq!(fcs.finalized_block_hash, genesis.hash);

        Ok(())
    }
}
