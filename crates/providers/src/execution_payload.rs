use alloy_eips::BlockId;
use alloy_provider::Provider;
use alloy_rpc_types_engine::{ExecutionPayload, ExecutionPayloadInputV2};
use alloy_transport::{RpcError, TransportErrorKind};

/// An error occurring at the [`ExecutionPayloadProvider`].
#[derive(Debug, thiserror::Error)]
pub enum ExecutionPayloadProviderError {
    /// An error occurred at the transport layer.
    #[error("transport error: {0}")]
    Rpc(#[from] RpcError<TransportErrorKind>),
}

/// Implementers of the trait can provide the execution payload of an L2 block, used to point the
/// execution engine at a beacon sync target fetched from a checkpoint node.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc, &)]
pub trait ExecutionPayloadProvider: Sync + Send {
    /// Returns the [`ExecutionPayloadInputV2`] for the provided [`BlockId`], or [None].
    async fn execution_payload_by_block(
        &self,
        block_id: BlockId,
    ) -> Result<Option<ExecutionPayloadInputV2>, ExecutionPayloadProviderError>;
}

/// The provider uses an [`Provider`] internally to implement the [`ExecutionPayloadProvider`]
/// trait.
#[derive(Default, Clone, Debug)]
pub struct AlloyExecutionPayloadProvider<P> {
    provider: P,
}

impl<P: Provider> AlloyExecutionPayloadProvider<P> {
    /// Returns a new instance of a [`AlloyExecutionPayloadProvider`].
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl<P: Provider> ExecutionPayloadProvider for AlloyExecutionPayloadProvider<P> {
    async fn execution_payload_by_block(
        &self,
        block_id: BlockId,
    ) -> Result<Option<ExecutionPayloadInputV2>, ExecutionPayloadProviderError> {
        tracing::trace!(target: "taiko::providers", ?block_id, "fetching checkpoint execution payload");

        let block = self.provider.get_block(block_id).full().await?;
        Ok(block.map(|block| {
            let block = block.into_consensus().map_transactions(|tx| tx.inner.into_inner());
            into_payload_input(ExecutionPayload::from_block_slow(&block).0)
        }))
    }
}

/// Flattens the payload into the shape accepted by `engine_newPayloadV2`.
fn into_payload_input(payload: ExecutionPayload) -> ExecutionPayloadInputV2 {
    match payload {
        ExecutionPayload::V1(payload) => {
            ExecutionPayloadInputV2 { execution_payload: payload, withdrawals: None }
        }
        ExecutionPayload::V2(payload) => ExecutionPayloadInputV2 {
            execution_payload: payload.payload_inner,
            withdrawals: Some(payload.withdrawals),
        },
        ExecutionPayload::V3(payload) => ExecutionPayloadInputV2 {
            execution_payload: payload.payload_inner.payload_inner,
            withdrawals: Some(payload.payload_inner.withdrawals),
        },
    }
}
