use crate::L1ProviderError;
use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::SolCall;
use taiko_l1::{Batch, BlockV2, ITaikoInbox, TransitionState, TransitionStateOntake};
use taiko_primitives::VerifiedBlock;

/// Provides the protocol state stored in the Taiko inbox.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc, &)]
pub trait ProtocolProvider: Sync + Send {
    /// Returns the last L2 block verified by the protocol. Queries the Pacaya last verified
    /// transition first, falling back to the Ontake last verified block.
    async fn last_verified_block(&self) -> Result<VerifiedBlock, L1ProviderError>;

    /// Returns the Pacaya batch with the provided id.
    async fn batch(&self, batch_id: u64) -> Result<Batch, L1ProviderError>;

    /// Returns the transition which verified the Pacaya batch.
    async fn batch_verifying_transition(
        &self,
        batch_id: u64,
    ) -> Result<TransitionState, L1ProviderError>;

    /// Returns the Ontake block with the provided id.
    async fn ontake_block(&self, block_id: u64) -> Result<BlockV2, L1ProviderError>;

    /// Returns the transition `transition_id` of the Ontake block.
    async fn ontake_transition(
        &self,
        block_id: u64,
        transition_id: u32,
    ) -> Result<TransitionStateOntake, L1ProviderError>;
}

/// A [`ProtocolProvider`] calling the Taiko inbox contract through an L1 provider.
#[derive(Debug, Clone)]
pub struct TaikoInboxClient<P> {
    provider: P,
    inbox: Address,
}

impl<P: Provider> TaikoInboxClient<P> {
    /// Returns a new [`TaikoInboxClient`] for the inbox at the provided address.
    pub const fn new(provider: P, inbox: Address) -> Self {
        Self { provider, inbox }
    }

    /// Returns the address of the inbox.
    pub const fn inbox(&self) -> Address {
        self.inbox
    }

    async fn call<C: SolCall + Send + Sync>(&self, call: C) -> Result<C::Return, L1ProviderError> {
        let request = TransactionRequest::default().to(self.inbox).input(call.abi_encode().into());
        let output = self.provider.call(request).await?;
        Ok(C::abi_decode_returns(&output)?)
    }
}

#[async_trait::async_trait]
impl<P: Provider> ProtocolProvider for TaikoInboxClient<P> {
    async fn last_verified_block(&self) -> Result<VerifiedBlock, L1ProviderError> {
        match self.call(ITaikoInbox::getLastVerifiedTransitionCall {}).await {
            Ok(transition) => Ok(VerifiedBlock {
                batch_id: Some(transition.batchId),
                block_id: transition.blockId,
                block_hash: transition.ts.blockHash,
            }),
            Err(err) => {
                tracing::debug!(target: "taiko::providers", ?err, "no Pacaya verified transition, querying Ontake");
                let block = self.call(ITaikoInbox::getLastVerifiedBlockCall {}).await?;
                Ok(VerifiedBlock { batch_id: None, block_id: block.blockId, block_hash: block.blockHash })
            }
        }
    }

    async fn batch(&self, batch_id: u64) -> Result<Batch, L1ProviderError> {
        self.call(ITaikoInbox::getBatchCall { batchId: batch_id }).await
    }

    async fn batch_verifying_transition(
        &self,
        batch_id: u64,
    ) -> Result<TransitionState, L1ProviderError> {
        self.call(ITaikoInbox::getBatchVerifyingTransitionCall { batchId: batch_id }).await
    }

    async fn ontake_block(&self, block_id: u64) -> Result<BlockV2, L1ProviderError> {
        self.call(ITaikoInbox::getBlockV2Call { blockId: block_id }).await
    }

    async fn ontake_transition(
        &self,
        block_id: u64,
        transition_id: u32,
    ) -> Result<TransitionStateOntake, L1ProviderError> {
        self.call(ITaikoInbox::getTransitionCall { blockId: block_id, tid: transition_id }).await
    }
}
