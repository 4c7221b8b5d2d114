use super::not_found_to_none;
use crate::{L2ProviderError, TaikoL2Client};
use alloy_primitives::U256;
use alloy_provider::Provider;
use taiko_primitives::L1Origin;

/// Reads and writes the [`L1Origin`] records the execution engine stores for each L2 block.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc, &)]
pub trait L1OriginProvider: Sync + Send {
    /// Returns the L1 origin of the L2 head derived from L1.
    async fn head_l1_origin(&self) -> Result<Option<L1Origin>, L2ProviderError>;

    /// Returns the L1 origin of the L2 block.
    async fn l1_origin_by_id(&self, block_id: u64) -> Result<Option<L1Origin>, L2ProviderError>;

    /// Returns the L1 origin of the last block of the batch.
    async fn last_l1_origin_by_batch_id(
        &self,
        batch_id: u64,
    ) -> Result<Option<L1Origin>, L2ProviderError>;

    /// Returns the id of the last block of the batch.
    async fn last_block_id_by_batch_id(&self, batch_id: u64)
        -> Result<Option<u64>, L2ProviderError>;

    /// Writes the L1 origin of a block.
    async fn update_l1_origin(&self, origin: &L1Origin) -> Result<(), L2ProviderError>;

    /// Marks the block as the head derived from L1.
    async fn set_head_l1_origin(&self, block_id: u64) -> Result<(), L2ProviderError>;

    /// Records the block as the last block of the batch.
    async fn set_batch_to_last_block(
        &self,
        batch_id: u64,
        block_id: u64,
    ) -> Result<(), L2ProviderError>;
}

#[async_trait::async_trait]
impl<P: Provider> L1OriginProvider for TaikoL2Client<P> {
    async fn head_l1_origin(&self) -> Result<Option<L1Origin>, L2ProviderError> {
        not_found_to_none(self.provider().client().request_noparams("taiko_headL1Origin").await)
    }

    async fn l1_origin_by_id(&self, block_id: u64) -> Result<Option<L1Origin>, L2ProviderError> {
        not_found_to_none(
            self.provider().client().request("taiko_l1OriginByID", (U256::from(block_id),)).await,
        )
    }

    async fn last_l1_origin_by_batch_id(
        &self,
        batch_id: u64,
    ) -> Result<Option<L1Origin>, L2ProviderError> {
        not_found_to_none(
            self.provider()
                .client()
                .request("taiko_lastL1OriginByBatchID", (U256::from(batch_id),))
                .await,
        )
    }

    async fn last_block_id_by_batch_id(
        &self,
        batch_id: u64,
    ) -> Result<Option<u64>, L2ProviderError> {
        let block_id: Option<U256> = not_found_to_none(
            self.provider()
                .client()
                .request("taiko_lastBlockIDByBatchID", (U256::from(batch_id),))
                .await,
        )?;
        Ok(block_id.map(|id| id.saturating_to()))
    }

    async fn update_l1_origin(&self, origin: &L1Origin) -> Result<(), L2ProviderError> {
        tracing::trace!(target: "taiko::providers", block_id = origin.block_id, "updating L1 origin");
        let _: Option<L1Origin> =
            self.auth().client().request("taikoAuth_updateL1Origin", (origin.clone(),)).await?;
        Ok(())
    }

    async fn set_head_l1_origin(&self, block_id: u64) -> Result<(), L2ProviderError> {
        let _: Option<U256> = self
            .auth()
            .client()
            .request("taikoAuth_setHeadL1Origin", (U256::from(block_id),))
            .await?;
        Ok(())
    }

    async fn set_batch_to_last_block(
        &self,
        batch_id: u64,
        block_id: u64,
    ) -> Result<(), L2ProviderError> {
        let _: Option<U256> = self
            .auth()
            .client()
            .request("taikoAuth_setBatchToLastBlock", (U256::from(batch_id), U256::from(block_id)))
            .await?;
        Ok(())
    }
}
