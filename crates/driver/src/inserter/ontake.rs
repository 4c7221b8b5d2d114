use super::{
    common::{assemble_tx_list, SyncedParent},
    BlocksInserter,
};
use crate::DriverError;
use alloy_primitives::Bytes;
use taiko_engine::{BlockBuildParams, TaikoEngineApi};
use taiko_primitives::{BlockInfo, L1Origin, OntakeMetadata, ANCHOR_GAS_LIMIT};
use taiko_providers::{
    BlobProvider, L1ChainProvider, L1OriginProvider, L2ChainProvider, ProtocolProvider,
};

impl<L1, P, B, L2, EC> BlocksInserter<L1, P, B, L2, EC>
where
    L1: L1ChainProvider,
    P: ProtocolProvider,
    B: BlobProvider,
    L2: L2ChainProvider + L1OriginProvider,
    EC: TaikoEngineApi,
{
    /// Inserts the single L2 block of an Ontake proposal.
    pub(super) async fn insert_ontake(
        &self,
        meta: &OntakeMetadata,
        tx_list: &Bytes,
    ) -> Result<(), DriverError> {
        let parent = match self.synced_parent(meta.block_id).await? {
            SyncedParent::AlreadySynced => return Ok(()),
            SyncedParent::Target(header) => header,
            SyncedParent::Untriggered => self.l2_header(meta.block_id.saturating_sub(1)).await?,
        };

        let txs = self.decompressor.try_decompress(tx_list, meta.blob_used, false);
        let base_fee =
            self.l2.base_fee(&parent, meta.timestamp, meta.base_fee_config).await?;
        let anchor_state_root = self.anchor_state_root(meta.anchor_block_hash).await?;
        let anchor_tx = self
            .anchor
            .assemble_anchor_v2_tx(
                &parent,
                meta.anchor_block_id,
                anchor_state_root,
                meta.base_fee_config,
                base_fee,
            )
            .await?;

        let block_id = parent.number + 1;
        let params = BlockBuildParams {
            parent: BlockInfo::from(&parent),
            timestamp: meta.timestamp,
            difficulty: meta.difficulty,
            fee_recipient: meta.coinbase,
            gas_limit: meta.gas_limit as u64 + ANCHOR_GAS_LIMIT,
            base_fee,
            extra_data: meta.extra_data.clone(),
            l1_origin: L1Origin::new(block_id, meta.raw_block_height, meta.raw_block_hash),
            batch_id: None,
            tx_list: assemble_tx_list(anchor_tx, &txs),
        };

        let verified = self.verified_block_hash(block_id).await?;
        let payload = self.engine.create_payload_and_set_head(params, verified).await?;
        self.metrics.l2_head_height.set(payload.block_number() as f64);

        tracing::info!(
            target: "taiko::driver",
            block = %payload.block_info(),
            transactions = txs.len(),
            l1_height = meta.raw_block_height,
            "new Ontake block inserted"
        );
        Ok(())
    }
}
