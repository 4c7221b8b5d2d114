use super::{
    common::{assemble_tx_list, SyncedParent},
    BlocksInserter,
};
use crate::DriverError;
use alloy_consensus::{constants::EMPTY_OMMER_ROOT_HASH, TxEnvelope};
use alloy_primitives::{Bytes, B256, U256};
use alloy_rpc_types_eth::Header;
use taiko_engine::{BlockBuildParams, TaikoEngineApi};
use taiko_primitives::{pacaya_difficulty, BlockInfo, L1Origin, PacayaMetadata, ANCHOR_V3_GAS_LIMIT};
use taiko_providers::{
    BlobProvider, L1ChainProvider, L1OriginProvider, L2Block, L2ChainProvider, ProtocolProvider,
};

impl<L1, P, B, L2, EC> BlocksInserter<L1, P, B, L2, EC>
where
    L1: L1ChainProvider,
    P: ProtocolProvider,
    B: BlobProvider,
    L2: L2ChainProvider + L1OriginProvider,
    EC: TaikoEngineApi,
{
    /// Inserts the L2 blocks of a Pacaya batch, in order. A batch whose blocks are all already
    /// canonical, as inserted from preconfirmations, only gets its L1 origins rewritten.
    pub(super) async fn insert_pacaya(
        &self,
        meta: &PacayaMetadata,
        tx_list: &Bytes,
    ) -> Result<(), DriverError> {
        let parent = match self.synced_parent(meta.last_block_id).await? {
            SyncedParent::AlreadySynced => return Ok(()),
            SyncedParent::Target(header) => header,
            SyncedParent::Untriggered => {
                let number = self.pacaya_parent_number(meta).await?;
                self.l2_header(number).await?
            }
        };

        let txs = self.decompressor.try_decompress(tx_list, !meta.blob_hashes.is_empty(), true);
        let anchor_state_root = self.anchor_state_root(meta.anchor_block_hash).await?;

        if let Some(headers) =
            self.known_canonical_batch(meta, &txs, &parent, anchor_state_root).await?
        {
            self.update_l1_origins(meta, &headers).await?;
            tracing::info!(
                target: "taiko::driver",
                batch_id = meta.batch_id,
                last_block_id = meta.last_block_id,
                "batch already canonical, L1 origins updated"
            );
            return Ok(())
        }

        if let Err(err) = self.build_pacaya_blocks(meta, &txs, parent.clone(), anchor_state_root).await
        {
            tracing::warn!(
                target: "taiko::driver",
                batch_id = meta.batch_id,
                %err,
                "batch insertion failed, rewinding L2 head to the batch parent"
            );
            self.engine.set_head(parent.hash).await?;
            self.metrics.l2_head_height.set(parent.number as f64);
            return Err(err)
        }
        Ok(())
    }

    /// Builds every block of the batch on top of `parent`, stopping at the first failure.
    async fn build_pacaya_blocks(
        &self,
        meta: &PacayaMetadata,
        txs: &[TxEnvelope],
        mut parent: Header,
        anchor_state_root: B256,
    ) -> Result<(), DriverError> {
        for index in 0..meta.blocks.len() {
            let (params, _) =
                self.assemble_pacaya_block(meta, txs, &parent, index, anchor_state_root).await?;
            let verified = self.verified_block_hash(params.block_id()).await?;
            let payload = self.engine.create_payload_and_set_head(params, verified).await?;

            parent = self.wait_l2_header(payload.block_number()).await?;
            self.metrics.l2_head_height.set(parent.number as f64);
            tracing::info!(
                target: "taiko::driver",
                block = %BlockInfo::from(&parent),
                batch_id = meta.batch_id,
                index,
                transactions = payload.payload_inner.transactions.len(),
                "new Pacaya block inserted"
            );
        }
        Ok(())
    }

    /// Returns the number of the parent of the first block of the batch: the last block of the
    /// previous batch, or the last Ontake block for the first Pacaya batch.
    async fn pacaya_parent_number(&self, meta: &PacayaMetadata) -> Result<u64, DriverError> {
        if meta.batch_id == self.fork_heights.pacaya {
            return Ok(meta.batch_id.saturating_sub(1))
        }
        Ok(self.protocol.batch(meta.batch_id.saturating_sub(1)).await?.lastBlockId)
    }

    /// Assembles the block at `index` in the batch on top of `parent`, returning its build
    /// parameters and anchor transaction.
    async fn assemble_pacaya_block(
        &self,
        meta: &PacayaMetadata,
        txs: &[TxEnvelope],
        parent: &Header,
        index: usize,
        anchor_state_root: B256,
    ) -> Result<(BlockBuildParams, TxEnvelope), DriverError> {
        let block_id = parent.number + 1;
        let timestamp = meta.block_timestamp(index);
        let base_fee = self.l2.base_fee(parent, timestamp, meta.base_fee_config).await?;
        let signal_slots =
            meta.blocks.get(index).map(|block| block.signal_slots.clone()).unwrap_or_default();
        let anchor_tx = self
            .anchor
            .assemble_anchor_v3_tx(
                parent,
                meta.anchor_block_id,
                anchor_state_root,
                meta.base_fee_config,
                signal_slots,
                base_fee,
            )
            .await?;

        let mut l1_origin = L1Origin::new(block_id, meta.raw_block_height, meta.raw_block_hash);
        l1_origin.batch_id = Some(meta.batch_id);
        l1_origin.end_of_block = index + 1 == meta.blocks.len();

        let range = meta.block_transactions(index, txs.len());
        let params = BlockBuildParams {
            parent: BlockInfo::from(parent),
            timestamp,
            difficulty: pacaya_difficulty(block_id),
            fee_recipient: meta.coinbase,
            gas_limit: meta.gas_limit as u64 + ANCHOR_V3_GAS_LIMIT,
            base_fee,
            extra_data: meta.extra_data.clone(),
            l1_origin,
            batch_id: Some(meta.batch_id),
            tx_list: assemble_tx_list(anchor_tx.clone(), &txs[range]),
        };
        Ok((params, anchor_tx))
    }

    /// Returns the headers of the batch blocks if every one of them is already canonical with
    /// the content the batch describes.
    async fn known_canonical_batch(
        &self,
        meta: &PacayaMetadata,
        txs: &[TxEnvelope],
        parent: &Header,
        anchor_state_root: B256,
    ) -> Result<Option<Vec<Header>>, DriverError> {
        let mut parent = parent.clone();
        let mut headers = Vec::with_capacity(meta.blocks.len());

        for index in 0..meta.blocks.len() {
            let Some(block) = self.l2.l2_block_by_number(parent.number + 1).await? else {
                return Ok(None)
            };
            let (params, anchor_tx) =
                self.assemble_pacaya_block(meta, txs, &parent, index, anchor_state_root).await?;
            let origin = self.l2.l1_origin_by_id(params.block_id()).await?;

            if let Some(mismatch) = block_mismatch(&block, origin.as_ref(), &params, &anchor_tx) {
                tracing::debug!(
                    target: "taiko::driver",
                    block_id = params.block_id(),
                    batch_id = meta.batch_id,
                    mismatch,
                    "batch is not canonical"
                );
                return Ok(None)
            }
            parent = block.header.clone();
            headers.push(block.header);
        }
        Ok(Some(headers))
    }

    /// Rewrites the L1 origins of the canonical batch blocks, preserving the payload id,
    /// signature and forced inclusion flag of the existing origins.
    async fn update_l1_origins(
        &self,
        meta: &PacayaMetadata,
        headers: &[Header],
    ) -> Result<(), DriverError> {
        for (index, header) in headers.iter().enumerate() {
            let is_last = index + 1 == headers.len();
            let mut origin = L1Origin::new(header.number, meta.raw_block_height, meta.raw_block_hash);
            origin.l2_block_hash = Some(header.hash);
            origin.batch_id = Some(meta.batch_id);
            origin.end_of_block = is_last;
            if let Some(existing) = self.l2.l1_origin_by_id(header.number).await? {
                origin.build_payload_args_id = existing.build_payload_args_id;
                origin.signature = existing.signature;
                origin.is_forced_inclusion = existing.is_forced_inclusion;
            }
            self.l2.update_l1_origin(&origin).await?;

            if is_last {
                self.l2.set_head_l1_origin(header.number).await?;
                self.l2.set_batch_to_last_block(meta.batch_id, header.number).await?;
            }
        }
        Ok(())
    }
}

/// Returns the first field in which the existing block differs from the block the build
/// parameters describe.
fn block_mismatch(
    block: &L2Block,
    origin: Option<&L1Origin>,
    params: &BlockBuildParams,
    anchor_tx: &TxEnvelope,
) -> Option<&'static str> {
    let header = &block.header;
    let first_tx = block.transactions.as_transactions().and_then(|txs| txs.first());

    if origin
        .and_then(L1Origin::payload_id)
        .is_some_and(|id| id != params.build_payload_args().id())
    {
        return Some("payload id")
    }
    if header.parent_hash != params.parent.hash {
        return Some("parent hash")
    }
    if first_tx.map(|tx| tx.tx_hash()) != Some(anchor_tx.tx_hash()) {
        return Some("anchor transaction")
    }
    if header.ommers_hash != EMPTY_OMMER_ROOT_HASH {
        return Some("uncle hash")
    }
    if header.beneficiary != params.fee_recipient {
        return Some("coinbase")
    }
    if header.difficulty != U256::ZERO {
        return Some("difficulty")
    }
    if header.mix_hash != params.difficulty {
        return Some("mix hash")
    }
    if header.number != params.block_id() {
        return Some("number")
    }
    if header.gas_limit != params.gas_limit {
        return Some("gas limit")
    }
    if header.timestamp != params.timestamp {
        return Some("timestamp")
    }
    if header.extra_data != params.extra_data {
        return Some("extra data")
    }
    if header.base_fee_per_gas.map(U256::from) != Some(params.base_fee) {
        return Some("base fee")
    }
    if block.withdrawals.as_ref().is_some_and(|withdrawals| !withdrawals.is_empty()) {
        return Some("withdrawals")
    }
    None
}
