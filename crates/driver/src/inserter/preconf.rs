use super::BlocksInserter;
use crate::DriverError;
use alloy_primitives::Bytes;
use alloy_rpc_types_engine::ExecutionPayloadV1;
use alloy_rpc_types_eth::Header;
use std::sync::Arc;
use taiko_codec::decompress;
use taiko_engine::{BlockBuildParams, TaikoEngineApi};
use taiko_preconf::Envelope;
use taiko_primitives::{BlockInfo, L1Origin};
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
    /// Inserts the preconfirmation blocks in order, returning their headers. The first failing
    /// block aborts the insertion of the following ones.
    pub async fn insert_preconf_blocks_from_execution_payloads(
        &self,
        envelopes: &[Arc<Envelope>],
    ) -> Result<Vec<Header>, DriverError> {
        let _guard = self.lock.lock().await;
        tracing::debug!(target: "taiko::driver", blocks = envelopes.len(), "inserting preconfirmation blocks");

        let mut headers = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            let header = self.insert_preconf_block(envelope).await?;
            tracing::info!(
                target: "taiko::driver",
                block = %BlockInfo::from(&header),
                coinbase = ?header.beneficiary,
                timestamp = header.timestamp,
                gas_used = header.gas_used,
                "new preconfirmation block inserted"
            );
            headers.push(header);
        }
        Ok(headers)
    }

    /// Truncates the L2 chain to `new_last_block_id`, dropping every later preconfirmation block.
    pub async fn remove_preconf_blocks(&self, new_last_block_id: u64) -> Result<Header, DriverError> {
        let _guard = self.lock.lock().await;

        if let Some(head) = self.l2.head_l1_origin().await? {
            if new_last_block_id < head.block_id {
                return Err(DriverError::RemoveBelowHead { target: new_last_block_id, head: head.block_id })
            }
        }
        let header = self.l2_header(new_last_block_id).await?;
        self.engine.set_head(header.hash).await?;

        self.metrics.l2_head_height.set(header.number as f64);
        self.metrics.l2_preconf_head_height.set(header.number as f64);
        tracing::info!(target: "taiko::driver", head = %BlockInfo::from(&header), "preconfirmation blocks removed");
        Ok(header)
    }

    async fn insert_preconf_block(&self, envelope: &Envelope) -> Result<Header, DriverError> {
        let payload = &envelope.payload;
        let number = payload.block_number;

        if let Some(head) = self.l2.head_l1_origin().await? {
            if number <= head.block_id {
                return Err(DriverError::PreconfBehindHead { number, head: head.block_id })
            }
            if !self.is_based_on_canonical_chain(payload, &head).await? {
                return Err(DriverError::PreconfNotCanonical { number })
            }
        }

        let [tx_list] = payload.transactions.as_slice() else {
            return Err(DriverError::PreconfTransactionCount(payload.transactions.len()))
        };
        let tx_list = Bytes::from(decompress(tx_list)?);
        let parent = self.l2_header_by_hash(payload.parent_hash).await?;

        let mut l1_origin = L1Origin::preconf(number);
        l1_origin.is_forced_inclusion = envelope.is_forced_inclusion;
        l1_origin.end_of_preconf = envelope.end_of_sequencing;
        l1_origin.signature = envelope.signature;

        let params = BlockBuildParams {
            parent: BlockInfo::from(&parent),
            timestamp: payload.timestamp,
            difficulty: payload.prev_randao,
            fee_recipient: payload.fee_recipient,
            gas_limit: payload.gas_limit,
            base_fee: payload.base_fee_per_gas,
            extra_data: payload.extra_data.clone(),
            l1_origin,
            batch_id: None,
            tx_list,
        };
        let verified = self.verified_block_hash(number).await?;
        let built = self.engine.create_payload_and_set_head(params, verified).await?;

        self.metrics.l2_head_height.set(number as f64);
        self.metrics.l2_preconf_head_height.set(number as f64);
        self.l2_header_by_hash(built.block_hash()).await
    }

    /// Returns true if the payload extends the canonical chain: its parent is the canonical block
    /// below it, or its ancestry reaches the L2 block of the head L1 origin.
    async fn is_based_on_canonical_chain(
        &self,
        payload: &ExecutionPayloadV1,
        head: &L1Origin,
    ) -> Result<bool, DriverError> {
        let parent_number = payload.block_number.saturating_sub(1);
        if let Some(parent) = self.l2.l2_header_by_number(parent_number.into()).await? {
            if parent.hash == payload.parent_hash {
                return Ok(true)
            }
        }

        let mut current = self.l2_header_by_hash(payload.parent_hash).await?;
        while current.number > head.block_id {
            current = self.l2_header_by_hash(current.parent_hash).await?;
        }
        let canonical = Some(current.hash) == head.l2_block_hash;

        tracing::debug!(
            target: "taiko::driver",
            number = payload.block_number,
            parent = ?payload.parent_hash,
            head_origin = head.block_id,
            canonical,
            "checked preconfirmation ancestry"
        );
        Ok(canonical)
    }
}
