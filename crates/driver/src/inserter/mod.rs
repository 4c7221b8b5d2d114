//! Inserters of the L2 blocks described by the L1 proposals and by preconfirmations.

use crate::{
    AnchorTxConstructor, BlobFetcher, CalldataFetcher, DriverConfig, DriverError, DriverMetrics,
    SyncProgressTracker, TxListFetcher,
};
use alloy_primitives::Bytes;
use std::sync::Arc;
use taiko_codec::TxListDecompressor;
use taiko_engine::{EngineDriver, TaikoEngineApi};
use taiko_primitives::{ForkHeights, ProposalMetadata};
use taiko_providers::{
    BlobProvider, L1ChainProvider, L1OriginProvider, L2ChainProvider, ProtocolProvider,
};
use tokio::sync::Mutex;

mod common;
mod ontake;
mod pacaya;
mod preconf;

/// Builds the L2 blocks of the proposals through the execution engine.
///
/// Every entry point runs under the same lock, so that the fork choice updates of the L1 derived
/// blocks and of the preconfirmation blocks never interleave.
#[derive(Debug)]
pub struct BlocksInserter<L1, P, B, L2, EC> {
    /// The L1 execution client.
    l1: L1,
    /// The Taiko inbox.
    protocol: P,
    /// The L2 execution engine client.
    l2: L2,
    /// The engine driver building the blocks.
    engine: EngineDriver<EC>,
    /// The fetcher of calldata transaction lists.
    calldata_fetcher: CalldataFetcher<L1>,
    /// The fetcher of blob transaction lists.
    blob_fetcher: BlobFetcher<L1, B>,
    /// The anchor transaction constructor.
    anchor: AnchorTxConstructor<L2>,
    /// The transaction list decoder.
    decompressor: TxListDecompressor,
    /// The beacon sync tracker.
    tracker: Arc<SyncProgressTracker<L2>>,
    /// The fork activation heights.
    fork_heights: ForkHeights,
    /// Serializes the insertions.
    lock: Mutex<()>,
    /// The metrics of the driver.
    metrics: DriverMetrics,
}

impl<L1, P, B, L2, EC> BlocksInserter<L1, P, B, L2, EC>
where
    L1: L1ChainProvider + Clone,
    P: ProtocolProvider,
    B: BlobProvider,
    L2: L2ChainProvider + L1OriginProvider + Clone,
    EC: TaikoEngineApi,
{
    /// Returns a new [`BlocksInserter`].
    pub fn new(
        l1: L1,
        protocol: P,
        blobs: B,
        l2: L2,
        engine: EngineDriver<EC>,
        tracker: Arc<SyncProgressTracker<L2>>,
        config: &DriverConfig,
    ) -> Result<Self, DriverError> {
        let anchor = AnchorTxConstructor::new(
            l2.clone(),
            config.anchor,
            config.chain_id,
            config.golden_touch_key,
        )?;
        Ok(Self {
            calldata_fetcher: CalldataFetcher::new(l1.clone(), config.inbox),
            blob_fetcher: BlobFetcher::new(l1.clone(), blobs),
            l1,
            protocol,
            l2,
            engine,
            anchor,
            decompressor: TxListDecompressor::new(config.chain_id, config.max_tx_list_bytes),
            tracker,
            fork_heights: config.fork_heights,
            lock: Mutex::new(()),
            metrics: DriverMetrics::default(),
        })
    }
}

impl<L1, P, B, L2, EC> BlocksInserter<L1, P, B, L2, EC>
where
    L1: L1ChainProvider,
    P: ProtocolProvider,
    B: BlobProvider,
    L2: L2ChainProvider + L1OriginProvider,
    EC: TaikoEngineApi,
{
    /// Inserts every L2 block of the proposal. A failing block aborts the rest of the proposal,
    /// which must then be retried as a whole.
    #[tracing::instrument(skip_all, fields(proposal_id = meta.proposal_id(), last_block_id = meta.last_block_id()))]
    pub async fn insert_blocks(&self, meta: &ProposalMetadata) -> Result<(), DriverError> {
        let tx_list = self.fetch_tx_list(meta).await?;

        let _guard = self.lock.lock().await;
        match meta {
            ProposalMetadata::Ontake(meta) => self.insert_ontake(meta, &tx_list).await,
            ProposalMetadata::Pacaya(meta) => self.insert_pacaya(meta, &tx_list).await,
        }
    }

    /// Returns the compressed transaction list of the proposal.
    pub async fn fetch_tx_list(&self, meta: &ProposalMetadata) -> Result<Bytes, DriverError> {
        let tx_list = if meta.blob_used() {
            self.blob_fetcher.fetch(meta).await?
        } else {
            self.calldata_fetcher.fetch(meta).await?
        };
        Ok(tx_list)
    }

    /// Returns the engine driver.
    pub const fn engine(&self) -> &EngineDriver<EC> {
        &self.engine
    }

    /// Returns the L2 execution engine client.
    pub const fn l2(&self) -> &L2 {
        &self.l2
    }
}
