//! Test utils for the driver.

use crate::{
    AnchorTxConstructor, BlocksInserter, ChainSyncer, DriverConfig, DriverError,
    PreconfBlockHandler, State, SyncProgressTracker,
};
use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::{BlockId, BlockNumberOrTag};
use alloy_primitives::{address, aliases::U24, Address, Bytes, TxKind, B256, U256};
use alloy_rpc_types_engine::ExecutionPayloadInputV2;
use alloy_rpc_types_eth::Header;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolEvent;
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};
use taiko_codec::encode_tx_list;
use taiko_engine::{
    test_utils::{MockL2Node, MOCK_BASE_FEE},
    EngineDriver,
};
use taiko_l1::{Batch, BatchInfo, BatchMetadata, ITaikoInbox, TransitionState};
use taiko_preconf::{BuildPreconfBlockRequest, ExecutableData};
use taiko_primitives::{BaseFeeConfig, ForkHeights, VerifiedBlock, ANCHOR_V3_GAS_LIMIT};
use taiko_providers::{
    test_utils::{MockBlobProvider, MockL1Provider, MockProtocolProvider},
    ExecutionPayloadProvider, ExecutionPayloadProviderError, L1ChainProvider, L2ChainProvider,
    ProtocolProvider,
};

/// The address of the mocked inbox.
pub const INBOX: Address = address!("0x06a9Ab27c7e2255df1815E6CC0168d7755Feb19a");
/// The address of the mocked anchor contract.
pub const ANCHOR: Address = address!("0x1670000000000000000000000000000000010001");
/// The coinbase of the mocked proposals.
pub const COINBASE: Address = address!("0x000000000000000000000000000000000000c0de");
/// The L2 gas limit of the mocked proposals, anchor transaction excluded.
pub const BATCH_GAS_LIMIT: u32 = 240_000_000;

/// The inserter over the mocked providers.
pub type MockBlocksInserter =
    BlocksInserter<MockL1Provider, MockProtocolProvider, MockBlobProvider, MockL2Node, MockL2Node>;

/// The chain syncer over the mocked providers.
pub type MockChainSyncer = ChainSyncer<
    MockL1Provider,
    MockProtocolProvider,
    MockBlobProvider,
    MockL2Node,
    MockL2Node,
    MockCheckpointProvider,
>;

/// The preconfirmation handler over the mocked providers.
pub type MockPreconfBlockHandler = PreconfBlockHandler<
    MockL1Provider,
    MockProtocolProvider,
    MockBlobProvider,
    MockL2Node,
    MockL2Node,
>;

/// A mocked checkpoint node, serving the execution payloads it was handed. Clones share the same
/// payloads.
#[derive(Debug, Clone, Default)]
pub struct MockCheckpointProvider {
    payloads: Arc<RwLock<BTreeMap<u64, ExecutionPayloadInputV2>>>,
}

impl MockCheckpointProvider {
    /// Serves the payload under its block number.
    pub fn insert(&self, payload: ExecutionPayloadInputV2) {
        self.payloads.write().insert(payload.execution_payload.block_number, payload);
    }
}

#[async_trait::async_trait]
impl ExecutionPayloadProvider for MockCheckpointProvider {
    async fn execution_payload_by_block(
        &self,
        block_id: BlockId,
    ) -> Result<Option<ExecutionPayloadInputV2>, ExecutionPayloadProviderError> {
        let payloads = self.payloads.read();
        Ok(match block_id {
            BlockId::Number(BlockNumberOrTag::Number(number)) => payloads.get(&number).cloned(),
            _ => payloads.last_key_value().map(|(_, payload)| payload.clone()),
        })
    }
}

/// A mocked L1, inbox and L2 engine the driver components are wired to. The inbox starts with the
/// L2 genesis verified.
#[derive(Debug, Clone)]
pub struct DriverHarness {
    /// The L1 chain.
    pub l1: MockL1Provider,
    /// The inbox state.
    pub protocol: MockProtocolProvider,
    /// The blob sidecars.
    pub blobs: MockBlobProvider,
    /// The L2 execution engine.
    pub l2: MockL2Node,
    /// The checkpoint node.
    pub checkpoint: MockCheckpointProvider,
    /// The driver configuration.
    pub config: DriverConfig,
}

impl Default for DriverHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverHarness {
    /// Returns a new harness with the Pacaya fork active from the first batch.
    pub fn new() -> Self {
        let l1 = MockL1Provider::new();
        let l2 = MockL2Node::new();
        let protocol = MockProtocolProvider::default();
        protocol.set_last_verified_transition(Some(VerifiedBlock {
            batch_id: Some(0),
            block_id: 0,
            block_hash: l2.canonical_hash(0).unwrap_or_default(),
        }));
        protocol.insert_batch(Batch { batchId: 0, ..Default::default() });

        let config = DriverConfig {
            inbox: INBOX,
            anchor: ANCHOR,
            fork_heights: ForkHeights::new(0, 1),
            ..Default::default()
        };
        Self {
            l1,
            protocol,
            blobs: MockBlobProvider::default(),
            l2,
            checkpoint: MockCheckpointProvider::default(),
            config,
        }
    }

    /// Returns a new untriggered beacon sync tracker.
    pub fn tracker(&self) -> Arc<SyncProgressTracker<MockL2Node>> {
        Arc::new(SyncProgressTracker::new(self.l2.clone(), self.config.tracker))
    }

    /// Returns a new blocks inserter.
    pub fn inserter(
        &self,
        tracker: Arc<SyncProgressTracker<MockL2Node>>,
    ) -> Result<Arc<MockBlocksInserter>, DriverError> {
        Ok(Arc::new(BlocksInserter::new(
            self.l1.clone(),
            self.protocol.clone(),
            self.blobs.clone(),
            self.l2.clone(),
            EngineDriver::new(self.l2.clone()),
            tracker,
            &self.config,
        )?))
    }

    /// Returns a new driver state.
    pub async fn state(&self) -> Result<Arc<State<MockL1Provider, MockL2Node>>, DriverError> {
        Ok(Arc::new(
            State::new(
                self.l1.clone(),
                self.l2.clone(),
                self.config.inbox,
                self.config.genesis_l1_height,
                self.config.fork_heights,
            )
            .await?,
        ))
    }

    /// Returns a new chain syncer and the inserter it shares.
    pub async fn chain_syncer(
        &self,
    ) -> Result<(MockChainSyncer, Arc<MockBlocksInserter>), DriverError> {
        let tracker = self.tracker();
        let inserter = self.inserter(tracker.clone())?;
        let syncer = ChainSyncer::new(
            self.state().await?,
            inserter.clone(),
            self.protocol.clone(),
            tracker,
            Some(self.checkpoint.clone()),
            self.l1.clone(),
            self.l2.clone(),
            &self.config,
        );
        Ok((syncer, inserter))
    }

    /// Returns a new preconfirmation handler sharing the inserter.
    pub fn preconf_handler(&self, inserter: Arc<MockBlocksInserter>) -> MockPreconfBlockHandler {
        PreconfBlockHandler::new(inserter, self.tracker(), &self.config)
    }

    /// Proposes a calldata batch following the previously proposed one, anchored to the current L1
    /// head. Each entry of `blocks` is the number of transactions of a block. Returns the header
    /// of the L1 block emitting the proposal.
    pub async fn propose_batch(
        &self,
        batch_id: u64,
        blocks: &[u16],
        txs: &[TxEnvelope],
    ) -> eyre::Result<Header> {
        let anchor = self.l1.head();
        let parent_last_block_id = self.protocol.batch(batch_id - 1).await?.lastBlockId;
        let last_block_id = parent_last_block_id + blocks.len() as u64;
        let tx_list = Bytes::from(encode_tx_list(txs));

        let info = BatchInfo {
            blocks: blocks
                .iter()
                .map(|count| taiko_l1::BlockParams {
                    numTransactions: *count,
                    timeShift: 1,
                    signalSlots: vec![],
                })
                .collect(),
            extraData: B256::with_last_byte(0x32),
            coinbase: COINBASE,
            proposedIn: anchor.number + 1,
            blobByteOffset: 0,
            blobByteSize: tx_list.len() as u32,
            gasLimit: BATCH_GAS_LIMIT,
            lastBlockId: last_block_id,
            lastBlockTimestamp: block_timestamp(last_block_id),
            anchorBlockId: anchor.number,
            anchorBlockHash: anchor.hash,
            ..Default::default()
        };
        let meta = BatchMetadata { batchId: batch_id, proposer: COINBASE, ..Default::default() };
        let event = ITaikoInbox::BatchProposed { info, meta, txList: tx_list };

        self.protocol.insert_batch(Batch {
            batchId: batch_id,
            lastBlockId: last_block_id,
            lastBlockTimestamp: block_timestamp(last_block_id),
            anchorBlockId: anchor.number,
            ..Default::default()
        });
        Ok(self.l1.push_block(vec![(INBOX, event.encode_log_data())]))
    }

    /// Marks the batch verified with the provided block hash.
    pub async fn verify_batch(&self, batch_id: u64, block_hash: B256) -> eyre::Result<()> {
        let mut batch = self.protocol.batch(batch_id).await?;
        batch.verifiedTransitionId = U24::from(1);
        let block_id = batch.lastBlockId;
        self.protocol.insert_batch(batch);
        self.protocol.insert_verifying_transition(
            batch_id,
            TransitionState { blockHash: block_hash, ..Default::default() },
        );
        self.protocol.set_last_verified_transition(Some(VerifiedBlock {
            batch_id: Some(batch_id),
            block_id,
            block_hash,
        }));
        Ok(())
    }

    /// Returns a preconfirmation request for the child of `parent`, anchored to the L1 block and
    /// carrying the transactions after the anchor transaction. The request matches the block a
    /// single block batch proposed with the same transactions would derive.
    pub async fn preconf_request(
        &self,
        parent: &Header,
        anchor_block_id: u64,
        txs: &[TxEnvelope],
    ) -> eyre::Result<BuildPreconfBlockRequest> {
        let anchor_block = self.l1.l1_header_by_number(anchor_block_id.into()).await?;
        let anchor_state_root = anchor_block.map(|header| header.state_root).unwrap_or_default();
        let constructor = AnchorTxConstructor::new(
            self.l2.clone(),
            self.config.anchor,
            self.config.chain_id,
            self.config.golden_touch_key,
        )?;
        let anchor_tx = constructor
            .assemble_anchor_v3_tx(
                parent,
                anchor_block_id,
                anchor_state_root,
                BaseFeeConfig::default(),
                vec![],
                U256::from(MOCK_BASE_FEE),
            )
            .await?;

        let mut list = vec![anchor_tx];
        list.extend_from_slice(txs);
        let number = parent.number + 1;
        Ok(BuildPreconfBlockRequest {
            executable_data: Some(ExecutableData {
                parent_hash: parent.hash,
                fee_recipient: COINBASE,
                number,
                gas_limit: BATCH_GAS_LIMIT as u64 + ANCHOR_V3_GAS_LIMIT,
                timestamp: block_timestamp(number),
                transactions: vec![encode_tx_list(&list).into()],
                extra_data: Bytes::copy_from_slice(B256::with_last_byte(0x32).as_slice()),
                base_fee_per_gas: MOCK_BASE_FEE,
                block_hash: None,
            }),
            anchor_block_id,
            anchor_state_root,
            ..Default::default()
        })
    }

    /// Returns the canonical L2 header at the height.
    pub async fn l2_header(&self, number: u64) -> eyre::Result<Header> {
        self.l2
            .l2_header_by_number(number.into())
            .await?
            .ok_or_else(|| eyre::eyre!("missing L2 header {number}"))
    }
}

/// Returns the timestamp the mocked proposals give the L2 block.
pub const fn block_timestamp(block_id: u64) -> u64 {
    1_000 + block_id * 2
}

/// Returns `count` signed transfers from a test account, starting at `nonce`.
pub fn transfers(nonce: u64, count: usize) -> Vec<TxEnvelope> {
    let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x11))
        .expect("valid test key");
    (0..count as u64)
        .map(|i| {
            let tx = TxEip1559 {
                chain_id: 167_000,
                nonce: nonce + i,
                gas_limit: 21_000,
                max_fee_per_gas: 20_000_000,
                max_priority_fee_per_gas: 1,
                to: TxKind::Call(Address::repeat_byte(0x22)),
                value: U256::from(1_000 + i),
                access_list: Default::default(),
                input: Bytes::new(),
            };
            let signature = signer.sign_hash_sync(&tx.signature_hash()).expect("signed transfer");
            tx.into_signed(signature).into()
        })
        .collect()
}
