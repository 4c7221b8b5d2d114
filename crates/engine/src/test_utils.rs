//! Test utils for the engine.

use crate::{
    TaikoEngineApi, TaikoExecutionPayload, TaikoExecutionPayloadEnvelope, TaikoPayloadAttributes,
};
use alloy_consensus::{
    constants::{EMPTY_OMMER_ROOT_HASH, EMPTY_ROOT_HASH},
    Header as ConsensusHeader, TxEnvelope,
};
use alloy_eips::{
    eip2718::{Decodable2718, Encodable2718},
    BlockNumberOrTag,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, B64, U256};
use alloy_rpc_types_engine::{
    ExecutionPayloadV1, ForkchoiceState, ForkchoiceUpdated, PayloadId, PayloadStatus,
    PayloadStatusEnum,
};
use alloy_rpc_types_eth::{BlockTransactions, Header};
use alloy_transport::TransportResult;
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use taiko_primitives::{BaseFeeConfig, L1Origin, SyncProgress};
use taiko_providers::{L1OriginProvider, L2Block, L2ChainProvider, L2ProviderError};

/// The base fee the mocked anchor contract computes for every block.
pub const MOCK_BASE_FEE: u64 = 10_000_000;

/// Returns the RLP encoding of an empty transaction list.
pub fn empty_tx_list() -> Bytes {
    Bytes::from(alloy_rlp::encode(Vec::<TxEnvelope>::new()))
}

/// A mocked Taiko execution engine, serving the engine API, the chain RPCs and the L1 origins
/// from the same in-memory chain. Clones share the same chain.
#[derive(Debug, Clone)]
pub struct MockL2Node {
    inner: Arc<Mutex<MockL2Chain>>,
}

#[derive(Debug)]
struct MockBlock {
    header: Header,
    transactions: Vec<TxEnvelope>,
}

#[derive(Debug, Default)]
struct MockL2Chain {
    blocks: HashMap<B256, Arc<MockBlock>>,
    canonical: BTreeMap<u64, B256>,
    built: HashMap<PayloadId, TaikoExecutionPayload>,
    origins: HashMap<u64, L1Origin>,
    head_origin: Option<u64>,
    batch_to_last_block: HashMap<u64, u64>,
    sync_progress: Option<SyncProgress>,
    syncing_targets: HashMap<B256, u64>,
    fail_new_payload_at: Option<u64>,
    last_forkchoice_state: ForkchoiceState,
    new_payloads: usize,
}

impl Default for MockL2Node {
    fn default() -> Self {
        Self::new()
    }
}

impl MockL2Node {
    /// Returns a new mocked execution engine holding a genesis block.
    pub fn new() -> Self {
        let inner = ConsensusHeader {
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            transactions_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            gas_limit: 241_000_000,
            base_fee_per_gas: Some(MOCK_BASE_FEE),
            withdrawals_root: Some(EMPTY_ROOT_HASH),
            ..Default::default()
        };
        let genesis = Header { hash: inner.hash_slow(), inner, total_difficulty: None, size: None };

        let mut chain = MockL2Chain::default();
        chain.canonical.insert(0, genesis.hash);
        chain.blocks.insert(genesis.hash, Arc::new(MockBlock { header: genesis, transactions: vec![] }));
        Self { inner: Arc::new(Mutex::new(chain)) }
    }

    /// Makes `engine_newPayloadV2` answer `INVALID` for the block with the provided number.
    pub fn fail_new_payload_at(&self, number: u64) {
        self.inner.lock().fail_new_payload_at = Some(number);
    }

    /// Makes `engine_newPayloadV2` accept every payload again.
    pub fn clear_failures(&self) {
        self.inner.lock().fail_new_payload_at = None;
    }

    /// Sets the P2P sync progress reported by `eth_syncing`.
    pub fn set_sync_progress(&self, progress: Option<SyncProgress>) {
        self.inner.lock().sync_progress = progress;
    }

    /// Returns the last fork choice state the engine received.
    pub fn last_forkchoice_state(&self) -> ForkchoiceState {
        self.inner.lock().last_forkchoice_state
    }

    /// Returns the number of payloads submitted through `engine_newPayloadV2`.
    pub fn new_payloads(&self) -> usize {
        self.inner.lock().new_payloads
    }

    /// Returns the canonical block hash at the provided number.
    pub fn canonical_hash(&self, number: u64) -> Option<B256> {
        self.inner.lock().canonical.get(&number).copied()
    }

    /// Returns the number of the canonical head.
    pub fn head_number(&self) -> u64 {
        self.inner.lock().canonical.last_key_value().map(|(number, _)| *number).unwrap_or_default()
    }

    /// Returns the number of the block a payload with an unknown parent announced under the
    /// provided hash, the target of a beacon sync.
    pub fn beacon_sync_target(&self, hash: B256) -> Option<u64> {
        self.inner.lock().syncing_targets.get(&hash).copied()
    }

    /// Returns the transactions of the block with the provided hash.
    pub fn transactions(&self, hash: B256) -> Option<Vec<TxEnvelope>> {
        self.inner.lock().blocks.get(&hash).map(|block| block.transactions.clone())
    }
}

impl MockL2Chain {
    fn header(&self, hash: &B256) -> Option<Header> {
        self.blocks.get(hash).map(|block| block.header.clone())
    }

    fn head(&self) -> Option<Header> {
        self.canonical.last_key_value().and_then(|(_, hash)| self.header(hash))
    }

    /// Makes the block the canonical head, rewriting its ancestry and dropping later blocks.
    fn set_canonical_head(&mut self, head: B256) -> bool {
        let Some(header) = self.header(&head) else { return false };
        self.canonical.retain(|number, _| *number < header.number);

        let mut current = Some(header);
        while let Some(header) = current {
            if self.canonical.get(&header.number) == Some(&header.hash) {
                break
            }
            self.canonical.insert(header.number, header.hash);
            current = (header.number > 0).then(|| self.header(&header.parent_hash)).flatten();
        }
        true
    }
}

/// Assembles the header of the block holding the transactions on top of the parent.
fn seal(parent_hash: B256, payload: &ExecutionPayloadV1, transactions: &[TxEnvelope]) -> Header {
    let mut encoded = Vec::new();
    alloy_rlp::encode_list::<_, TxEnvelope>(transactions, &mut encoded);
    let transactions_root = keccak256(encoded);
    let inner = ConsensusHeader {
        parent_hash,
        ommers_hash: EMPTY_OMMER_ROOT_HASH,
        beneficiary: payload.fee_recipient,
        state_root: keccak256([parent_hash.as_slice(), transactions_root.as_slice()].concat()),
        transactions_root,
        receipts_root: EMPTY_ROOT_HASH,
        difficulty: U256::ZERO,
        number: payload.block_number,
        gas_limit: payload.gas_limit,
        gas_used: 21_000 * transactions.len() as u64,
        timestamp: payload.timestamp,
        extra_data: payload.extra_data.clone(),
        mix_hash: payload.prev_randao,
        base_fee_per_gas: Some(payload.base_fee_per_gas.saturating_to()),
        withdrawals_root: Some(EMPTY_ROOT_HASH),
        ..Default::default()
    };
    Header { hash: inner.hash_slow(), inner, total_difficulty: None, size: None }
}

fn payload_of(header: &Header, transactions: &[TxEnvelope]) -> TaikoExecutionPayload {
    TaikoExecutionPayload {
        payload_inner: ExecutionPayloadV1 {
            parent_hash: header.parent_hash,
            fee_recipient: header.beneficiary,
            state_root: header.state_root,
            receipts_root: header.receipts_root,
            logs_bloom: header.logs_bloom,
            prev_randao: header.mix_hash,
            block_number: header.number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            timestamp: header.timestamp,
            extra_data: header.extra_data.clone(),
            base_fee_per_gas: U256::from(header.base_fee_per_gas.unwrap_or_default()),
            block_hash: header.hash,
            transactions: transactions.iter().map(|tx| tx.encoded_2718().into()).collect(),
        },
        withdrawals: Some(vec![]),
        tx_hash: Some(header.transactions_root),
        withdrawals_hash: Some(EMPTY_ROOT_HASH),
        taiko_block: true,
    }
}

fn status(status: PayloadStatusEnum) -> PayloadStatus {
    PayloadStatus::from_status(status)
}

fn invalid(reason: &str) -> PayloadStatusEnum {
    PayloadStatusEnum::Invalid { validation_error: reason.to_string() }
}

#[async_trait::async_trait]
impl TaikoEngineApi for MockL2Node {
    async fn forkchoice_updated_v2(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<TaikoPayloadAttributes>,
    ) -> TransportResult<ForkchoiceUpdated> {
        let mut chain = self.inner.lock();
        chain.last_forkchoice_state = fork_choice_state;

        let head = fork_choice_state.head_block_hash;
        if !chain.set_canonical_head(head) {
            return Ok(ForkchoiceUpdated::from_status(PayloadStatusEnum::Syncing))
        }
        let Some(attributes) = payload_attributes else {
            return Ok(ForkchoiceUpdated::new(status(PayloadStatusEnum::Valid)))
        };

        let Ok(transactions) =
            alloy_rlp::decode_exact::<Vec<TxEnvelope>>(&attributes.block_metadata.tx_list)
        else {
            return Ok(ForkchoiceUpdated::from_status(invalid("undecodable transactions")))
        };
        let Some(parent) = chain.header(&head) else {
            return Ok(ForkchoiceUpdated::from_status(PayloadStatusEnum::Syncing))
        };
        let metadata = &attributes.block_metadata;
        let template = ExecutionPayloadV1 {
            parent_hash: head,
            fee_recipient: metadata.beneficiary,
            state_root: B256::ZERO,
            receipts_root: B256::ZERO,
            logs_bloom: Default::default(),
            prev_randao: metadata.mix_hash,
            block_number: parent.number + 1,
            gas_limit: metadata.gas_limit,
            gas_used: 0,
            timestamp: metadata.timestamp,
            extra_data: metadata.extra_data.clone(),
            base_fee_per_gas: attributes.base_fee_per_gas,
            block_hash: B256::ZERO,
            transactions: vec![],
        };
        let header = seal(head, &template, &transactions);

        let mut origin = attributes.l1_origin.clone();
        origin.l2_block_hash = Some(header.hash);
        let id = origin.payload_id().unwrap_or_else(|| PayloadId(B64::from_slice(&header.hash[..8])));
        if !origin.is_preconf_block() {
            chain.head_origin = Some(origin.block_id);
        }
        if let Some(batch_id) = metadata.batch_id {
            chain.batch_to_last_block.insert(batch_id, origin.block_id);
        }
        chain.origins.insert(origin.block_id, origin);
        chain.built.insert(id, payload_of(&header, &transactions));

        Ok(ForkchoiceUpdated::new(status(PayloadStatusEnum::Valid)).with_payload_id(id))
    }

    async fn get_payload_v2(
        &self,
        payload_id: PayloadId,
    ) -> TransportResult<TaikoExecutionPayloadEnvelope> {
        let payload = self.inner.lock().built.get(&payload_id).cloned().ok_or_else(|| {
            alloy_transport::TransportErrorKind::custom_str("unknown payload")
        })?;
        Ok(TaikoExecutionPayloadEnvelope { execution_payload: payload, block_value: U256::ZERO })
    }

    async fn new_payload_v2(
        &self,
        payload: TaikoExecutionPayload,
    ) -> TransportResult<PayloadStatus> {
        let mut chain = self.inner.lock();
        chain.new_payloads += 1;
        let inner = &payload.payload_inner;

        if chain.fail_new_payload_at == Some(inner.block_number) {
            return Ok(status(invalid("rejected by test")))
        }
        let transactions: Result<Vec<_>, _> = inner
            .transactions
            .iter()
            .map(|tx| TxEnvelope::decode_2718(&mut tx.as_ref()))
            .collect();
        let Ok(transactions) = transactions else {
            return Ok(status(invalid("undecodable transactions")))
        };
        if !chain.blocks.contains_key(&inner.parent_hash) {
            chain.syncing_targets.insert(inner.block_hash, inner.block_number);
            return Ok(status(PayloadStatusEnum::Syncing))
        }

        let header = seal(inner.parent_hash, inner, &transactions);
        if header.hash != inner.block_hash {
            return Ok(status(invalid("block hash mismatch")))
        }
        chain.blocks.insert(header.hash, Arc::new(MockBlock { header, transactions }));

        Ok(status(PayloadStatusEnum::Valid))
    }
}

#[async_trait::async_trait]
impl L2ChainProvider for MockL2Node {
    async fn l2_header_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> Result<Option<Header>, L2ProviderError> {
        let chain = self.inner.lock();
        Ok(match number {
            BlockNumberOrTag::Number(number) => {
                chain.canonical.get(&number).and_then(|hash| chain.header(hash))
            }
            BlockNumberOrTag::Earliest => chain.canonical.get(&0).and_then(|hash| chain.header(hash)),
            _ => chain.head(),
        })
    }

    async fn l2_header_by_hash(&self, hash: B256) -> Result<Option<Header>, L2ProviderError> {
        Ok(self.inner.lock().header(&hash))
    }

    async fn l2_block_by_number(&self, number: u64) -> Result<Option<L2Block>, L2ProviderError> {
        let chain = self.inner.lock();
        let block = chain.canonical.get(&number).and_then(|hash| chain.blocks.get(hash));
        Ok(block.map(|block| L2Block {
            header: block.header.clone(),
            uncles: vec![],
            transactions: BlockTransactions::Full(block.transactions.clone()),
            withdrawals: Some(Default::default()),
        }))
    }

    async fn sync_progress(&self) -> Result<Option<SyncProgress>, L2ProviderError> {
        Ok(self.inner.lock().sync_progress)
    }

    /// Every block after genesis carries exactly one golden touch transaction.
    async fn nonce_at(&self, _address: Address, block_number: u64) -> Result<u64, L2ProviderError> {
        Ok(block_number)
    }

    async fn base_fee(
        &self,
        _parent: &Header,
        _timestamp: u64,
        _config: BaseFeeConfig,
    ) -> Result<U256, L2ProviderError> {
        Ok(U256::from(MOCK_BASE_FEE))
    }
}

#[async_trait::async_trait]
impl L1OriginProvider for MockL2Node {
    async fn head_l1_origin(&self) -> Result<Option<L1Origin>, L2ProviderError> {
        let chain = self.inner.lock();
        Ok(chain.head_origin.and_then(|id| chain.origins.get(&id).cloned()))
    }

    async fn l1_origin_by_id(&self, block_id: u64) -> Result<Option<L1Origin>, L2ProviderError> {
        Ok(self.inner.lock().origins.get(&block_id).cloned())
    }

    async fn last_l1_origin_by_batch_id(
        &self,
        batch_id: u64,
    ) -> Result<Option<L1Origin>, L2ProviderError> {
        let chain = self.inner.lock();
        Ok(chain.batch_to_last_block.get(&batch_id).and_then(|id| chain.origins.get(id).cloned()))
    }

    async fn last_block_id_by_batch_id(
        &self,
        batch_id: u64,
    ) -> Result<Option<u64>, L2ProviderError> {
        Ok(self.inner.lock().batch_to_last_block.get(&batch_id).copied())
    }

    async fn update_l1_origin(&self, origin: &L1Origin) -> Result<(), L2ProviderError> {
        self.inner.lock().origins.insert(origin.block_id, origin.clone());
        Ok(())
    }

    async fn set_head_l1_origin(&self, block_id: u64) -> Result<(), L2ProviderError> {
        self.inner.lock().head_origin = Some(block_id);
        Ok(())
    }

    async fn set_batch_to_last_block(
        &self,
        batch_id: u64,
        block_id: u64,
    ) -> Result<(), L2ProviderError> {
        self.inner.lock().batch_to_last_block.insert(batch_id, block_id);
        Ok(())
    }
}
