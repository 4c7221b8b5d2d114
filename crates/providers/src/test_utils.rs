//! Test utils for providers.

use crate::{BlobProvider, L1ChainProvider, L1ProviderError, ProtocolProvider};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use alloy_consensus::Header as ConsensusHeader;
use alloy_eips::{eip4844::Blob, BlockNumberOrTag};
use alloy_primitives::{keccak256, Address, Bytes, LogData, B256};
use alloy_rpc_types_eth::{Filter, Header, Log};
use parking_lot::RwLock;
use taiko_l1::{Batch, BlockV2, TransitionState, TransitionStateOntake};
use taiko_primitives::VerifiedBlock;

/// The seconds between two mocked L1 blocks.
pub const L1_BLOCK_TIME: u64 = 12;

/// A mocked L1 chain, serving headers and logs. Clones share the same chain.
#[derive(Debug, Clone, Default)]
pub struct MockL1Provider {
    inner: Arc<RwLock<MockL1Chain>>,
}

#[derive(Debug, Default)]
struct MockL1Chain {
    canonical: BTreeMap<u64, Header>,
    by_hash: HashMap<B256, Header>,
    logs: Vec<Log>,
    fork: u8,
}

impl MockL1Provider {
    /// Returns a new mocked L1 chain holding a genesis block.
    pub fn new() -> Self {
        let provider = Self::default();
        provider.push_block(vec![]);
        provider
    }

    /// Appends a block emitting the provided logs to the canonical chain and returns its header.
    pub fn push_block(&self, logs: Vec<(Address, LogData)>) -> Header {
        let mut chain = self.inner.write();
        let (number, parent_hash) = chain
            .canonical
            .last_key_value()
            .map(|(number, header)| (number + 1, header.hash))
            .unwrap_or_default();
        let inner = ConsensusHeader {
            parent_hash,
            number,
            timestamp: number * L1_BLOCK_TIME,
            state_root: keccak256(number.to_be_bytes()),
            extra_data: Bytes::from(vec![chain.fork]),
            ..Default::default()
        };
        let header = Header { hash: inner.hash_slow(), inner, total_difficulty: None, size: None };

        for (index, (address, data)) in logs.into_iter().enumerate() {
            chain.logs.push(Log {
                inner: alloy_primitives::Log { address, data },
                block_hash: Some(header.hash),
                block_number: Some(number),
                block_timestamp: Some(header.timestamp),
                log_index: Some(index as u64),
                ..Default::default()
            });
        }
        chain.canonical.insert(number, header.clone());
        chain.by_hash.insert(header.hash, header.clone());
        header
    }

    /// Drops every canonical block above `number`. Blocks pushed afterwards get new hashes.
    pub fn reorg(&self, number: u64) {
        let mut chain = self.inner.write();
        chain.canonical.retain(|n, _| *n <= number);
        chain.logs.retain(|log| log.block_number.is_some_and(|n| n <= number));
        chain.fork += 1;
    }

    /// Returns the canonical header at the provided number.
    pub fn header(&self, number: u64) -> Option<Header> {
        self.inner.read().canonical.get(&number).cloned()
    }

    /// Returns the canonical head.
    pub fn head(&self) -> Header {
        self.inner.read().canonical.last_key_value().map(|(_, h)| h.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl L1ChainProvider for MockL1Provider {
    async fn l1_header_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> Result<Option<Header>, L1ProviderError> {
        let chain = self.inner.read();
        Ok(match number {
            BlockNumberOrTag::Number(number) => chain.canonical.get(&number).cloned(),
            BlockNumberOrTag::Earliest => chain.canonical.get(&0).cloned(),
            _ => chain.canonical.last_key_value().map(|(_, header)| header.clone()),
        })
    }

    async fn l1_header_by_hash(&self, hash: B256) -> Result<Option<Header>, L1ProviderError> {
        Ok(self.inner.read().by_hash.get(&hash).cloned())
    }

    async fn l1_logs(&self, filter: &Filter) -> Result<Vec<Log>, L1ProviderError> {
        let from = filter.get_from_block().unwrap_or_default();
        let to = filter.get_to_block().unwrap_or(u64::MAX);
        Ok(self
            .inner
            .read()
            .logs
            .iter()
            .filter(|log| log.block_number.is_some_and(|n| n >= from && n <= to))
            .cloned()
            .collect())
    }
}

/// A mocked Taiko inbox state. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MockProtocolProvider {
    inner: Arc<RwLock<MockProtocolState>>,
}

#[derive(Debug, Default)]
struct MockProtocolState {
    last_verified_transition: Option<VerifiedBlock>,
    last_verified_block: Option<VerifiedBlock>,
    batches: HashMap<u64, Batch>,
    verifying_transitions: HashMap<u64, TransitionState>,
    ontake_blocks: HashMap<u64, BlockV2>,
    ontake_transitions: HashMap<(u64, u32), TransitionStateOntake>,
}

impl MockProtocolProvider {
    /// Sets the Pacaya last verified transition.
    pub fn set_last_verified_transition(&self, verified: Option<VerifiedBlock>) {
        self.inner.write().last_verified_transition = verified;
    }

    /// Sets the Ontake last verified block.
    pub fn set_last_verified_block(&self, verified: Option<VerifiedBlock>) {
        self.inner.write().last_verified_block = verified;
    }

    /// Inserts a Pacaya batch.
    pub fn insert_batch(&self, batch: Batch) {
        self.inner.write().batches.insert(batch.batchId, batch);
    }

    /// Inserts the transition verifying the Pacaya batch.
    pub fn insert_verifying_transition(&self, batch_id: u64, transition: TransitionState) {
        self.inner.write().verifying_transitions.insert(batch_id, transition);
    }

    /// Inserts an Ontake block.
    pub fn insert_ontake_block(&self, block: BlockV2) {
        self.inner.write().ontake_blocks.insert(block.blockId, block);
    }

    /// Inserts an Ontake transition.
    pub fn insert_ontake_transition(
        &self,
        block_id: u64,
        transition_id: u32,
        transition: TransitionStateOntake,
    ) {
        self.inner.write().ontake_transitions.insert((block_id, transition_id), transition);
    }
}

#[async_trait::async_trait]
impl ProtocolProvider for MockProtocolProvider {
    async fn last_verified_block(&self) -> Result<VerifiedBlock, L1ProviderError> {
        let state = self.inner.read();
        state
            .last_verified_transition
            .or(state.last_verified_block)
            .ok_or(L1ProviderError::Other("no verified block"))
    }

    async fn batch(&self, batch_id: u64) -> Result<Batch, L1ProviderError> {
        self.inner.read().batches.get(&batch_id).cloned().ok_or(L1ProviderError::Other("batch not found"))
    }

    async fn batch_verifying_transition(
        &self,
        batch_id: u64,
    ) -> Result<TransitionState, L1ProviderError> {
        self.inner
            .read()
            .verifying_transitions
            .get(&batch_id)
            .cloned()
            .ok_or(L1ProviderError::Other("transition not found"))
    }

    async fn ontake_block(&self, block_id: u64) -> Result<BlockV2, L1ProviderError> {
        self.inner
            .read()
            .ontake_blocks
            .get(&block_id)
            .cloned()
            .ok_or(L1ProviderError::Other("block not found"))
    }

    async fn ontake_transition(
        &self,
        block_id: u64,
        transition_id: u32,
    ) -> Result<TransitionStateOntake, L1ProviderError> {
        self.inner
            .read()
            .ontake_transitions
            .get(&(block_id, transition_id))
            .cloned()
            .ok_or(L1ProviderError::Other("transition not found"))
    }
}

/// A mocked blob data source.
#[derive(Debug, Clone, Default)]
pub struct MockBlobProvider {
    blobs: Arc<RwLock<HashMap<B256, Arc<Blob>>>>,
}

impl MockBlobProvider {
    /// Makes the blob available under the provided versioned hash.
    pub fn insert(&self, hash: B256, blob: Blob) {
        self.blobs.write().insert(hash, Arc::new(blob));
    }
}

#[async_trait::async_trait]
impl BlobProvider for MockBlobProvider {
    async fn blob(
        &self,
        _block_timestamp: u64,
        hash: B256,
    ) -> Result<Option<Arc<Blob>>, L1ProviderError> {
        Ok(self.blobs.read().get(&hash).cloned())
    }
}
