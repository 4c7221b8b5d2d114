use crate::metrics::PreconfMetrics;
use alloy_primitives::{FixedBytes, B256};
use alloy_rpc_types_engine::ExecutionPayloadV1;
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

/// The default number of block heights held by the [`EnvelopeQueue`].
pub const DEFAULT_ENVELOPE_QUEUE_HEIGHTS: usize = 768;

/// A preconfirmation block: the payload to execute, its single transaction entry being the zlib
/// compressed RLP transaction list, anchor transaction first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The execution payload.
    pub payload: ExecutionPayloadV1,
    /// The signature of the preconfirmation, if any.
    pub signature: Option<FixedBytes<65>>,
    /// Whether the block is a forced inclusion.
    pub is_forced_inclusion: bool,
    /// Whether the block closes the current sequencing window.
    pub end_of_sequencing: bool,
}

impl Envelope {
    /// Returns the block number.
    pub const fn number(&self) -> u64 {
        self.payload.block_number
    }

    /// Returns the block hash.
    pub const fn hash(&self) -> B256 {
        self.payload.block_hash
    }

    /// Returns the parent hash.
    pub const fn parent_hash(&self) -> B256 {
        self.payload.parent_hash
    }
}

/// A cache of the preconfirmation envelopes received, indexed by block number. Competing forks at
/// the same height are all retained.
///
/// Once more than `max_heights` heights are held, the lowest height is evicted.
#[derive(Debug)]
pub struct EnvelopeQueue {
    queue: RwLock<BTreeMap<u64, Vec<Arc<Envelope>>>>,
    max_heights: usize,
    total_cached: std::sync::atomic::AtomicU64,
    metrics: PreconfMetrics,
}

impl Default for EnvelopeQueue {
    fn default() -> Self {
        Self::new(DEFAULT_ENVELOPE_QUEUE_HEIGHTS)
    }
}

impl EnvelopeQueue {
    /// Returns a new queue holding up to `max_heights` block heights.
    pub fn new(max_heights: usize) -> Self {
        Self {
            queue: RwLock::new(BTreeMap::new()),
            max_heights,
            total_cached: Default::default(),
            metrics: PreconfMetrics::default(),
        }
    }

    /// Caches the envelope under the block number.
    pub fn put(&self, number: u64, envelope: Envelope) {
        let mut queue = self.queue.write();
        queue.entry(number).or_default().push(Arc::new(envelope));
        while queue.len() > self.max_heights {
            queue.pop_first();
        }

        let total = self.total_cached.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
        self.metrics.envelopes_cached.set(total as f64);
        tracing::trace!(target: "taiko::preconf", number, total, "cached envelope");
    }

    /// Returns the envelope with the exact block number and hash.
    pub fn get(&self, number: u64, hash: B256) -> Option<Arc<Envelope>> {
        self.queue.read().get(&number)?.iter().find(|envelope| envelope.hash() == hash).cloned()
    }

    /// Returns true if an envelope with the exact block number and hash is cached.
    pub fn has_exact(&self, number: u64, hash: B256) -> bool {
        self.queue
            .read()
            .get(&number)
            .is_some_and(|envelopes| envelopes.iter().any(|envelope| envelope.hash() == hash))
    }

    /// Returns the longest chain of cached descendants of the block, ordered by block number.
    /// Among branches of the same length, the first cached wins.
    pub fn get_children(&self, number: u64, hash: B256) -> Vec<Arc<Envelope>> {
        longest_chain(&self.queue.read(), number, hash)
    }

    /// Returns the most recently cached envelope of the highest block number.
    pub fn latest(&self) -> Option<Arc<Envelope>> {
        self.queue.read().last_key_value().and_then(|(_, envelopes)| envelopes.last().cloned())
    }

    /// Returns the number of envelopes cached since the queue was created.
    pub fn total_cached(&self) -> u64 {
        self.total_cached.load(std::sync::atomic::Ordering::Relaxed)
    }
}

fn longest_chain(
    queue: &BTreeMap<u64, Vec<Arc<Envelope>>>,
    number: u64,
    hash: B256,
) -> Vec<Arc<Envelope>> {
    let Some(children) = queue.get(&(number + 1)) else { return Vec::new() };

    let mut longest = Vec::new();
    for child in children.iter().filter(|child| child.parent_hash() == hash) {
        let descendants = longest_chain(queue, child.number(), child.hash());
        if descendants.len() + 1 > longest.len() {
            longest = Vec::with_capacity(descendants.len() + 1);
            longest.push(child.clone());
            longest.extend(descendants);
        }
    }
    longest
}
