use alloy_primitives::B256;
use alloy_rpc_types_engine::ExecutionPayloadV1;
use parking_lot::Mutex;
use std::sync::Arc;
use taiko_primitives::BoundedVec;

/// The default number of payloads held by the [`PayloadQueue`].
pub const DEFAULT_PAYLOAD_QUEUE_SIZE: usize = 768;

/// A fixed size cache of the most recent execution payloads, evicting the oldest payload once
/// full.
#[derive(Debug)]
pub struct PayloadQueue {
    payloads: Mutex<BoundedVec<(u64, Arc<ExecutionPayloadV1>)>>,
}

impl Default for PayloadQueue {
    fn default() -> Self {
        Self::new(DEFAULT_PAYLOAD_QUEUE_SIZE)
    }
}

impl PayloadQueue {
    /// Returns a new queue holding up to `size` payloads.
    pub fn new(size: usize) -> Self {
        Self { payloads: Mutex::new(BoundedVec::new(size)) }
    }

    /// Caches the payload as the newest entry.
    pub fn put(&self, id: u64, payload: ExecutionPayloadV1) {
        self.payloads.lock().push((id, Arc::new(payload)));
    }

    /// Returns the newest payload with the block id and hash.
    pub fn get(&self, id: u64, hash: B256) -> Option<Arc<ExecutionPayloadV1>> {
        self.payloads
            .lock()
            .find(|(block_id, payload)| *block_id == id && payload.block_hash == hash)
            .map(|(_, payload)| payload.clone())
    }

    /// Returns true if a payload with the block id and hash is cached.
    pub fn has(&self, id: u64, hash: B256) -> bool {
        self.payloads
            .lock()
            .find(|(block_id, payload)| *block_id == id && payload.block_hash == hash)
            .is_some()
    }

    /// Returns the number of cached payloads.
    pub fn len(&self) -> usize {
        self.payloads.lock().len()
    }

    /// Returns true if no payload is cached.
    pub fn is_empty(&self) -> bool {
        self.payloads.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    fn payload(number: u64, hash: B256) -> ExecutionPayloadV1 {
        ExecutionPayloadV1 {
            parent_hash: B256::ZERO,
            fee_recipient: Default::default(),
            state_root: B256::ZERO,
            receipts_root: B256::ZERO,
            logs_bloom: Default::default(),
            prev_randao: B256::ZERO,
            block_number: number,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::new(),
            base_fee_per_gas: Default::default(),
            block_hash: hash,
            transactions: vec![],
        }
    }

    #[test]
    fn test_should_evict_oldest_payload() {
        // Given
        let queue = PayloadQueue::new(2);
        let hashes = [B256::repeat_byte(1), B256::repeat_byte(2), B256::repeat_byte(3)];

        // When
        for (i, hash) in hashes.iter().enumerate() {
            queue.put(i as u64, payload(i as u64, *hash));
        }

        // Then
        assert_eq!(queue.len(), 2);
        assert!(!queue.has(0, hashes[0]));
        assert!(queue.has(1, hashes[1]));
        assert_eq!(queue.get(2, hashes[2]).map(|p| p.block_number), Some(2));
    }

    #[test]
    fn test_should_match_id_and_hash() {
        let queue = PayloadQueue::default();
        queue.put(5, payload(5, B256::repeat_byte(5)));

        assert!(queue.has(5, B256::repeat_byte(5)));
        assert!(!queue.has(5, B256::repeat_byte(6)));
        assert!(!queue.has(6, B256::repeat_byte(5)));
        assert!(queue.get(6, B256::repeat_byte(5)).is_none());
    }
}
