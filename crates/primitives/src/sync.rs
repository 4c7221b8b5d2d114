use alloy_primitives::B256;
use alloy_rpc_types_eth::Header;
use serde::{Deserialize, Serialize};

/// A snapshot of the execution engine's P2P sync counters, as returned by `eth_syncing`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SyncProgress {
    #[serde(default, with = "alloy_serde::quantity")]
    pub starting_block: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub current_block: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub highest_block: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub pulled_states: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub known_states: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub synced_accounts: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub synced_account_bytes: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub synced_bytecodes: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub synced_bytecode_bytes: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub synced_storage: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub synced_storage_bytes: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub healed_trienodes: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub healed_trienode_bytes: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub healed_bytecodes: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub healed_bytecode_bytes: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub healing_trienodes: u64,
    #[serde(default, with = "alloy_serde::quantity")]
    pub healing_bytecode: u64,
}

impl SyncProgress {
    /// Returns true while the engine's current block is behind the highest known block.
    pub const fn is_syncing(&self) -> bool {
        self.current_block < self.highest_block
    }

    /// Returns true if `new` advanced any sync counter compared to `last`. No previous snapshot
    /// never counts as progress, while a finished sync (no new snapshot) always does.
    pub const fn progressed(last: Option<&Self>, new: Option<&Self>) -> bool {
        let (last, new) = match (last, new) {
            (None, _) => return false,
            (Some(_), None) => return true,
            (Some(last), Some(new)) => (last, new),
        };

        new.current_block > last.current_block ||
            new.pulled_states > last.pulled_states ||
            new.synced_accounts > last.synced_accounts ||
            new.synced_account_bytes > last.synced_account_bytes ||
            new.synced_bytecodes > last.synced_bytecodes ||
            new.synced_bytecode_bytes > last.synced_bytecode_bytes ||
            new.synced_storage > last.synced_storage ||
            new.synced_storage_bytes > last.synced_storage_bytes ||
            new.healed_trienodes > last.healed_trienodes ||
            new.healed_trienode_bytes > last.healed_trienode_bytes ||
            new.healed_bytecodes > last.healed_bytecodes ||
            new.healed_bytecode_bytes > last.healed_bytecode_bytes ||
            new.healing_trienodes > last.healing_trienodes ||
            new.healing_bytecode > last.healing_bytecode
    }
}

/// The latest L2 block verified by the protocol.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VerifiedBlock {
    /// The verified batch id, for the Pacaya fork.
    pub batch_id: Option<u64>,
    /// The verified L2 block id.
    pub block_id: u64,
    /// The verified L2 block hash.
    pub block_hash: B256,
}

/// The outcome of a reorg check.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReorgCheckResult {
    /// Whether an L1 reorg was detected.
    pub is_reorged: bool,
    /// The L1 header to rewind the L1 cursor to.
    pub l1_current_to_reset: Option<Header>,
    /// The L2 block id to rewind the last handled block to.
    pub last_handled_block_id_to_reset: Option<u64>,
}

impl ReorgCheckResult {
    /// Returns a result signalling a reorg, rewinding to the provided L1 header and L2 block.
    pub fn reorged(l1_current: Header, last_handled_block_id: u64) -> Self {
        Self {
            is_reorged: true,
            l1_current_to_reset: Some(l1_current),
            last_handled_block_id_to_reset: Some(last_handled_block_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progressed_edge_cases() {
        let progress = SyncProgress { current_block: 5, ..Default::default() };

        assert!(!SyncProgress::progressed(None, Some(&progress)));
        assert!(!SyncProgress::progressed(None, None));
        assert!(SyncProgress::progressed(Some(&progress), None));
    }

    #[test]
    fn test_progressed_requires_strict_increase() {
        let last = SyncProgress {
            current_block: 5,
            synced_storage: 10,
            healed_bytecodes: 3,
            ..Default::default()
        };

        assert!(!SyncProgress::progressed(Some(&last), Some(&last)));

        let regressed = SyncProgress { current_block: 4, ..last };
        assert!(!SyncProgress::progressed(Some(&last), Some(&regressed)));

        let storage = SyncProgress { synced_storage: 11, ..last };
        assert!(SyncProgress::progressed(Some(&last), Some(&storage)));

        let healing = SyncProgress { healing_bytecode: 1, ..last };
        assert!(SyncProgress::progressed(Some(&last), Some(&healing)));
    }

    #[test]
    fn test_should_deserialize_geth_progress() {
        let progress: SyncProgress = serde_json::from_str(
            r#"{"startingBlock":"0x0","currentBlock":"0x10","highestBlock":"0x20","syncedAccounts":"0x3"}"#,
        )
        .unwrap();

        assert_eq!(progress.current_block, 16);
        assert_eq!(progress.synced_accounts, 3);
        assert!(progress.is_syncing());
    }
}
