use alloy_primitives::{Address, B256};
use std::{fmt, str::FromStr, time::Duration};
use taiko_primitives::{ForkHeights, BLOCK_MAX_TX_LIST_BYTES, GOLDEN_TOUCH_PRIVATE_KEY};

/// The interval between two beacon sync progress checks.
#[cfg(any(test, feature = "test-utils"))]
pub const TRACKER_INTERVAL: Duration = Duration::from_millis(1);
/// The interval between two beacon sync progress checks.
#[cfg(not(any(test, feature = "test-utils")))]
pub const TRACKER_INTERVAL: Duration = Duration::from_secs(12);

/// The default time without beacon sync progress after which the engine is considered out of sync.
pub const DEFAULT_P2P_SYNC_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// The configuration of the driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// The L2 chain id.
    pub chain_id: u64,
    /// The address of the Taiko inbox on L1.
    pub inbox: Address,
    /// The address of the anchor contract on L2.
    pub anchor: Address,
    /// The private key signing the anchor transactions.
    pub golden_touch_key: B256,
    /// The fork activation heights.
    pub fork_heights: ForkHeights,
    /// The L1 block the inbox was deployed in.
    pub genesis_l1_height: u64,
    /// The maximum size of a calldata transaction list.
    pub max_tx_list_bytes: usize,
    /// Whether the engine may beacon sync from a checkpoint node.
    pub p2p_sync: bool,
    /// How proposals are compared against the last inserted proposal.
    pub replay_guard: ReplayGuard,
    /// The beacon sync tracker configuration.
    pub tracker: TrackerConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            chain_id: 167_000,
            inbox: Address::ZERO,
            anchor: Address::ZERO,
            golden_touch_key: GOLDEN_TOUCH_PRIVATE_KEY,
            fork_heights: ForkHeights::default(),
            genesis_l1_height: 0,
            max_tx_list_bytes: BLOCK_MAX_TX_LIST_BYTES as usize,
            p2p_sync: false,
            replay_guard: ReplayGuard::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

/// The configuration of the beacon sync progress tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// The time without progress after which the engine is marked out of sync.
    pub timeout: Duration,
    /// The interval between two progress checks.
    pub interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_P2P_SYNC_TIMEOUT, interval: TRACKER_INTERVAL }
    }
}

/// The identifier the idempotent replay guard compares proposals with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReplayGuard {
    /// Skip proposals whose last L2 block id is at or below the last inserted block id.
    #[default]
    BlockId,
    /// Skip proposals whose batch id is at or below the batch of the last inserted block.
    BatchId,
}

impl FromStr for ReplayGuard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block-id" => Ok(Self::BlockId),
            "batch-id" => Ok(Self::BatchId),
            other => Err(format!("unknown replay guard {other}, expected block-id or batch-id")),
        }
    }
}

impl fmt::Display for ReplayGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockId => write!(f, "block-id"),
            Self::BatchId => write!(f, "batch-id"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_replay_guard() {
        assert_eq!("block-id".parse::<ReplayGuard>(), Ok(ReplayGuard::BlockId));
        assert_eq!("batch-id".parse::<ReplayGuard>(), Ok(ReplayGuard::BatchId));
        assert!("batch".parse::<ReplayGuard>().is_err());
        assert_eq!(ReplayGuard::BatchId.to_string(), "batch-id");
    }
}
