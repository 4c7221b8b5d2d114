//! The driver of a Taiko L2 execution engine: derives the L2 chain from the proposals posted to
//! the Taiko inbox on L1, inserts preconfirmation blocks and recovers from L1 reorgs.

pub use anchor::AnchorTxConstructor;
mod anchor;

pub use beaconsync::SyncProgressTracker;
mod beaconsync;

pub use chain_syncer::ChainSyncer;
mod chain_syncer;

pub use config::{
    DriverConfig, ReplayGuard, TrackerConfig, DEFAULT_P2P_SYNC_TIMEOUT, TRACKER_INTERVAL,
};
mod config;

pub use error::{DriverError, TxListFetchError};
mod error;

pub use fetcher::{BlobFetcher, CalldataFetcher, TxListFetcher};
mod fetcher;

pub use inserter::BlocksInserter;
mod inserter;

pub use metrics::{BeaconSyncMetrics, DriverMetrics};
mod metrics;

pub use preconf::PreconfBlockHandler;
mod preconf;

pub use reorg::ReorgChecker;
mod reorg;

pub use state::{State, STATE_POLL_INTERVAL};
mod state;

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers
pub mod test_utils;
