use metrics::{Counter, Gauge};
use metrics_derive::Metrics;

/// The metrics of the chain syncer and the blocks inserter.
#[derive(Metrics, Clone)]
#[metrics(scope = "driver")]
pub struct DriverMetrics {
    /// The height of the L1 cursor.
    pub l1_current_height: Gauge,
    /// The height of the L1 head.
    pub l1_head_height: Gauge,
    /// The height of the L2 head.
    pub l2_head_height: Gauge,
    /// The height of the last inserted preconfirmation block.
    pub l2_preconf_head_height: Gauge,
    /// A counter on the detected L1 reorgs.
    pub reorgs: Counter,
}

/// The metrics of the beacon sync progress tracker.
#[derive(Metrics, Clone)]
#[metrics(scope = "beacon_sync")]
pub struct BeaconSyncMetrics {
    /// Set to one once the engine made no beacon sync progress within the timeout.
    pub out_of_sync: Gauge,
}
