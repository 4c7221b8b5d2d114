use metrics::{Counter, Gauge};
use metrics_derive::Metrics;

/// The metrics for the preconfirmation caches and validation.
#[derive(Metrics, Clone)]
#[metrics(scope = "preconf")]
pub struct PreconfMetrics {
    /// The number of envelopes cached since startup.
    pub envelopes_cached: Gauge,
    /// The number of preconfirmation requests rejected by validation.
    pub rejected_requests: Counter,
}
