use metrics::Histogram;
use metrics_derive::Metrics;

/// The metrics for the [`super::EngineDriver`].
#[derive(Metrics, Clone)]
#[metrics(scope = "engine")]
pub struct EngineMetrics {
    /// The duration of the fork choice updates.
    pub forkchoice_updated_duration: Histogram,
    /// The duration of the new payload calls.
    pub new_payload_duration: Histogram,
    /// The duration of the get payload calls.
    pub get_payload_duration: Histogram,
}
