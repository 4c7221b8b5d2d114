//! Preconfirmation block caches and the data contracts of the preconfirmation API.

pub use envelope::{Envelope, EnvelopeQueue, DEFAULT_ENVELOPE_QUEUE_HEIGHTS};
mod envelope;

pub use error::{ErrorResponse, PreconfError};
mod error;

pub use metrics::PreconfMetrics;
mod metrics;

pub use payload_queue::{PayloadQueue, DEFAULT_PAYLOAD_QUEUE_SIZE};
mod payload_queue;

pub use request::{
    BuildPreconfBlockRequest, BuildPreconfBlockResponse, ExecutableData, PreconfStatus,
    PreconfValidator,
};
mod request;
