//! Engine driver of the Taiko node. The [`EngineDriver`] builds L2 blocks through the engine API of
//! the execution engine, which is reached with the [`TaikoEngineApi`] extension.

mod api;

mod client;
pub use client::{auth_provider, TaikoEngineApi};

mod engine;
pub use engine::EngineDriver;

mod error;
pub use error::EngineError;

mod fcs;
pub use fcs::ForkchoiceState;

mod metrics;

mod payload;
pub use payload::{
    BlockBuildParams, BlockMetadata, BuildPayloadArgs, TaikoExecutionPayload,
    TaikoExecutionPayloadEnvelope, TaikoPayloadAttributes, PAYLOAD_VERSION_V2,
};

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers
pub mod test_utils;
