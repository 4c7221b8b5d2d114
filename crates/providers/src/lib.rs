//! The crate exposes the providers the driver reads the L1, the protocol and the L2 execution
//! engine with, along with their alloy-backed implementations.

pub use execution_payload::{
    AlloyExecutionPayloadProvider, ExecutionPayloadProvider, ExecutionPayloadProviderError,
};
mod execution_payload;

pub use l1::{
    blob::{BeaconClientProvider, BeaconTiming, BlobProvider, DEFAULT_BLOB_CACHE_SIZE},
    protocol::{ProtocolProvider, TaikoInboxClient},
    L1ChainProvider, L1ProviderError,
};
mod l1;

pub use l2::{l1_origin::L1OriginProvider, L2Block, L2ChainProvider, L2ProviderError, TaikoL2Client};
mod l2;

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers
pub mod test_utils;
