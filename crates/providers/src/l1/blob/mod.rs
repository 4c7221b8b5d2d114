//! Exposes the [`BlobProvider`] trait allowing to retrieve blobs.

mod client;
pub use client::{BeaconClientProvider, BeaconTiming, DEFAULT_BLOB_CACHE_SIZE};

use crate::L1ProviderError;
use std::sync::Arc;

use alloy_eips::eip4844::Blob;
use alloy_primitives::B256;

/// An instance of the trait can be used to fetch L1 blob data.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc, &)]
pub trait BlobProvider: Sync + Send {
    /// Returns the blob with the provided versioned hash, published in the L1 block with the
    /// provided timestamp, or `None` if the blob data source doesn't have it.
    async fn blob(
        &self,
        block_timestamp: u64,
        hash: B256,
    ) -> Result<Option<Arc<Blob>>, L1ProviderError>;
}
