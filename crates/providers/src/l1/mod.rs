pub(crate) mod blob;
pub(crate) mod protocol;

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::B256;
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Filter, Header, Log};
use alloy_transport::{RpcError, TransportErrorKind};

/// An error occurring at an L1 provider.
#[derive(Debug, thiserror::Error)]
pub enum L1ProviderError {
    /// Error at the beacon provider.
    #[error("Beacon provider error: {0}")]
    BeaconProvider(#[from] reqwest::Error),
    /// Invalid timestamp for slot.
    #[error("invalid block timestamp: genesis {0}, provided {1}")]
    InvalidBlockTimestamp(u64, u64),
    /// L1 RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),
    /// A contract call returned undecodable data.
    #[error("abi error: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}

/// Provides the L1 headers and logs the driver follows.
#[async_trait::async_trait]
pub trait L1ChainProvider: Sync + Send {
    /// Returns the L1 header at the provided number or tag.
    async fn l1_header_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> Result<Option<Header>, L1ProviderError>;

    /// Returns the L1 header with the provided hash.
    async fn l1_header_by_hash(&self, hash: B256) -> Result<Option<Header>, L1ProviderError>;

    /// Returns the L1 logs matching the filter.
    async fn l1_logs(&self, filter: &Filter) -> Result<Vec<Log>, L1ProviderError>;
}

#[async_trait::async_trait]
impl<P: Provider> L1ChainProvider for P {
    async fn l1_header_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> Result<Option<Header>, L1ProviderError> {
        Ok(self.get_block_by_number(number).await?.map(|block| block.header))
    }

    async fn l1_header_by_hash(&self, hash: B256) -> Result<Option<Header>, L1ProviderError> {
        Ok(self.get_block_by_hash(hash).await?.map(|block| block.header))
    }

    async fn l1_logs(&self, filter: &Filter) -> Result<Vec<Log>, L1ProviderError> {
        tracing::trace!(target: "taiko::providers", ?filter, "fetching L1 logs");
        Ok(self.get_logs(filter).await?)
    }
}
