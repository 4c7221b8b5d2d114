pub(crate) mod l1_origin;

use alloy_consensus::TxEnvelope;
use alloy_eips::{BlockId, BlockNumberOrTag};
use alloy_primitives::{Address, B256, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Block, Header, TransactionRequest};
use alloy_sol_types::SolCall;
use alloy_transport::{RpcError, TransportErrorKind};
use taiko_l1::ITaikoAnchor;
use taiko_primitives::{BaseFeeConfig, SyncProgress};

/// An L2 block with its full transactions.
pub type L2Block = Block<TxEnvelope>;

/// An error occurring at an L2 provider.
#[derive(Debug, thiserror::Error)]
pub enum L2ProviderError {
    /// L2 RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),
    /// A contract call returned undecodable data.
    #[error("abi error: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    /// The requested block doesn't exist.
    #[error("missing L2 block {0}")]
    MissingBlock(BlockId),
}

/// Provides the L2 chain state of the execution engine.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc, &)]
pub trait L2ChainProvider: Sync + Send {
    /// Returns the L2 header at the provided number or tag.
    async fn l2_header_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> Result<Option<Header>, L2ProviderError>;

    /// Returns the L2 header with the provided hash.
    async fn l2_header_by_hash(&self, hash: B256) -> Result<Option<Header>, L2ProviderError>;

    /// Returns the L2 block with its transactions at the provided number.
    async fn l2_block_by_number(&self, number: u64) -> Result<Option<L2Block>, L2ProviderError>;

    /// Returns the engine's P2P sync progress, `None` if it isn't syncing.
    async fn sync_progress(&self) -> Result<Option<SyncProgress>, L2ProviderError>;

    /// Returns the nonce of the account at the provided block.
    async fn nonce_at(&self, address: Address, block_number: u64) -> Result<u64, L2ProviderError>;

    /// Returns the base fee of the block following `parent`, computed by the anchor contract.
    async fn base_fee(
        &self,
        parent: &Header,
        timestamp: u64,
        config: BaseFeeConfig,
    ) -> Result<U256, L2ProviderError>;

    /// Returns the latest L2 header.
    async fn l2_head(&self) -> Result<Header, L2ProviderError> {
        self.l2_header_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or(L2ProviderError::MissingBlock(BlockNumberOrTag::Latest.into()))
    }
}

/// The `eth_syncing` response: `false` or the sync progress.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum SyncingResponse {
    Syncing(SyncProgress),
    NotSyncing(bool),
}

/// The client of a Taiko execution engine, reading its chain through the public RPC and its
/// L1 origins through both the public and the authenticated RPC.
#[derive(Debug, Clone)]
pub struct TaikoL2Client<P> {
    provider: P,
    auth: P,
    anchor: Address,
}

impl<P: Provider> TaikoL2Client<P> {
    /// Returns a new [`TaikoL2Client`].
    pub const fn new(provider: P, auth: P, anchor: Address) -> Self {
        Self { provider, auth, anchor }
    }

    /// Returns the provider of the public RPC.
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the provider of the authenticated RPC.
    pub const fn auth(&self) -> &P {
        &self.auth
    }
}

#[async_trait::async_trait]
impl<P: Provider> L2ChainProvider for TaikoL2Client<P> {
    async fn l2_header_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> Result<Option<Header>, L2ProviderError> {
        Ok(self.provider.get_block_by_number(number).await?.map(|block| block.header))
    }

    async fn l2_header_by_hash(&self, hash: B256) -> Result<Option<Header>, L2ProviderError> {
        Ok(self.provider.get_block_by_hash(hash).await?.map(|block| block.header))
    }

    async fn l2_block_by_number(&self, number: u64) -> Result<Option<L2Block>, L2ProviderError> {
        let block = self.provider.get_block_by_number(number.into()).full().await?;
        Ok(block.map(|block| block.map_transactions(|tx| tx.inner.into_inner())))
    }

    async fn sync_progress(&self) -> Result<Option<SyncProgress>, L2ProviderError> {
        let response =
            self.provider.client().request_noparams::<SyncingResponse>("eth_syncing").await?;
        Ok(match response {
            SyncingResponse::Syncing(progress) => Some(progress),
            SyncingResponse::NotSyncing(_) => None,
        })
    }

    async fn nonce_at(&self, address: Address, block_number: u64) -> Result<u64, L2ProviderError> {
        Ok(self.provider.get_transaction_count(address).block_id(block_number.into()).await?)
    }

    async fn base_fee(
        &self,
        parent: &Header,
        timestamp: u64,
        config: BaseFeeConfig,
    ) -> Result<U256, L2ProviderError> {
        let call = ITaikoAnchor::getBasefeeV2Call {
            parentGasUsed: parent.gas_used as u32,
            blockTimestamp: timestamp,
            baseFeeConfig: config.into(),
        };
        let request = TransactionRequest::default().to(self.anchor).input(call.abi_encode().into());
        let output = self.provider.call(request).block(BlockId::hash(parent.hash)).await?;
        let base_fee = ITaikoAnchor::getBasefeeV2Call::abi_decode_returns(&output)?;

        tracing::trace!(target: "taiko::providers", parent = parent.number, timestamp, basefee = %base_fee.basefee, "computed base fee");
        Ok(base_fee.basefee)
    }
}

/// Maps a "not found" error response of the execution engine to `None`.
pub(crate) fn not_found_to_none<T>(
    result: Result<T, RpcError<TransportErrorKind>>,
) -> Result<Option<T>, L2ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(RpcError::ErrorResp(payload)) if payload.message.contains("not found") => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_json_rpc::ErrorPayload;

    #[test]
    fn test_should_decode_syncing_responses() {
        let not_syncing: SyncingResponse = serde_json::from_str("false").unwrap();
        let syncing: SyncingResponse =
            serde_json::from_str(r#"{"startingBlock":"0x0","currentBlock":"0x10","highestBlock":"0x20","syncedAccounts":"0x5"}"#)
                .unwrap();

        assert!(matches!(not_syncing, SyncingResponse::NotSyncing(false)));
        let SyncingResponse::Syncing(progress) = syncing else { panic!("expected progress") };
        assert_eq!(progress.current_block, 16);
        assert_eq!(progress.synced_accounts, 5);
        assert!(progress.is_syncing());
    }

    #[test]
    fn test_should_map_not_found_to_none() {
        let not_found: Result<u64, _> = Err(RpcError::ErrorResp(ErrorPayload {
            code: -32000,
            message: "not found".into(),
            data: None,
        }));
        let other: Result<u64, _> = Err(RpcError::ErrorResp(ErrorPayload {
            code: -32000,
            message: "execution reverted".into(),
            data: None,
        }));

        assert!(matches!(not_found_to_none(not_found), Ok(None)));
        assert!(matches!(not_found_to_none(Ok(1)), Ok(Some(1))));
        assert!(not_found_to_none(other).is_err());
    }
}
