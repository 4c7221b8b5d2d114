use alloy_primitives::B256;
use alloy_rpc_types_engine::PayloadStatusEnum;
use taiko_codec::CodecError;
use taiko_engine::EngineError;
use taiko_providers::{ExecutionPayloadProviderError, L1ProviderError, L2ProviderError};

/// The error type of the driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// An error occurred while reading the L1 or the inbox.
    #[error("L1 provider error: {0}")]
    L1Provider(#[from] L1ProviderError),
    /// An error occurred while reading the L2 execution engine.
    #[error("L2 provider error: {0}")]
    L2Provider(#[from] L2ProviderError),
    /// The execution engine rejected a block.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    /// The transaction list of a proposal could not be fetched.
    #[error("failed to fetch transaction list: {0}")]
    TxListFetch(#[from] TxListFetchError),
    /// The checkpoint node could not be read.
    #[error("checkpoint provider error: {0}")]
    CheckpointProvider(#[from] ExecutionPayloadProviderError),
    /// The anchor transaction could not be signed.
    #[error("failed to sign anchor transaction: {0}")]
    Signer(#[from] alloy_signer::Error),
    /// The golden touch key is not a valid secp256k1 key.
    #[error("invalid golden touch private key")]
    InvalidGoldenTouchKey,
    /// A preconfirmation transaction list could not be decompressed.
    #[error("invalid preconfirmation transaction list: {0}")]
    Codec(#[from] CodecError),
    /// The L1 header at the height is missing.
    #[error("L1 header not found - block number: {0}")]
    MissingL1Header(u64),
    /// The L1 header with the hash is missing.
    #[error("L1 header not found - block hash: {0}")]
    MissingL1HeaderByHash(B256),
    /// The L2 header at the height is missing.
    #[error("L2 header not found - block number: {0}")]
    MissingL2Header(u64),
    /// The L2 header with the hash is missing.
    #[error("L2 header not found - block hash: {0}")]
    MissingL2HeaderByHash(B256),
    /// The L1 origin of the L2 block is missing.
    #[error("L1 origin not found - block id: {0}")]
    MissingL1Origin(u64),
    /// The first transaction of the L2 block is not an anchor transaction.
    #[error("anchor transaction not found - block id: {0}")]
    MissingAnchor(u64),
    /// The checkpoint node has no payload for the beacon sync target.
    #[error("checkpoint payload not found - block id: {0}")]
    MissingCheckpointPayload(u64),
    /// The engine answered a beacon sync request with an unexpected status.
    #[error("unexpected beacon sync status: {0:?}")]
    BeaconSyncStatus(PayloadStatusEnum),
    /// The preconfirmation block is not above the head L1 origin.
    #[error("preconfirmation block {number} is not above the head L1 origin {head}")]
    PreconfBehindHead {
        /// The preconfirmation block number.
        number: u64,
        /// The head L1 origin block id.
        head: u64,
    },
    /// The preconfirmation block doesn't extend the canonical chain.
    #[error("preconfirmation block {number} is not based on the canonical chain")]
    PreconfNotCanonical {
        /// The preconfirmation block number.
        number: u64,
    },
    /// The preconfirmation payload carries other than a single transaction list.
    #[error("expected exactly one transaction list, got {0}")]
    PreconfTransactionCount(usize),
    /// Preconfirmation blocks can't be removed below the head L1 origin.
    #[error("can't remove blocks below the head L1 origin: {target} < {head}")]
    RemoveBelowHead {
        /// The requested new last block id.
        target: u64,
        /// The head L1 origin block id.
        head: u64,
    },
}

/// An error fetching the transaction list of a proposal.
#[derive(Debug, thiserror::Error)]
pub enum TxListFetchError {
    /// The calldata fetcher was handed a blob proposal.
    #[error("proposal transaction list is carried by blobs")]
    BlobUsed,
    /// The blob fetcher was handed a calldata proposal.
    #[error("proposal transaction list is carried by calldata")]
    BlobNotUsed,
    /// The proposal event carrying the transaction list was not found.
    #[error("proposal {proposal_id} transaction list not found in L1 block {height}")]
    CalldataNotFound {
        /// The batch id, or block id before Pacaya.
        proposal_id: u64,
        /// The L1 block expected to carry the transaction list.
        height: u64,
    },
    /// The blob sidecar is not available, which may resolve by retrying.
    #[error("blob sidecar not found: {hash}")]
    SidecarNotFound {
        /// The versioned hash of the blob.
        hash: B256,
    },
    /// The L1 header of the blob is missing.
    #[error("L1 header not found - block number: {0}")]
    MissingL1Header(u64),
    /// The transaction list couldn't be sliced or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// An error occurred while reading the L1.
    #[error(transparent)]
    L1Provider(#[from] L1ProviderError),
}
