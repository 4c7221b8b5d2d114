//! Defaults of the node arguments.

/// The max retries for the L1 and L2 providers.
pub(crate) const PROVIDER_MAX_RETRIES: u32 = 10;

/// The initial backoff for the L1 and L2 providers, in milliseconds.
pub(crate) const PROVIDER_INITIAL_BACKOFF: u64 = 100;

/// The default provider compute units per second.
pub(crate) const PROVIDER_COMPUTE_UNITS_PER_SECOND: u64 = 10000;

/// The L2 chain id of the Taiko mainnet.
pub(crate) const TAIKO_MAINNET_CHAIN_ID: u64 = 167_000;

/// The delay before a failed sync step is retried, in milliseconds.
pub(crate) const SYNC_RETRY_BACKOFF: u64 = 1_000;

/// The maximum delay between two retries of a failing sync step, in milliseconds.
pub(crate) const SYNC_MAX_RETRY_BACKOFF: u64 = 30_000;
