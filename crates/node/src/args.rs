use crate::constants;
use std::{path::PathBuf, time::Duration};

use alloy_primitives::{Address, B256};
use clap::Parser;
use taiko_driver::{DriverConfig, ReplayGuard, TrackerConfig, TRACKER_INTERVAL};
use taiko_primitives::{
    anchor_address, ForkHeights, BLOCK_MAX_TX_LIST_BYTES, GOLDEN_TOUCH_PRIVATE_KEY,
};
use taiko_providers::DEFAULT_BLOB_CACHE_SIZE;

/// The arguments of the Taiko driver node.
#[derive(Debug, Clone, Parser)]
#[command(name = "taiko-node", about = "Drives a Taiko L2 execution engine from the Taiko inbox")]
pub struct TaikoNodeArgs {
    /// The L1 provider arguments.
    #[command(flatten)]
    pub l1_provider_args: L1ProviderArgs,
    /// The L2 provider arguments.
    #[command(flatten)]
    pub l2_provider_args: L2ProviderArgs,
    /// The protocol arguments.
    #[command(flatten)]
    pub protocol_args: ProtocolArgs,
    /// The driver arguments.
    #[command(flatten)]
    pub driver_args: DriverArgs,
}

impl TaikoNodeArgs {
    /// Validate that the arguments are consistent with each other.
    pub fn validate(&self) -> Result<(), String> {
        if self.driver_args.p2p_sync && self.driver_args.checkpoint_url.is_none() {
            return Err("P2P sync requires a checkpoint node URL".to_string());
        }

        if self.protocol_args.ontake_fork_height > self.protocol_args.pacaya_fork_height {
            return Err("The Ontake fork cannot activate after the Pacaya fork".to_string());
        }

        if self.driver_args.max_tx_list_bytes == 0 {
            return Err("The maximum transaction list size must be positive".to_string());
        }

        Ok(())
    }

    /// Returns the [`DriverConfig`] of the arguments.
    pub fn driver_config(&self) -> Result<DriverConfig, String> {
        self.validate()?;
        let ProtocolArgs {
            chain_id,
            inbox,
            golden_touch_key,
            ontake_fork_height,
            pacaya_fork_height,
            l1_genesis_height,
            ..
        } = self.protocol_args;
        let anchor = self.protocol_args.anchor().ok_or_else(|| {
            format!("No anchor address can be derived for chain {chain_id}, pass --taiko.anchor")
        })?;
        Ok(DriverConfig {
            chain_id,
            inbox,
            anchor,
            golden_touch_key: golden_touch_key.unwrap_or(GOLDEN_TOUCH_PRIVATE_KEY),
            fork_heights: ForkHeights::new(ontake_fork_height, pacaya_fork_height),
            genesis_l1_height: l1_genesis_height,
            max_tx_list_bytes: self.driver_args.max_tx_list_bytes,
            p2p_sync: self.driver_args.p2p_sync,
            replay_guard: self.driver_args.replay_guard,
            tracker: TrackerConfig {
                timeout: Duration::from_secs(self.driver_args.p2p_sync_timeout),
                interval: TRACKER_INTERVAL,
            },
        })
    }
}

/// The arguments for the L1 provider.
#[derive(Debug, Clone, clap::Args)]
pub struct L1ProviderArgs {
    /// The URL for the L1 RPC.
    #[arg(long = "l1.url", id = "l1_url", value_name = "L1_URL")]
    pub url: reqwest::Url,
    /// The compute units per second for the provider.
    #[arg(long = "l1.cups", id = "l1_compute_units_per_second", value_name = "L1_COMPUTE_UNITS_PER_SECOND", default_value_t = constants::PROVIDER_COMPUTE_UNITS_PER_SECOND)]
    pub compute_units_per_second: u64,
    /// The max amount of retries for the provider.
    #[arg(long = "l1.max-retries", id = "l1_max_retries", value_name = "L1_MAX_RETRIES", default_value_t = constants::PROVIDER_MAX_RETRIES)]
    pub max_retries: u32,
    /// The initial backoff for the provider.
    #[arg(long = "l1.initial-backoff", id = "l1_initial_backoff", value_name = "L1_INITIAL_BACKOFF", default_value_t = constants::PROVIDER_INITIAL_BACKOFF)]
    pub initial_backoff: u64,
    /// The URL of the L1 beacon node serving the blob sidecars.
    #[arg(long = "l1.beacon", id = "l1_beacon", value_name = "L1_BEACON_URL")]
    pub beacon_url: reqwest::Url,
    /// The number of blob sidecars kept in memory.
    #[arg(long = "l1.blob-cache-size", id = "l1_blob_cache_size", value_name = "L1_BLOB_CACHE_SIZE", default_value_t = DEFAULT_BLOB_CACHE_SIZE)]
    pub blob_cache_size: usize,
}

/// The arguments for the L2 execution engine providers.
#[derive(Debug, Clone, clap::Args)]
pub struct L2ProviderArgs {
    /// The URL for the public RPC of the execution engine.
    #[arg(long = "l2.url", id = "l2_url", value_name = "L2_URL")]
    pub url: reqwest::Url,
    /// The URL for the authenticated RPC of the execution engine.
    #[arg(long = "l2.auth", id = "l2_auth", value_name = "L2_AUTH_URL")]
    pub auth_url: reqwest::Url,
    /// The path to the hex encoded JWT secret of the authenticated RPC.
    #[arg(long = "jwt-secret", id = "jwt_secret", value_name = "JWT_SECRET")]
    pub jwt_secret: PathBuf,
    /// The compute units per second for the provider.
    #[arg(long = "l2.cups", id = "l2_compute_units_per_second", value_name = "L2_COMPUTE_UNITS_PER_SECOND", default_value_t = constants::PROVIDER_COMPUTE_UNITS_PER_SECOND)]
    pub compute_units_per_second: u64,
    /// The max amount of retries for the provider.
    #[arg(long = "l2.max-retries", id = "l2_max_retries", value_name = "L2_MAX_RETRIES", default_value_t = constants::PROVIDER_MAX_RETRIES)]
    pub max_retries: u32,
    /// The initial backoff for the provider.
    #[arg(long = "l2.initial-backoff", id = "l2_initial_backoff", value_name = "L2_INITIAL_BACKOFF", default_value_t = constants::PROVIDER_INITIAL_BACKOFF)]
    pub initial_backoff: u64,
}

/// The arguments describing the deployment of the protocol.
#[derive(Debug, Clone, Copy, clap::Args)]
pub struct ProtocolArgs {
    /// The L2 chain id.
    #[arg(long = "taiko.chain-id", id = "taiko_chain_id", value_name = "CHAIN_ID", default_value_t = constants::TAIKO_MAINNET_CHAIN_ID)]
    pub chain_id: u64,
    /// The address of the Taiko inbox on L1.
    #[arg(long = "taiko.inbox", id = "taiko_inbox", value_name = "INBOX_ADDRESS")]
    pub inbox: Address,
    /// The address of the anchor contract on L2, defaults to the known deployment of the chain.
    #[arg(long = "taiko.anchor", id = "taiko_anchor", value_name = "ANCHOR_ADDRESS")]
    pub anchor: Option<Address>,
    /// Overrides the private key signing the anchor transactions.
    #[arg(long = "taiko.golden-touch-key", id = "taiko_golden_touch_key", value_name = "GOLDEN_TOUCH_KEY")]
    pub golden_touch_key: Option<B256>,
    /// The first L2 block of the Ontake fork.
    #[arg(long = "taiko.ontake-fork-height", id = "taiko_ontake_fork_height", value_name = "ONTAKE_FORK_HEIGHT", default_value_t = 0)]
    pub ontake_fork_height: u64,
    /// The first L2 block of the Pacaya fork.
    #[arg(long = "taiko.pacaya-fork-height", id = "taiko_pacaya_fork_height", value_name = "PACAYA_FORK_HEIGHT", default_value_t = 0)]
    pub pacaya_fork_height: u64,
    /// The L1 block the inbox was deployed in.
    #[arg(long = "taiko.l1-genesis-height", id = "taiko_l1_genesis_height", value_name = "L1_GENESIS_HEIGHT", default_value_t = 0)]
    pub l1_genesis_height: u64,
}

impl ProtocolArgs {
    /// Returns the anchor address, falling back to the known deployment of the chain.
    pub fn anchor(&self) -> Option<Address> {
        self.anchor.or_else(|| anchor_address(self.chain_id))
    }
}

/// The arguments of the driver.
#[derive(Debug, Clone, clap::Args)]
pub struct DriverArgs {
    /// Whether the engine may beacon sync from a checkpoint node.
    #[arg(long = "driver.p2p-sync", id = "driver_p2p_sync")]
    pub p2p_sync: bool,
    /// The time in seconds without beacon sync progress after which the engine is out of sync.
    #[arg(long = "driver.p2p-sync-timeout", id = "driver_p2p_sync_timeout", value_name = "P2P_SYNC_TIMEOUT", default_value_t = taiko_driver::DEFAULT_P2P_SYNC_TIMEOUT.as_secs())]
    pub p2p_sync_timeout: u64,
    /// The URL of the checkpoint node to beacon sync from.
    #[arg(long = "driver.checkpoint-url", id = "driver_checkpoint_url", value_name = "CHECKPOINT_URL")]
    pub checkpoint_url: Option<reqwest::Url>,
    /// How already inserted proposals are recognized: `block-id` or `batch-id`.
    #[arg(long = "driver.replay-guard", id = "driver_replay_guard", value_name = "REPLAY_GUARD", default_value_t = ReplayGuard::BlockId)]
    pub replay_guard: ReplayGuard,
    /// The maximum size of a calldata transaction list.
    #[arg(long = "driver.max-tx-list-bytes", id = "driver_max_tx_list_bytes", value_name = "MAX_TX_LIST_BYTES", default_value_t = BLOCK_MAX_TX_LIST_BYTES as usize)]
    pub max_tx_list_bytes: usize,
}
