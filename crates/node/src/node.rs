use crate::{
    args::{L1ProviderArgs, L2ProviderArgs},
    constants, TaikoNodeArgs,
};
use std::{sync::Arc, time::Duration};

use alloy_provider::RootProvider;
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_engine::JwtSecret;
use alloy_transport::layers::RetryBackoffLayer;
use taiko_driver::{
    BlocksInserter, ChainSyncer, DriverConfig, PreconfBlockHandler, State, SyncProgressTracker,
};
use taiko_engine::{auth_provider, EngineDriver};
use taiko_primitives::BlockInfo;
use taiko_providers::{
    AlloyExecutionPayloadProvider, BeaconClientProvider, L2ChainProvider, TaikoInboxClient,
    TaikoL2Client,
};
use tokio::sync::broadcast::error::RecvError;

type L2Client = TaikoL2Client<RootProvider>;
type Inserter = BlocksInserter<
    RootProvider,
    TaikoInboxClient<RootProvider>,
    BeaconClientProvider,
    L2Client,
    RootProvider,
>;
type Syncer = ChainSyncer<
    RootProvider,
    TaikoInboxClient<RootProvider>,
    BeaconClientProvider,
    L2Client,
    RootProvider,
    AlloyExecutionPayloadProvider<RootProvider>,
>;
type Handler = PreconfBlockHandler<
    RootProvider,
    TaikoInboxClient<RootProvider>,
    BeaconClientProvider,
    L2Client,
    RootProvider,
>;

/// The Taiko driver node: keeps the L2 execution engine in sync with the proposals of the inbox
/// and imports the preconfirmation blocks cached for the new L2 head.
#[derive(Debug)]
pub struct TaikoDriverNode {
    /// The driver cursors.
    state: Arc<State<RootProvider, L2Client>>,
    /// The beacon sync tracker.
    tracker: Arc<SyncProgressTracker<L2Client>>,
    /// The chain syncer.
    syncer: Syncer,
    /// The preconfirmation blocks handler.
    preconf: Arc<Handler>,
}

impl TaikoDriverNode {
    /// Connects to the L1, L2 and checkpoint nodes and builds the driver components. Returns once
    /// the execution engine answers the engine API.
    pub async fn new(args: &TaikoNodeArgs) -> eyre::Result<Self> {
        let config = args.driver_config().map_err(|err| eyre::eyre!(err))?;

        let l1 = l1_provider(&args.l1_provider_args);
        let protocol = TaikoInboxClient::new(l1.clone(), config.inbox);
        let blobs = BeaconClientProvider::new_http(
            args.l1_provider_args.beacon_url.clone(),
            args.l1_provider_args.blob_cache_size,
        )
        .await?;

        let L2ProviderArgs { auth_url, jwt_secret, .. } = &args.l2_provider_args;
        let jwt = JwtSecret::from_file(jwt_secret)?;
        let auth = auth_provider(auth_url.clone(), jwt);
        let l2 = TaikoL2Client::new(l2_provider(&args.l2_provider_args), auth.clone(), config.anchor);

        let checkpoint = args.driver_args.checkpoint_url.clone().map(|url| {
            let retry_layer = RetryBackoffLayer::new(
                constants::PROVIDER_MAX_RETRIES,
                constants::PROVIDER_INITIAL_BACKOFF,
                constants::PROVIDER_COMPUTE_UNITS_PER_SECOND,
            );
            AlloyExecutionPayloadProvider::new(RootProvider::new(
                RpcClient::builder().layer(retry_layer).http(url),
            ))
        });

        let head = l2.l2_head().await?;
        tracing::info!(target: "taiko::node", head = %BlockInfo::from(&head), "waiting on execution engine");
        let engine = EngineDriver::init_and_wait_for_engine(auth, head.hash).await;

        Self::from_components(config, l1, protocol, blobs, l2, engine, checkpoint).await
    }

    async fn from_components(
        config: DriverConfig,
        l1: RootProvider,
        protocol: TaikoInboxClient<RootProvider>,
        blobs: BeaconClientProvider,
        l2: L2Client,
        engine: EngineDriver<RootProvider>,
        checkpoint: Option<AlloyExecutionPayloadProvider<RootProvider>>,
    ) -> eyre::Result<Self> {
        let tracker = Arc::new(SyncProgressTracker::new(l2.clone(), config.tracker));
        let state = Arc::new(
            State::new(
                l1.clone(),
                l2.clone(),
                config.inbox,
                config.genesis_l1_height,
                config.fork_heights,
            )
            .await?,
        );
        let inserter: Arc<Inserter> = Arc::new(BlocksInserter::new(
            l1.clone(),
            protocol.clone(),
            blobs,
            l2.clone(),
            engine,
            tracker.clone(),
            &config,
        )?);
        let syncer = ChainSyncer::new(
            state.clone(),
            inserter.clone(),
            protocol,
            tracker.clone(),
            checkpoint,
            l1,
            l2,
            &config,
        );
        let preconf = Arc::new(PreconfBlockHandler::new(inserter, tracker.clone(), &config));

        tracing::info!(
            target: "taiko::node",
            chain_id = config.chain_id,
            inbox = %config.inbox,
            anchor = %config.anchor,
            p2p_sync = config.p2p_sync,
            replay_guard = %config.replay_guard,
            "driver initialized"
        );
        Ok(Self { state, tracker, syncer, preconf })
    }

    /// Returns the preconfirmation blocks handler, to be served by the preconfirmation API.
    pub fn preconf_handler(&self) -> Arc<Handler> {
        self.preconf.clone()
    }

    /// Runs the driver until a shutdown signal is received: a sync step is run at startup and on
    /// every new L1 head, failed steps are retried with an exponential backoff.
    pub async fn run(mut self) -> eyre::Result<()> {
        let mut l1_heads = self.state.subscribe_l1_heads();
        let state_handle = self.state.spawn();
        let tracker_handle = self.tracker.spawn();

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let mut backoff = Duration::from_millis(constants::SYNC_RETRY_BACKOFF);
        let result = loop {
            let wait = match self.step().await {
                Ok(()) => {
                    backoff = Duration::from_millis(constants::SYNC_RETRY_BACKOFF);
                    None
                }
                Err(err) => {
                    tracing::error!(target: "taiko::node", ?err, ?backoff, "sync step failed");
                    Some(backoff)
                }
            };

            tokio::select! {
                res = &mut shutdown => {
                    tracing::info!(target: "taiko::node", "shutting down driver");
                    break res.map_err(Into::into)
                }
                _ = sleep_or_pending(wait) => {
                    backoff = (backoff * 2).min(Duration::from_millis(constants::SYNC_MAX_RETRY_BACKOFF));
                }
                head = l1_heads.recv(), if wait.is_none() => match head {
                    Ok(head) => tracing::trace!(target: "taiko::node", %head, "new L1 head"),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(target: "taiko::node", skipped, "L1 heads feed lagged");
                    }
                    Err(RecvError::Closed) => break Err(eyre::eyre!("L1 heads feed closed")),
                },
            }
        };

        state_handle.abort();
        tracker_handle.abort();
        result
    }

    /// Runs a sync pass then imports the preconfirmation blocks cached on top of the new head.
    async fn step(&mut self) -> eyre::Result<()> {
        self.syncer.sync().await?;
        let imported = self.preconf.import_pending_blocks_from_cache().await?;
        if let Some(last) = imported.last() {
            tracing::info!(
                target: "taiko::node",
                count = imported.len(),
                head = %BlockInfo::from(last),
                "imported cached preconfirmation blocks"
            );
        }
        Ok(())
    }
}

/// Sleeps for the provided duration, or never resolves when there is none.
async fn sleep_or_pending(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Returns an L1 provider retrying failed requests with a backoff.
fn l1_provider(args: &L1ProviderArgs) -> RootProvider {
    let L1ProviderArgs { url, max_retries, initial_backoff, compute_units_per_second, .. } = args;
    let client = RpcClient::builder()
        .layer(RetryBackoffLayer::new(*max_retries, *initial_backoff, *compute_units_per_second))
        .http(url.clone());
    RootProvider::new(client)
}

/// Returns a provider of the public RPC of the execution engine retrying failed requests.
fn l2_provider(args: &L2ProviderArgs) -> RootProvider {
    let L2ProviderArgs { url, max_retries, initial_backoff, compute_units_per_second, .. } = args;
    let client = RpcClient::builder()
        .layer(RetryBackoffLayer::new(*max_retries, *initial_backoff, *compute_units_per_second))
        .http(url.clone());
    RootProvider::new(client)
}
