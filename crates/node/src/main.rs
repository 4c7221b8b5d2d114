//! Taiko driver binary

use clap::Parser;
use taiko_node::{TaikoDriverNode, TaikoNodeArgs};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing_subscriber()?;

    let args = TaikoNodeArgs::parse();
    args.validate().map_err(|err| eyre::eyre!(err))?;

    tracing::info!(target: "taiko::node", "launching driver");
    let node = TaikoDriverNode::new(&args).await?;
    node.run().await
}

/// Initialize a tracing subscriber logging to the console, filtered by `RUST_LOG` and defaulting
/// to the `info` level.
fn init_tracing_subscriber() -> eyre::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_ansi(true),
        )
        .with(filter)
        .try_init()?;
    Ok(())
}
