//! Pioneer node entry point: construction and signal handling only. All
//! business logic lives in `pioneer-storage`, `pioneer-wrappers`,
//! `pioneer-distribution`, `pioneer-database`, and `pioneer-repository`.

mod node;

use anyhow::Result;
use node::PioneerNode;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("pioneer=info".parse()?))
        .json()
        .init();

    info!("starting pioneer node");

    let mut node = match PioneerNode::new().await {
        Ok(node) => {
            info!("pioneer node initialized");
            node
        }
        Err(e) => {
            error!("failed to initialize pioneer node: {e}");
            return Err(e);
        }
    };

    if let Err(e) = node.start().await {
        error!("failed to start pioneer node: {e}");
        return Err(e);
    }

    info!(cluster = %node.config().cluster.name, "pioneer node started");

    // First Ctrl+C asks for a graceful stop; a second one before it
    // finishes means the caller wants out immediately.
    match signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal, stopping pioneer node"),
        Err(e) => error!("unable to listen for shutdown signal: {e}"),
    }

    tokio::select! {
        result = node.stop() => {
            if let Err(e) = result {
                error!("error during pioneer node shutdown: {e}");
                return Err(e);
            }
            info!("pioneer node stopped");
        }
        _ = signal::ctrl_c() => {
            error!("second shutdown signal received, aborting without a clean stop");
            std::process::exit(130);
        }
    }

    Ok(())
}
