//! quorumchain node entry point.

use anyhow::Context;
use clap::Parser;
use quorumchain_server::{build_router, AppState, HttpTransport, NodeConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(if config.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    let transport = HttpTransport::new().context("failed to build HTTP client")?;
    let state = AppState::from_config(&config, Arc::new(transport))
        .context("failed to initialize node state")?;
    let stats = state.blockchain.read().stats();
    info!(
        node_id = %state.node_id,
        length = stats.length,
        tip = %stats.last_block_hash,
        peers = stats.known_nodes,
        "node ready"
    );

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
