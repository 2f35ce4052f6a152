//! Chain synchronization with peers.
//!
//! Fetching is abstracted behind [`ChainTransport`] so the resolution logic
//! can run against in-process nodes in tests and against HTTP peers in the
//! server. No lock is held while peers are contacted.

use crate::blockchain::SharedBlockchain;
use async_trait::async_trait;
use quorumchain_consensus::{ChainSnapshot, PeerChain};
use quorumchain_core::Block;
use std::collections::BTreeMap;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while fetching a peer's chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    #[error("peer {peer} answered with status {status}")]
    Status { peer: String, status: u16 },

    #[error("peer {peer} sent a malformed chain: {reason}")]
    Malformed { peer: String, reason: String },
}

/// Source of peer chains.
#[async_trait]
pub trait ChainTransport: Send + Sync {
    /// Fetch the full chain a peer currently holds.
    async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot, TransportError>;
}

/// Fetch every peer's chain, skipping the ones that fail.
pub async fn fetch_candidates<T>(transport: &T, peers: &[String]) -> Vec<PeerChain>
where
    T: ChainTransport + ?Sized,
{
    let mut candidates = Vec::with_capacity(peers.len());
    for peer in peers {
        match transport.fetch_chain(peer).await {
            Ok(snapshot) => {
                debug!(%peer, length = snapshot.length, "fetched peer chain");
                candidates.push(PeerChain::new(peer.clone(), snapshot));
            }
            Err(e) => warn!(%peer, error = %e, "skipping peer"),
        }
    }
    candidates
}

/// Run one resolution round for `blockchain` against its registered peers.
///
/// Returns true if the local chain was replaced.
pub async fn sync_chain<T>(blockchain: &SharedBlockchain, transport: &T) -> bool
where
    T: ChainTransport + ?Sized,
{
    match sync_chain_then(blockchain, transport, |_| Ok::<(), Infallible>(())).await {
        Ok(replaced) => replaced,
        Err(never) => match never {},
    }
}

/// Like [`sync_chain`], but a winning chain is passed to `persist` while the
/// write lock is held and adopted only if that succeeds.
pub async fn sync_chain_then<T, E, F>(
    blockchain: &SharedBlockchain,
    transport: &T,
    persist: F,
) -> Result<bool, E>
where
    T: ChainTransport + ?Sized,
    F: FnOnce(&[Block]) -> Result<(), E>,
{
    let peers = blockchain.read().nodes();
    if peers.is_empty() {
        debug!("no peers registered, nothing to resolve");
        return Ok(false);
    }

    let candidates = fetch_candidates(transport, &peers).await;
    let mut chain = blockchain.write();
    let replaced = chain.resolve_conflicts_then(candidates, persist)?;
    if replaced {
        info!(length = chain.length(), "chain replaced by peer");
    }
    Ok(replaced)
}

/// Transport that reads chains straight out of in-process nodes.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    peers: BTreeMap<String, SharedBlockchain>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `node` reachable under `address`.
    pub fn insert(&mut self, address: impl Into<String>, node: SharedBlockchain) {
        self.peers.insert(address.into(), node);
    }
}

#[async_trait]
impl ChainTransport for LocalTransport {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot, TransportError> {
        let node = self
            .peers
            .get(peer)
            .ok_or_else(|| TransportError::Unreachable {
                peer: peer.to_string(),
                reason: "no such node".into(),
            })?;
        let snapshot = node.read().snapshot();
        Ok(snapshot)
    }
}
