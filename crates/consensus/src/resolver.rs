//! Longest-valid-chain fork resolution.
//!
//! The resolver never talks to the network. It is handed the chains a
//! transport already fetched from peers and decides whether one of them
//! should replace the local chain.

use crate::validator::BlockValidator;
use quorumchain_core::Block;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A full chain as served by a peer's `GET /chain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Number of blocks the peer reports.
    pub length: usize,
    /// The blocks, genesis first.
    pub chain: Vec<Block>,
}

impl ChainSnapshot {
    pub fn new(chain: Vec<Block>) -> Self {
        Self {
            length: chain.len(),
            chain,
        }
    }
}

/// A snapshot tagged with the peer it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerChain {
    pub peer: String,
    pub snapshot: ChainSnapshot,
}

impl PeerChain {
    pub fn new(peer: impl Into<String>, snapshot: ChainSnapshot) -> Self {
        Self {
            peer: peer.into(),
            snapshot,
        }
    }
}

/// Outcome of a resolution round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No candidate beat the local chain.
    Kept,
    /// `chain`, served by `peer`, should replace the local chain.
    Replaced { peer: String, chain: Vec<Block> },
}

impl Resolution {
    pub fn replaced(&self) -> bool {
        matches!(self, Resolution::Replaced { .. })
    }
}

/// Longest-valid-chain fork choice.
pub struct ConsensusResolver;

impl ConsensusResolver {
    /// Pick the longest valid candidate that is strictly longer than `local`.
    ///
    /// Candidates are examined in ascending peer order and a later candidate
    /// only wins by being strictly longer, so among equally long chains the
    /// lowest peer identity wins. A candidate whose reported length differs
    /// from the number of blocks it carries is skipped.
    pub fn resolve(local: &[Block], mut candidates: Vec<PeerChain>) -> Resolution {
        candidates.sort_by(|a, b| a.peer.cmp(&b.peer));

        let mut best_len = local.len();
        let mut best: Option<PeerChain> = None;

        for candidate in candidates {
            let snapshot = &candidate.snapshot;
            if snapshot.length != snapshot.chain.len() {
                warn!(
                    peer = %candidate.peer,
                    reported = snapshot.length,
                    actual = snapshot.chain.len(),
                    "peer chain length mismatch"
                );
                continue;
            }

            if snapshot.length <= best_len {
                debug!(peer = %candidate.peer, length = snapshot.length, "peer chain not longer");
                continue;
            }

            if let Err(e) = BlockValidator::validate_chain(&snapshot.chain) {
                warn!(peer = %candidate.peer, error = %e, "peer chain invalid");
                continue;
            }

            best_len = snapshot.length;
            best = Some(candidate);
        }

        match best {
            Some(PeerChain { peer, snapshot }) => {
                info!(%peer, length = snapshot.length, "adopting longer peer chain");
                Resolution::Replaced {
                    peer,
                    chain: snapshot.chain,
                }
            }
            None => Resolution::Kept,
        }
    }
}
