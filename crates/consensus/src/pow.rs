//! Proof-of-work.
//!
//! A proof `p` is valid against the previous block's proof `l` when the
//! SHA-256 hex digest of the decimal string `"{l}{p}"` starts with
//! [`DIFFICULTY_PREFIX`]. The search walks `p = 0, 1, 2, ...` and so always
//! returns the smallest valid proof. With four hex zeros the expected cost is
//! about 65 536 digests.

use quorumchain_core::{sha256, Hash};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::debug;

/// Required prefix of the proof digest.
pub const DIFFICULTY_PREFIX: &str = "0000";

/// How many candidates are tried between checks of the cancel flag.
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Errors that can occur while running a proof search.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("proof search for last proof {0} was cancelled")]
    Cancelled(u64),

    #[error("proof search worker panicked")]
    WorkerPanicked,

    #[error("failed to spawn proof search worker: {0}")]
    Spawn(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Digest checked by the work predicate.
pub fn proof_digest(last_proof: u64, proof: u64) -> Hash {
    sha256(format!("{last_proof}{proof}").as_bytes())
}

/// The work predicate.
pub fn is_valid_proof(last_proof: u64, proof: u64) -> bool {
    proof_digest(last_proof, proof).hex_starts_with(DIFFICULTY_PREFIX)
}

/// Find the smallest proof valid against `last_proof`. Blocks until found.
pub fn find_proof(last_proof: u64) -> u64 {
    let mut proof = 0;
    while !is_valid_proof(last_proof, proof) {
        proof += 1;
    }
    proof
}

/// Like [`find_proof`], but gives up and returns `None` once `token` is
/// cancelled.
pub fn find_proof_cancellable(last_proof: u64, token: &CancelToken) -> Option<u64> {
    let mut proof = 0;
    loop {
        if proof % CANCEL_CHECK_INTERVAL == 0 && token.is_cancelled() {
            debug!(last_proof, tried = proof, "proof search cancelled");
            return None;
        }
        if is_valid_proof(last_proof, proof) {
            return Some(proof);
        }
        proof += 1;
    }
}

/// Shared flag used to abort an in-flight proof search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the search to stop. Once set the token stays set.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A proof search running on its own thread.
///
/// The search can be cancelled when a competing block arrives and the target
/// it was working on is no longer the chain tip.
pub struct ProofSearch {
    last_proof: u64,
    token: CancelToken,
    handle: JoinHandle<Option<u64>>,
}

impl ProofSearch {
    /// Start searching for a proof against `last_proof`.
    pub fn spawn(last_proof: u64) -> Result<Self> {
        Self::spawn_with_token(last_proof, CancelToken::new())
    }

    /// Start a search controlled by an existing token.
    pub fn spawn_with_token(last_proof: u64, token: CancelToken) -> Result<Self> {
        let worker_token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("pow-{last_proof}"))
            .spawn(move || find_proof_cancellable(last_proof, &worker_token))?;

        Ok(Self {
            last_proof,
            token,
            handle,
        })
    }

    /// The proof this search is extending.
    pub fn last_proof(&self) -> u64 {
        self.last_proof
    }

    /// A handle that can cancel this search from elsewhere.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Ask the worker to stop.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the worker and return the proof it found.
    pub fn wait(self) -> Result<u64> {
        match self.handle.join() {
            Ok(Some(proof)) => Ok(proof),
            Ok(None) => Err(ConsensusError::Cancelled(self.last_proof)),
            Err(_) => Err(ConsensusError::WorkerPanicked),
        }
    }
}
