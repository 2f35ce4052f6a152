//! The proof-of-work chain.
//!
//! A [`Blockchain`] owns its blocks, its pending-transaction buffer and the
//! set of peers it resolves conflicts against. Nothing here is global: two
//! chains in the same process share no state.

use crate::mempool::{Mempool, MempoolConfig, MempoolError};
use parking_lot::RwLock;
use quorumchain_consensus::{
    find_proof, find_proof_cancellable, is_valid_proof, BlockValidator, CancelToken, ChainSnapshot,
    ConsensusError, ConsensusResolver, PeerChain, Resolution, ValidationError,
};
use quorumchain_core::{Block, Hash, Transaction};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("mempool error: {0}")]
    Mempool(#[from] MempoolError),

    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("invalid node address: {0:?}")]
    InvalidNodeAddress(String),
}

pub type Result<T> = std::result::Result<T, BlockchainError>;

/// A chain guarded for use from several tasks at once.
pub type SharedBlockchain = Arc<RwLock<Blockchain>>;

/// Blockchain configuration.
#[derive(Debug, Clone)]
pub struct BlockchainConfig {
    /// Pending-transaction buffer configuration.
    pub mempool: MempoolConfig,
    /// Amount paid to the miner of each block.
    pub mining_reward: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            mempool: MempoolConfig::default(),
            mining_reward: 1,
        }
    }
}

/// An append-only chain of proof-of-work blocks.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// Committed blocks, genesis first. Never empty.
    chain: Vec<Block>,
    /// Transactions waiting for the next block.
    mempool: Mempool,
    /// Known peers as `host:port`, iterated in sorted order.
    nodes: BTreeSet<String>,
    /// Configuration.
    config: BlockchainConfig,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a chain holding only the genesis block.
    pub fn new() -> Self {
        Self::with_config(BlockchainConfig::default())
    }

    /// Create a chain with the given configuration.
    pub fn with_config(config: BlockchainConfig) -> Self {
        let mut blockchain = Self {
            chain: Vec::new(),
            mempool: Mempool::with_config(config.mempool.clone()),
            nodes: BTreeSet::new(),
            config,
        };
        blockchain.create_genesis();
        blockchain
    }

    /// Rebuild a chain from stored blocks.
    ///
    /// The blocks must start with the canonical genesis and pass validation.
    pub fn from_blocks(blocks: Vec<Block>, config: BlockchainConfig) -> Result<Self> {
        BlockValidator::validate_rooted_chain(&blocks)?;
        Ok(Self {
            chain: blocks,
            mempool: Mempool::with_config(config.mempool.clone()),
            nodes: BTreeSet::new(),
            config,
        })
    }

    fn create_genesis(&mut self) {
        debug_assert!(self.chain.is_empty());
        self.chain.push(Block::genesis());
    }

    /// Wrap this chain for shared use.
    pub fn into_shared(self) -> SharedBlockchain {
        Arc::new(RwLock::new(self))
    }

    /// Committed blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Number of committed blocks.
    pub fn length(&self) -> usize {
        self.chain.len()
    }

    /// The chain's tail.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("chain always holds the genesis block")
    }

    /// Configuration.
    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Buffer a transaction. Returns the index of the block that will hold it.
    pub fn add_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<u64> {
        self.submit_transaction(Transaction::new(sender, recipient, amount))
    }

    /// Buffer an already built transaction.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<u64> {
        self.mempool.add(tx)?;
        Ok(self.next_index())
    }

    /// Transactions waiting for the next block.
    pub fn pending_transactions(&self) -> &[Transaction] {
        self.mempool.pending()
    }

    /// Index the next block will carry. Validated chains are numbered by
    /// position, so this is the chain length.
    pub fn next_index(&self) -> u64 {
        self.chain.len() as u64
    }

    // =========================================================================
    // Block Production
    // =========================================================================

    /// Seal the pending transactions into a new block carrying `proof`.
    ///
    /// The proof must satisfy the work predicate against the tail's proof;
    /// otherwise nothing changes and the buffer is kept.
    pub fn append(&mut self, proof: u64) -> Result<Block> {
        self.seal(proof, None, |_| Ok(()))
    }

    /// Seal the pending transactions plus the mining reward for `miner`.
    ///
    /// The reward never enters the buffer, so a full buffer cannot block it.
    pub fn forge(&mut self, miner: &str, proof: u64) -> Result<Block> {
        self.forge_then(miner, proof, |_| Ok(()))
    }

    /// Like [`forge`](Self::forge), but hands the block to `persist` before
    /// it joins the chain. If `persist` fails, chain and buffer are left as
    /// they were.
    pub fn forge_then<E, F>(
        &mut self,
        miner: &str,
        proof: u64,
        persist: F,
    ) -> std::result::Result<Block, E>
    where
        E: From<BlockchainError>,
        F: FnOnce(&Block) -> std::result::Result<(), E>,
    {
        let reward = Transaction::reward(miner, self.config.mining_reward);
        self.seal(proof, Some(reward), persist)
    }

    fn seal<E, F>(
        &mut self,
        proof: u64,
        reward: Option<Transaction>,
        persist: F,
    ) -> std::result::Result<Block, E>
    where
        E: From<BlockchainError>,
        F: FnOnce(&Block) -> std::result::Result<(), E>,
    {
        let index = self.next_index();
        let last = self.last_block();
        if !is_valid_proof(last.proof, proof) {
            let err = ValidationError::InvalidProof {
                index,
                last_proof: last.proof,
                proof,
            };
            return Err(BlockchainError::from(err).into());
        }

        let mut transactions = self.mempool.pending().to_vec();
        transactions.extend(reward);
        let block = Block::new(index, transactions, proof, last.hash());
        persist(&block)?;

        self.mempool.clear();
        info!(
            index,
            proof,
            transactions = block.tx_count(),
            "appended block"
        );
        self.chain.push(block.clone());
        Ok(block)
    }

    /// Run a full mining round: find a proof, pay `miner`, append.
    pub fn mine(&mut self, miner: &str) -> Result<Block> {
        let proof = find_proof(self.last_block().proof);
        self.forge(miner, proof)
    }

    /// Like [`mine`](Self::mine), but returns `Ok(None)` if `token` is
    /// cancelled before a proof is found. The buffer is untouched then.
    pub fn mine_cancellable(&mut self, miner: &str, token: &CancelToken) -> Result<Option<Block>> {
        let last_proof = self.last_block().proof;
        match find_proof_cancellable(last_proof, token) {
            Some(proof) => self.forge(miner, proof).map(Some),
            None => {
                debug!(last_proof, "mining round abandoned");
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check a candidate chain's links and proofs.
    pub fn is_valid(candidate: &[Block]) -> bool {
        BlockValidator::is_valid_chain(candidate)
    }

    // =========================================================================
    // Peers & Conflict Resolution
    // =========================================================================

    /// Register a peer by address. Accepts `host:port` or a URL such as
    /// `http://host:port/`; returns the normalized `host:port`.
    pub fn register_node(&mut self, address: &str) -> Result<String> {
        let node = normalize_node_address(address)
            .ok_or_else(|| BlockchainError::InvalidNodeAddress(address.to_string()))?;
        if self.nodes.insert(node.clone()) {
            info!(%node, "registered peer");
        }
        Ok(node)
    }

    /// Known peers in sorted order.
    pub fn nodes(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }

    /// Replace the chain with the longest valid candidate, if one is longer.
    ///
    /// Returns true when the local chain was replaced. Candidates that do not
    /// start with the genesis block are ignored.
    pub fn resolve_conflicts(&mut self, candidates: Vec<PeerChain>) -> bool {
        match self.resolve_conflicts_then(candidates, |_| Ok::<(), Infallible>(())) {
            Ok(replaced) => replaced,
            Err(never) => match never {},
        }
    }

    /// Like [`resolve_conflicts`](Self::resolve_conflicts), but the winning
    /// chain goes through `persist` first and is only adopted if that works.
    pub fn resolve_conflicts_then<E, F>(
        &mut self,
        candidates: Vec<PeerChain>,
        persist: F,
    ) -> std::result::Result<bool, E>
    where
        F: FnOnce(&[Block]) -> std::result::Result<(), E>,
    {
        let candidates = candidates
            .into_iter()
            .filter(|candidate| match candidate.snapshot.chain.first() {
                Some(first) if first.is_genesis() => true,
                _ => {
                    warn!(peer = %candidate.peer, "peer chain has a foreign genesis");
                    false
                }
            })
            .collect();

        match ConsensusResolver::resolve(&self.chain, candidates) {
            Resolution::Replaced { peer, chain } => {
                persist(&chain)?;
                info!(%peer, old = self.chain.len(), new = chain.len(), "chain replaced");
                self.chain = chain;
                Ok(true)
            }
            Resolution::Kept => Ok(false),
        }
    }

    /// The chain as served on `GET /chain`.
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot::new(self.chain.clone())
    }

    /// Get blockchain statistics.
    pub fn stats(&self) -> BlockchainStats {
        let last = self.last_block();
        BlockchainStats {
            length: self.chain.len(),
            last_block_hash: last.hash(),
            last_proof: last.proof,
            pending_transactions: self.mempool.len(),
            known_nodes: self.nodes.len(),
        }
    }
}

fn normalize_node_address(address: &str) -> Option<String> {
    let trimmed = address.trim();
    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
    let host = without_scheme.split('/').next().unwrap_or_default();

    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Blockchain statistics.
#[derive(Debug, Clone)]
pub struct BlockchainStats {
    /// Number of committed blocks.
    pub length: usize,
    /// Hash of the latest block.
    pub last_block_hash: Hash,
    /// Proof of the latest block.
    pub last_proof: u64,
    /// Number of pending transactions.
    pub pending_transactions: usize,
    /// Number of known peers.
    pub known_nodes: usize,
}
