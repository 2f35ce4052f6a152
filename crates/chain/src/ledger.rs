//! Per-node ledger for the quorum variant.
//!
//! A block moves through these states on each node:
//!
//! ```text
//! unseen ──receive_block──► staged/signed(1) ──record_signature──► signed(k)
//!                                  │                                   │
//!                                  └──discard / stale──► discarded     └──commit (k ≥ quorum)──► committed
//! ```
//!
//! Nodes share nothing; blocks and signatures travel between them as values.
//! [`SharedLedger`] adds the exclusive-access guard needed when one node is
//! driven from several tasks at once.

use parking_lot::{Mutex, MutexGuard};
use quorumchain_consensus::{has_quorum, required_signatures, QuorumValidator, ValidationError};
use quorumchain_core::{BlockData, Hash, NodeId, QuorumBlock, Transaction};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("block rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("quorum not met ({have} of {required} signatures)")]
    QuorumNotMet { have: usize, required: usize },

    #[error("unknown block: {0}")]
    UnknownBlock(Hash),

    #[error("signature from unknown node: {0}")]
    UnknownSigner(NodeId),

    #[error("too many staged blocks (limit: {0})")]
    TooManyPending(usize),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Distinct blocks a node keeps staged on its tail at once.
pub const MAX_PENDING_BLOCKS: usize = 64;

/// One node's view: its committed chain, its peers and its staged blocks.
#[derive(Debug, Clone)]
pub struct NodeLedger {
    node_id: NodeId,
    /// Committed blocks, genesis first. Never empty.
    chain: Vec<QuorumBlock>,
    known_nodes: BTreeSet<NodeId>,
    pending_blocks: HashMap<Hash, QuorumBlock>,
}

impl NodeLedger {
    /// Create a ledger holding only the genesis block.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        let mut ledger = Self {
            node_id: node_id.into(),
            chain: Vec::new(),
            known_nodes: BTreeSet::new(),
            pending_blocks: HashMap::new(),
        };
        ledger.create_genesis();
        ledger
    }

    fn create_genesis(&mut self) {
        debug_assert!(self.chain.is_empty());
        self.chain.push(QuorumBlock::genesis());
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Committed blocks, genesis first.
    pub fn chain(&self) -> &[QuorumBlock] {
        &self.chain
    }

    /// The committed tail.
    pub fn last_block(&self) -> &QuorumBlock {
        self.chain
            .last()
            .expect("ledger always holds the genesis block")
    }

    /// Peers in sorted order. Does not include this node.
    pub fn known_nodes(&self) -> &BTreeSet<NodeId> {
        &self.known_nodes
    }

    /// Whether `node` may sign for this ledger: itself or a known peer.
    pub fn is_member(&self, node: &NodeId) -> bool {
        *node == self.node_id || self.known_nodes.contains(node)
    }

    /// Add a peer. Returns false for this node's own id or a repeat.
    pub fn register_node(&mut self, node: impl Into<NodeId>) -> bool {
        let node = node.into();
        if node == self.node_id {
            return false;
        }
        self.known_nodes.insert(node)
    }

    /// A staged block.
    pub fn pending(&self, hash: &Hash) -> Option<&QuorumBlock> {
        self.pending_blocks.get(hash)
    }

    pub fn pending_count(&self) -> usize {
        self.pending_blocks.len()
    }

    // =========================================================================
    // Proposal & Reception
    // =========================================================================

    /// Build a block on top of the committed tail.
    ///
    /// The block is not staged; hand it to [`receive_block`](Self::receive_block)
    /// on this node and its peers.
    pub fn propose_block(&self, transactions: Vec<Transaction>) -> QuorumBlock {
        let tip = self.last_block();
        QuorumBlock::seal(BlockData::new(tip.index() + 1, transactions, tip.hash()))
    }

    /// Check that `block` extends the committed tail and that its hash is the
    /// digest of its payload.
    pub fn check_block(&self, block: &QuorumBlock) -> std::result::Result<(), ValidationError> {
        QuorumValidator::validate_block(block, self.last_block())
    }

    /// Validate, stage and sign a block.
    ///
    /// Returns false and changes nothing if the block fails validation or the
    /// staging area is full. See [`stage_block`](Self::stage_block).
    pub fn receive_block(&mut self, block: QuorumBlock) -> bool {
        let hash = block.hash();
        match self.stage_block(block) {
            Ok(()) => true,
            Err(e) => {
                debug!(node = %self.node_id, %hash, error = %e, "block not staged");
                false
            }
        }
    }

    /// Validate, stage and sign a block.
    ///
    /// Signatures the block carries from nodes outside this ledger's
    /// membership are dropped. Receiving an already staged block merges the
    /// remaining ones.
    pub fn stage_block(&mut self, mut block: QuorumBlock) -> Result<()> {
        self.check_block(&block)?;

        let hash = block.hash();
        let is_new = !self.pending_blocks.contains_key(&hash);
        if is_new && self.pending_blocks.len() >= MAX_PENDING_BLOCKS {
            return Err(LedgerError::TooManyPending(MAX_PENDING_BLOCKS));
        }

        let dropped = block.retain_signatures(|signer| self.is_member(signer));
        if dropped > 0 {
            warn!(node = %self.node_id, %hash, dropped, "dropped signatures from unknown nodes");
        }

        let mut staged = match self.pending_blocks.remove(&hash) {
            Some(mut existing) => {
                for signer in block.signatures().keys() {
                    existing.add_signature(signer.clone());
                }
                existing
            }
            None => block,
        };
        self.sign_block(&mut staged);

        debug!(
            node = %self.node_id,
            %hash,
            signatures = staged.signature_count(),
            "block staged"
        );
        self.pending_blocks.insert(hash, staged);
        Ok(())
    }

    /// Add this node's signature to `block`.
    pub fn sign_block(&self, block: &mut QuorumBlock) {
        block.add_signature(self.node_id.clone());
    }

    /// Merge a peer's signature into a staged block.
    ///
    /// Returns whether the signature was new.
    pub fn record_signature(&mut self, hash: &Hash, signer: NodeId) -> Result<bool> {
        if !self.is_member(&signer) {
            warn!(node = %self.node_id, %signer, "ignoring signature from unknown node");
            return Err(LedgerError::UnknownSigner(signer));
        }

        let block = self
            .pending_blocks
            .get_mut(hash)
            .ok_or(LedgerError::UnknownBlock(*hash))?;
        Ok(block.add_signature(signer))
    }

    // =========================================================================
    // Quorum & Commit
    // =========================================================================

    /// Signatures needed for a block to be accepted by this node.
    pub fn required_signatures(&self) -> usize {
        required_signatures(self.known_nodes.len())
    }

    /// Signatures on `block` that count toward the quorum.
    pub fn valid_signatures(&self, block: &QuorumBlock) -> usize {
        block
            .signatures()
            .keys()
            .filter(|signer| self.is_member(signer))
            .count()
    }

    /// Quorum predicate: a strict majority of known peers plus this node.
    pub fn is_accepted(&self, block: &QuorumBlock) -> bool {
        has_quorum(self.valid_signatures(block), self.known_nodes.len())
    }

    /// Move a staged block into the chain once it has a quorum.
    ///
    /// A staged block that no longer extends the tail is discarded. After a
    /// commit, every other staged block is stale and is dropped.
    pub fn commit(&mut self, hash: &Hash) -> Result<&QuorumBlock> {
        let block = self
            .pending_blocks
            .get(hash)
            .ok_or(LedgerError::UnknownBlock(*hash))?;

        if !self.is_accepted(block) {
            return Err(LedgerError::QuorumNotMet {
                have: self.valid_signatures(block),
                required: self.required_signatures(),
            });
        }

        if let Err(e) = self.check_block(block) {
            self.pending_blocks.remove(hash);
            warn!(node = %self.node_id, %hash, error = %e, "discarded stale staged block");
            return Err(e.into());
        }

        let Some(block) = self.pending_blocks.remove(hash) else {
            return Err(LedgerError::UnknownBlock(*hash));
        };
        info!(
            node = %self.node_id,
            index = block.index(),
            %hash,
            signatures = block.signature_count(),
            "block committed"
        );
        self.chain.push(block);
        self.prune_stale();

        Ok(self.last_block())
    }

    /// Boolean form of [`commit`](Self::commit). Never fails loudly: an
    /// unknown hash or a missing quorum both return false.
    pub fn try_commit(&mut self, hash: &Hash) -> bool {
        match self.commit(hash).map(|_| ()) {
            Ok(_) => true,
            Err(e) => {
                debug!(node = %self.node_id, %hash, error = %e, "commit deferred");
                false
            }
        }
    }

    /// Drop a staged block.
    pub fn discard(&mut self, hash: &Hash) -> Option<QuorumBlock> {
        let removed = self.pending_blocks.remove(hash);
        if removed.is_some() {
            debug!(node = %self.node_id, %hash, "staged block discarded");
        }
        removed
    }

    fn prune_stale(&mut self) {
        let tip = self.last_block().hash();
        let before = self.pending_blocks.len();
        self.pending_blocks
            .retain(|_, block| block.previous_hash() == tip);

        let pruned = before - self.pending_blocks.len();
        if pruned > 0 {
            debug!(node = %self.node_id, pruned, "pruned stale staged blocks");
        }
    }

    /// Guard this ledger for concurrent callers.
    pub fn into_shared(self) -> SharedLedger {
        SharedLedger(Arc::new(Mutex::new(self)))
    }
}

/// A [`NodeLedger`] behind a mutex, so concurrent handlers cannot interleave
/// mutations of the chain and the staged blocks.
#[derive(Debug, Clone)]
pub struct SharedLedger(Arc<Mutex<NodeLedger>>);

impl SharedLedger {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        NodeLedger::new(node_id).into_shared()
    }

    /// Exclusive access for multi-step operations.
    pub fn lock(&self) -> MutexGuard<'_, NodeLedger> {
        self.0.lock()
    }

    pub fn receive_block(&self, block: QuorumBlock) -> bool {
        self.0.lock().receive_block(block)
    }

    pub fn record_signature(&self, hash: &Hash, signer: NodeId) -> Result<bool> {
        self.0.lock().record_signature(hash, signer)
    }

    pub fn try_commit(&self, hash: &Hash) -> bool {
        self.0.lock().try_commit(hash)
    }

    pub fn propose_block(&self, transactions: Vec<Transaction>) -> QuorumBlock {
        self.0.lock().propose_block(transactions)
    }
}
