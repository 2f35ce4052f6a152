//! Block structures.
//!
//! Two block shapes live here:
//! - [`Block`]: the proof-of-work block of the single chain.
//! - [`QuorumBlock`]: a sealed [`BlockData`] payload plus the signatures of
//!   the nodes that accepted it.
//!
//! Neither type trusts a cached digest. `Block::hash` is always computed from
//! the fields, and a `QuorumBlock` can only be built by sealing a payload, so
//! the hash it carries is the digest of that exact payload. Blocks that arrive
//! from the wire are checked with [`QuorumBlock::is_consistent`].

use crate::hash::{hash_canonical, Hash};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Previous-hash value carried by every genesis block.
pub const GENESIS_PREVIOUS_HASH: Hash = Hash::ZERO;

/// Marker a node stores against its identity when it signs a block.
pub const SIGNATURE_MARKER: &str = "signed";

/// Get the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// A proof-of-work block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (0 for genesis).
    pub index: u64,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Transactions sealed into this block.
    pub transactions: Vec<Transaction>,
    /// Proof satisfying the work predicate against the previous block's proof.
    pub proof: u64,
    /// Digest of the previous block.
    pub previous_hash: Hash,
}

impl Block {
    /// Create a new block stamped with the current time.
    pub fn new(index: u64, transactions: Vec<Transaction>, proof: u64, previous_hash: Hash) -> Self {
        Self {
            index,
            timestamp: current_timestamp(),
            transactions,
            proof,
            previous_hash,
        }
    }

    /// Create the genesis block. Every node builds the identical block.
    pub fn genesis() -> Self {
        Self {
            index: 0,
            timestamp: 0,
            transactions: Vec::new(),
            proof: 0,
            previous_hash: GENESIS_PREVIOUS_HASH,
        }
    }

    /// Digest of the block's canonical encoding.
    pub fn hash(&self) -> Hash {
        hash_canonical(self)
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        *self == Self::genesis()
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Field map of this block, as sent to peers.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("serialization should not fail")
    }
}

/// Identity of a node taking part in quorum voting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The hashed payload of a quorum block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: Hash,
}

impl BlockData {
    /// Create a payload stamped with the current time.
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: Hash) -> Self {
        Self {
            index,
            timestamp: current_timestamp(),
            transactions,
            previous_hash,
        }
    }

    /// The genesis payload shared by all nodes.
    pub fn genesis() -> Self {
        Self {
            index: 0,
            timestamp: 0,
            transactions: Vec::new(),
            previous_hash: GENESIS_PREVIOUS_HASH,
        }
    }

    /// Digest of the payload's canonical encoding.
    pub fn digest(&self) -> Hash {
        hash_canonical(self)
    }
}

/// A sealed payload, its digest and the signatures collected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumBlock {
    data: BlockData,
    hash: Hash,
    signatures: BTreeMap<NodeId, String>,
}

impl QuorumBlock {
    /// Seal a payload. The payload cannot change afterwards, so the captured
    /// digest stays correct for the lifetime of the block.
    pub fn seal(data: BlockData) -> Self {
        let hash = data.digest();
        Self {
            data,
            hash,
            signatures: BTreeMap::new(),
        }
    }

    /// The genesis block of the quorum variant.
    pub fn genesis() -> Self {
        Self::seal(BlockData::genesis())
    }

    /// The sealed payload.
    pub fn data(&self) -> &BlockData {
        &self.data
    }

    /// The digest carried with the block.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// The digest recomputed from the payload.
    pub fn computed_hash(&self) -> Hash {
        self.data.digest()
    }

    /// Check that the carried digest matches the payload.
    pub fn is_consistent(&self) -> bool {
        self.hash == self.computed_hash()
    }

    pub fn index(&self) -> u64 {
        self.data.index
    }

    pub fn previous_hash(&self) -> Hash {
        self.data.previous_hash
    }

    pub fn signatures(&self) -> &BTreeMap<NodeId, String> {
        &self.signatures
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_signed_by(&self, node: &NodeId) -> bool {
        self.signatures.contains_key(node)
    }

    /// Record `signer`'s signature. Returns false if it was already present.
    pub fn add_signature(&mut self, signer: NodeId) -> bool {
        if self.signatures.contains_key(&signer) {
            return false;
        }
        self.signatures.insert(signer, SIGNATURE_MARKER.to_string());
        true
    }

    /// Drop every signature whose signer fails `keep`. Returns how many were
    /// dropped.
    pub fn retain_signatures(&mut self, mut keep: impl FnMut(&NodeId) -> bool) -> usize {
        let before = self.signatures.len();
        self.signatures.retain(|signer, _| keep(signer));
        before - self.signatures.len()
    }

    /// Field map of this block, as sent to peers.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("serialization should not fail")
    }
}
