//! Core blockchain primitives for quorumchain.
//!
//! This crate provides the fundamental types used throughout the blockchain:
//! - SHA-256 digests and canonical serialization
//! - Transactions
//! - Proof-of-work blocks
//! - Quorum blocks (sealed payload plus node signatures)

pub mod block;
pub mod hash;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use block::{Block, BlockData, NodeId, QuorumBlock, GENESIS_PREVIOUS_HASH, SIGNATURE_MARKER};
pub use hash::{canonical_bytes, hash_canonical, sha256, Hash, H256};
pub use transaction::{Transaction, TransactionError, REWARD_SENDER};
