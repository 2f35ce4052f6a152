//! Consensus rules for quorumchain.
//!
//! This crate provides:
//! - Proof-of-work: the difficulty predicate, the proof search and a
//!   cancellable search worker
//! - Chain validation (previous-hash links, proofs) and quorum block checks
//! - Longest-valid-chain fork resolution
//! - Majority quorum arithmetic
//!
//! # Example
//!
//! ```rust
//! use quorumchain_consensus::{find_proof, is_valid_proof, BlockValidator};
//! use quorumchain_core::Block;
//!
//! let genesis = Block::genesis();
//! let proof = find_proof(genesis.proof);
//! assert!(is_valid_proof(genesis.proof, proof));
//!
//! let next = Block::new(1, vec![], proof, genesis.hash());
//! assert!(BlockValidator::is_valid_chain(&[genesis, next]));
//! ```

pub mod pow;
pub mod quorum;
pub mod resolver;
pub mod validator;

// Re-export commonly used types
pub use pow::{
    find_proof, find_proof_cancellable, is_valid_proof, proof_digest, CancelToken,
    ConsensusError, ProofSearch, DIFFICULTY_PREFIX,
};
pub use quorum::{has_quorum, required_signatures};
pub use resolver::{ChainSnapshot, ConsensusResolver, PeerChain, Resolution};
pub use validator::{BlockValidator, QuorumValidator, ValidationError};
