//! Block and chain validation rules.
//!
//! Every check recomputes digests from the block contents; a digest carried
//! inside a block is only ever compared against, never trusted.

use crate::pow::is_valid_proof;
use quorumchain_core::{Block, Hash, QuorumBlock};
use thiserror::Error;

/// Errors that can occur during validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block index {got} does not follow parent index {parent}")]
    InvalidIndex { parent: u64, got: u64 },

    #[error("block {index} previous_hash {got} does not match parent digest {expected}")]
    InvalidPrevHash { index: u64, expected: Hash, got: Hash },

    #[error("block {index} proof {proof} does not satisfy the work target against {last_proof}")]
    InvalidProof {
        index: u64,
        last_proof: u64,
        proof: u64,
    },

    #[error("block hash {claimed} does not match payload digest {computed}")]
    HashMismatch { claimed: Hash, computed: Hash },

    #[error("chain does not start with the genesis block")]
    InvalidGenesis,
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// A block's index must be exactly one past its parent's.
fn check_index(parent: u64, got: u64) -> Result<()> {
    match parent.checked_add(1) {
        Some(expected) if expected == got => Ok(()),
        _ => Err(ValidationError::InvalidIndex { parent, got }),
    }
}

/// Validator for proof-of-work blocks and chains.
pub struct BlockValidator;

impl BlockValidator {
    /// Validate that `block` sits right after `parent`, links to it and
    /// carries a valid proof.
    pub fn validate_block_extends_parent(block: &Block, parent: &Block) -> Result<()> {
        check_index(parent.index, block.index)?;

        let expected = parent.hash();
        if block.previous_hash != expected {
            return Err(ValidationError::InvalidPrevHash {
                index: block.index,
                expected,
                got: block.previous_hash,
            });
        }

        if !is_valid_proof(parent.proof, block.proof) {
            return Err(ValidationError::InvalidProof {
                index: block.index,
                last_proof: parent.proof,
                proof: block.proof,
            });
        }

        Ok(())
    }

    /// Walk the chain from index 1 and check every parent/child pair.
    ///
    /// Chains of length 0 or 1 have no pairs and are valid.
    pub fn validate_chain(chain: &[Block]) -> Result<()> {
        for pair in chain.windows(2) {
            Self::validate_block_extends_parent(&pair[1], &pair[0])?;
        }
        Ok(())
    }

    /// Boolean form of [`validate_chain`](Self::validate_chain).
    pub fn is_valid_chain(chain: &[Block]) -> bool {
        Self::validate_chain(chain).is_ok()
    }

    /// Validate the chain and require it to start with the canonical genesis.
    pub fn validate_rooted_chain(chain: &[Block]) -> Result<()> {
        match chain.first() {
            Some(first) if first.is_genesis() => Self::validate_chain(chain),
            _ => Err(ValidationError::InvalidGenesis),
        }
    }
}

/// Validator for blocks of the quorum variant.
pub struct QuorumValidator;

impl QuorumValidator {
    /// Check that the carried hash is the digest of the payload.
    pub fn validate_consistency(block: &QuorumBlock) -> Result<()> {
        let computed = block.computed_hash();
        if block.hash() != computed {
            return Err(ValidationError::HashMismatch {
                claimed: block.hash(),
                computed,
            });
        }
        Ok(())
    }

    /// Check that `block` extends `tip` and is internally consistent.
    pub fn validate_block(block: &QuorumBlock, tip: &QuorumBlock) -> Result<()> {
        check_index(tip.index(), block.index())?;

        let expected = tip.computed_hash();
        if block.previous_hash() != expected {
            return Err(ValidationError::InvalidPrevHash {
                index: block.index(),
                expected,
                got: block.previous_hash(),
            });
        }

        Self::validate_consistency(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::find_proof;
    use quorumchain_core::{BlockData, Transaction};
    use serde_json::json;

    fn mined_chain(len: usize) -> Vec<Block> {
        let mut chain = vec![Block::genesis()];
        while chain.len() < len {
            let parent = chain.last().unwrap();
            let proof = find_proof(parent.proof);
            let block = Block::new(
                parent.index + 1,
                vec![Transaction::new("a", "b", chain.len() as u64)],
                proof,
                parent.hash(),
            );
            chain.push(block);
        }
        chain
    }

    #[test]
    fn test_short_chains_trivially_valid() {
        assert!(BlockValidator::is_valid_chain(&[]));
        assert!(BlockValidator::is_valid_chain(&[Block::genesis()]));
    }

    #[test]
    fn test_mined_chain_valid() {
        let chain = mined_chain(3);
        assert!(BlockValidator::validate_chain(&chain).is_ok());
        assert!(BlockValidator::validate_rooted_chain(&chain).is_ok());
    }

    #[test]
    fn test_corrupted_prev_hash_rejected() {
        let mut chain = mined_chain(3);
        chain[2].previous_hash = Hash([0xAB; 32]);

        assert!(matches!(
            BlockValidator::validate_chain(&chain),
            Err(ValidationError::InvalidPrevHash { index: 2, .. })
        ));
    }

    #[test]
    fn test_tampered_parent_breaks_link() {
        let mut chain = mined_chain(2);
        chain[0].transactions.push(Transaction::new("x", "y", 1));

        assert!(!BlockValidator::is_valid_chain(&chain));
    }

    #[test]
    fn test_invalid_proof_rejected() {
        let genesis = Block::genesis();
        let mut bad_proof = 0;
        while is_valid_proof(genesis.proof, bad_proof) {
            bad_proof += 1;
        }
        let block = Block::new(1, vec![], bad_proof, genesis.hash());

        assert!(matches!(
            BlockValidator::validate_chain(&[genesis, block]),
            Err(ValidationError::InvalidProof { index: 1, .. })
        ));
    }

    #[test]
    fn test_out_of_sequence_index_rejected() {
        let genesis = Block::genesis();
        let proof = find_proof(genesis.proof);

        let skipped = Block::new(2, vec![], proof, genesis.hash());
        assert_eq!(
            BlockValidator::validate_chain(&[genesis.clone(), skipped]),
            Err(ValidationError::InvalidIndex { parent: 0, got: 2 })
        );

        let huge = Block::new(u64::MAX, vec![], proof, genesis.hash());
        assert!(!BlockValidator::is_valid_chain(&[genesis, huge]));
    }

    #[test]
    fn test_index_after_max_rejected() {
        let mut parent = Block::genesis();
        parent.index = u64::MAX;
        let block = Block::new(0, vec![], find_proof(parent.proof), parent.hash());

        assert_eq!(
            BlockValidator::validate_block_extends_parent(&block, &parent),
            Err(ValidationError::InvalidIndex {
                parent: u64::MAX,
                got: 0
            })
        );
    }

    #[test]
    fn test_rooted_chain_requires_genesis() {
        let chain = mined_chain(2);
        assert_eq!(
            BlockValidator::validate_rooted_chain(&chain[1..]),
            Err(ValidationError::InvalidGenesis)
        );
        assert_eq!(
            BlockValidator::validate_rooted_chain(&[]),
            Err(ValidationError::InvalidGenesis)
        );
    }

    #[test]
    fn test_quorum_block_extends_tip() {
        let tip = QuorumBlock::genesis();
        let block = QuorumBlock::seal(BlockData::new(1, vec![], tip.hash()));

        assert!(QuorumValidator::validate_block(&block, &tip).is_ok());
    }

    #[test]
    fn test_quorum_block_wrong_parent() {
        let tip = QuorumBlock::genesis();
        let block = QuorumBlock::seal(BlockData::new(1, vec![], Hash([1u8; 32])));

        assert!(matches!(
            QuorumValidator::validate_block(&block, &tip),
            Err(ValidationError::InvalidPrevHash { .. })
        ));
    }

    #[test]
    fn test_quorum_block_wrong_index() {
        let tip = QuorumBlock::genesis();
        let block = QuorumBlock::seal(BlockData::new(7, vec![], tip.hash()));

        assert_eq!(
            QuorumValidator::validate_block(&block, &tip),
            Err(ValidationError::InvalidIndex { parent: 0, got: 7 })
        );
    }

    #[test]
    fn test_quorum_block_hash_mismatch() {
        let tip = QuorumBlock::genesis();
        let block = QuorumBlock::seal(BlockData::new(1, vec![], tip.hash()));
        let mut wire = block.to_dict();
        wire["hash"] = json!(Hash([7u8; 32]));
        let forged: QuorumBlock = serde_json::from_value(wire).unwrap();

        assert!(matches!(
            QuorumValidator::validate_block(&forged, &tip),
            Err(ValidationError::HashMismatch { .. })
        ));
    }
}
