//! Block storage and chain head tracking.

use crate::db::{BatchOp, Result, Storage, StorageError};
use quorumchain_core::{Block, Hash};
use tracing::{debug, info};

/// Keys for chain metadata.
const CHAIN_HEAD_KEY: &[u8] = b"chain:head";
const CHAIN_HEIGHT_KEY: &[u8] = b"chain:height";

/// Persists a proof-of-work chain.
///
/// Blocks are stored twice:
/// - `block:hash:{hash}` → full block
/// - `block:index:{index}` → hash, rewritten when the chain is replaced
pub struct ChainStore<'a> {
    storage: &'a Storage,
}

impl<'a> ChainStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    // =========================================================================
    // Block Storage
    // =========================================================================

    fn block_ops(block: &Block) -> Result<Vec<BatchOp>> {
        let hash = block.hash();
        Ok(vec![
            BatchOp::put(Storage::block_hash_key(&hash), block)?,
            BatchOp::put(Storage::block_index_key(block.index), &hash)?,
        ])
    }

    fn head_ops(hash: &Hash, height: u64) -> Result<Vec<BatchOp>> {
        Ok(vec![
            BatchOp::put(CHAIN_HEAD_KEY.to_vec(), hash)?,
            BatchOp::put(CHAIN_HEIGHT_KEY.to_vec(), &height)?,
        ])
    }

    /// Get a block by its hash.
    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>> {
        self.storage.get(Storage::block_hash_key(hash))
    }

    /// Block at `index` on the current chain. An index entry whose block is
    /// gone is reported as an error, not as `None`.
    pub fn get_block_by_index(&self, index: u64) -> Result<Option<Block>> {
        let Some(hash) = self.storage.get::<_, Hash>(Storage::block_index_key(index))? else {
            return Ok(None);
        };
        self.get_block_by_hash(&hash)?
            .ok_or(StorageError::MissingBlock(index))
            .map(Some)
    }

    // =========================================================================
    // Chain Head Tracking
    // =========================================================================

    /// Hash of the stored tail.
    pub fn get_head(&self) -> Result<Option<Hash>> {
        self.storage.get(CHAIN_HEAD_KEY)
    }

    /// Index of the stored tail. 0 when the chain is not initialized.
    pub fn get_height(&self) -> Result<u64> {
        Ok(self.storage.get::<_, u64>(CHAIN_HEIGHT_KEY)?.unwrap_or(0))
    }

    /// Check if the chain is initialized (has a genesis block).
    pub fn is_initialized(&self) -> Result<bool> {
        self.storage.contains(CHAIN_HEAD_KEY)
    }

    // =========================================================================
    // Chain Operations
    // =========================================================================

    /// Store the genesis block if the store is empty.
    ///
    /// Fails if the store already holds a different block at index 0.
    pub fn init_genesis(&self) -> Result<()> {
        let genesis = Block::genesis();

        if self.is_initialized()? {
            return match self.get_block_by_index(0)? {
                Some(stored) if stored == genesis => Ok(()),
                _ => Err(StorageError::InvalidGenesis(
                    "stored chain has a foreign genesis".into(),
                )),
            };
        }

        let mut ops = Self::block_ops(&genesis)?;
        ops.extend(Self::head_ops(&genesis.hash(), 0)?);
        self.storage.batch(ops)?;
        debug!("stored genesis block");
        Ok(())
    }

    /// Append a block to the stored chain.
    ///
    /// Only linkage is checked here: the index must follow the tail and the
    /// previous hash must be the tail's hash. Proofs are the caller's concern.
    pub fn append_block(&self, block: &Block) -> Result<()> {
        let head = self.get_head()?.ok_or(StorageError::NotInitialized)?;
        let height = self.get_height()?;

        if block.index != height + 1 {
            return Err(StorageError::UnexpectedIndex {
                expected: height + 1,
                got: block.index,
            });
        }
        if block.previous_hash != head {
            return Err(StorageError::BrokenLink {
                index: block.index,
                expected: head,
                got: block.previous_hash,
            });
        }

        let mut ops = Self::block_ops(block)?;
        ops.extend(Self::head_ops(&block.hash(), block.index)?);
        self.storage.batch(ops)?;
        debug!(index = block.index, "stored block");
        Ok(())
    }

    /// Overwrite the stored chain with `blocks` in one batch.
    ///
    /// `blocks` must start with the genesis block and be linked.
    pub fn replace_chain(&self, blocks: &[Block]) -> Result<()> {
        check_linkage(blocks)?;
        let Some(tail) = blocks.last() else {
            return Err(StorageError::InvalidGenesis("empty chain".into()));
        };

        let old_height = self.get_height()?;
        let new_height = tail.index;

        let mut ops = Vec::with_capacity(blocks.len() * 2 + 2);
        for block in blocks {
            ops.extend(Self::block_ops(block)?);
        }
        for index in (new_height + 1)..=old_height {
            ops.push(BatchOp::Remove {
                key: Storage::block_index_key(index),
            });
        }
        ops.extend(Self::head_ops(&tail.hash(), new_height)?);
        self.storage.batch(ops)?;

        info!(old_height, new_height, "replaced stored chain");
        Ok(())
    }

    /// Get blocks in a range [from_index, to_index].
    pub fn get_blocks_range(&self, from_index: u64, to_index: u64) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for index in from_index..=to_index {
            if let Some(block) = self.get_block_by_index(index)? {
                blocks.push(block);
            } else {
                break;
            }
        }
        Ok(blocks)
    }

    /// Read the whole stored chain, genesis first.
    ///
    /// An uninitialized store yields an empty vector.
    pub fn load_chain(&self) -> Result<Vec<Block>> {
        if !self.is_initialized()? {
            return Ok(Vec::new());
        }

        let height: u64 = self.storage.require(CHAIN_HEIGHT_KEY)?;
        let blocks = self.get_blocks_range(0, height)?;
        if blocks.len() as u64 != height + 1 {
            return Err(StorageError::MissingBlock(blocks.len() as u64));
        }
        Ok(blocks)
    }
}

fn check_linkage(blocks: &[Block]) -> Result<()> {
    match blocks.first() {
        Some(first) if first.is_genesis() => {}
        Some(_) => {
            return Err(StorageError::InvalidGenesis(
                "chain does not start with genesis".into(),
            ))
        }
        None => return Err(StorageError::InvalidGenesis("empty chain".into())),
    }

    for pair in blocks.windows(2) {
        let (parent, block) = (&pair[0], &pair[1]);
        if parent.index.checked_add(1) != Some(block.index) {
            return Err(StorageError::UnexpectedIndex {
                expected: parent.index.saturating_add(1),
                got: block.index,
            });
        }
        let expected = parent.hash();
        if block.previous_hash != expected {
            return Err(StorageError::BrokenLink {
                index: block.index,
                expected,
                got: block.previous_hash,
            });
        }
    }
    Ok(())
}
