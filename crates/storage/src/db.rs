//! Thin layer over sled: bincode-encoded values, atomic batches and the key
//! layout used by [`ChainStore`](crate::ChainStore).

use quorumchain_core::Hash;
use serde::{de::DeserializeOwned, Serialize};
use sled::Db;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sled: {0}")]
    Database(#[from] sled::Error),

    #[error("bincode: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("missing key {0}")]
    NotFound(String),

    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("Chain not initialized")]
    NotInitialized,

    #[error("Expected block index {expected}, got {got}")]
    UnexpectedIndex { expected: u64, got: u64 },

    #[error("Block {index} links to {got}, expected {expected}")]
    BrokenLink { index: u64, expected: Hash, got: Hash },

    #[error("Block {0} missing from store")]
    MissingBlock(u64),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Handle to an open database. Clones share the same underlying tree.
#[derive(Clone)]
pub struct Storage {
    db: Db,
}

impl Storage {
    /// Open (or create) the database under `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// A throwaway database that is deleted when dropped.
    pub fn open_temporary() -> Result<Self> {
        Ok(Self {
            db: sled::Config::new().temporary(true).open()?,
        })
    }

    /// Value encoding shared by [`put`](Self::put) and [`BatchOp::put`].
    pub fn encode<V: Serialize>(value: &V) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    pub fn put<K: AsRef<[u8]>, V: Serialize>(&self, key: K, value: &V) -> Result<()> {
        self.db.insert(key, Self::encode(value)?)?;
        Ok(())
    }

    pub fn get<K: AsRef<[u8]>, V: DeserializeOwned>(&self, key: K) -> Result<Option<V>> {
        self.db
            .get(key)?
            .map(|bytes| bincode::deserialize(&bytes))
            .transpose()
            .map_err(StorageError::from)
    }

    /// Like [`get`](Self::get), but a missing key is an error.
    pub fn require<V: DeserializeOwned>(&self, key: &[u8]) -> Result<V> {
        self.get(key)?
            .ok_or_else(|| StorageError::NotFound(String::from_utf8_lossy(key).into_owned()))
    }

    pub fn contains<K: AsRef<[u8]>>(&self, key: K) -> Result<bool> {
        Ok(self.db.contains_key(key)?)
    }

    /// Apply `operations` in one atomic sled batch.
    pub fn batch(&self, operations: Vec<BatchOp>) -> Result<()> {
        let batch = operations
            .into_iter()
            .fold(sled::Batch::default(), |mut batch, op| {
                match op {
                    BatchOp::Insert { key, value } => batch.insert(key, value),
                    BatchOp::Remove { key } => batch.remove(key),
                }
                batch
            });
        self.db.apply_batch(batch)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // =========================================================================
    // Key layout
    // =========================================================================

    /// `block:index:{index}` → hash of the block at that position.
    pub fn block_index_key(index: u64) -> Vec<u8> {
        format!("block:index:{index}").into_bytes()
    }

    /// `block:hash:` + raw digest → the block itself.
    pub fn block_hash_key(hash: &Hash) -> Vec<u8> {
        [b"block:hash:".as_slice(), hash.as_bytes().as_slice()].concat()
    }
}

/// One write in an atomic batch.
pub enum BatchOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Remove { key: Vec<u8> },
}

impl BatchOp {
    /// Insert `value` with the store's encoding.
    pub fn put<V: Serialize>(key: Vec<u8>, value: &V) -> Result<Self> {
        Ok(BatchOp::Insert {
            key,
            value: Storage::encode(value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_db_starts_empty() {
        let storage = Storage::open_temporary().unwrap();
        assert!(storage.db.is_empty());
        assert!(!storage.contains("anything").unwrap());
    }

    #[test]
    fn test_values_round_trip_through_bincode() {
        let storage = Storage::open_temporary().unwrap();
        let hash = Hash([0xBB; 32]);

        storage.put("height", &7u64).unwrap();
        storage.put("head", &hash).unwrap();

        assert_eq!(storage.get::<_, u64>("height").unwrap(), Some(7));
        assert_eq!(storage.require::<Hash>(b"head").unwrap(), hash);
        assert_eq!(storage.get::<_, u64>("nope").unwrap(), None);
    }

    #[test]
    fn test_require_reports_missing_key() {
        let storage = Storage::open_temporary().unwrap();
        match storage.require::<u64>(b"chain:height") {
            Err(StorageError::NotFound(key)) => assert_eq!(key, "chain:height"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_inserts_and_removes_together() {
        let storage = Storage::open_temporary().unwrap();
        storage.put("old", &0u64).unwrap();

        storage
            .batch(vec![
                BatchOp::put(b"x".to_vec(), &1u64).unwrap(),
                BatchOp::put(b"y".to_vec(), &2u64).unwrap(),
                BatchOp::Remove {
                    key: b"old".to_vec(),
                },
            ])
            .unwrap();

        assert_eq!(storage.require::<u64>(b"x").unwrap(), 1);
        assert_eq!(storage.require::<u64>(b"y").unwrap(), 2);
        assert!(!storage.contains("old").unwrap());
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(Storage::block_index_key(42), b"block:index:42");

        let key = Storage::block_hash_key(&Hash([0xBB; 32]));
        assert_eq!(&key[..11], b"block:hash:");
        assert_eq!(&key[11..], &[0xBB; 32]);
    }
}
