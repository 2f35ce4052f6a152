//! Persistent block storage for quorumchain.
//!
//! A node keeps its chain in memory and mirrors it here so that a restart
//! picks up where it left off.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          Node (Blockchain, HTTP)         │
//! └────────────────────┬─────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────┐
//! │  ┌──────────────┐   ┌─────────────────┐  │
//! │  │ ChainStore   │   │ Storage (DB)    │  │
//! │  │  - Blocks    │   │  - sled wrapper │  │
//! │  │  - Head      │   │  - bincode      │  │
//! │  │  - Replace   │   │  - key helpers  │  │
//! │  └──────────────┘   └─────────────────┘  │
//! └────────────────────┬─────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────┐
//! │       sled (embedded key-value store)    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use quorumchain_storage::{ChainStore, Storage};
//!
//! let storage = Storage::open("./chain_data").unwrap();
//! let store = ChainStore::new(&storage);
//! store.init_genesis().unwrap();
//!
//! let blocks = store.load_chain().unwrap();
//! assert!(blocks[0].is_genesis());
//! ```

pub mod chain;
pub mod db;

// Re-export commonly used types
pub use chain::ChainStore;
pub use db::{BatchOp, Result, Storage, StorageError};
