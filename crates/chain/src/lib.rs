//! Node state for quorumchain.
//!
//! This crate brings the core types and consensus rules together into nodes:
//! - **Blockchain**: the proof-of-work chain, its mempool and its peer set
//! - **Ledger**: the signature-quorum variant with staged blocks
//! - **Sync**: fetching peer chains and resolving forks
//!
//! # Example
//!
//! ```rust
//! use quorumchain_chain::Blockchain;
//!
//! let mut chain = Blockchain::new();
//! chain.add_transaction("alice", "bob", 5).unwrap();
//! let block = chain.mine("miner").unwrap();
//!
//! assert_eq!(block.index, 1);
//! assert!(Blockchain::is_valid(chain.blocks()));
//! ```

pub mod blockchain;
pub mod ledger;
pub mod mempool;
pub mod sync;

// Re-export commonly used types
pub use blockchain::{
    Blockchain, BlockchainConfig, BlockchainError, BlockchainStats, SharedBlockchain,
};
pub use ledger::{LedgerError, NodeLedger, SharedLedger};
pub use mempool::{Mempool, MempoolConfig, MempoolError};
pub use sync::{
    fetch_candidates, sync_chain, sync_chain_then, ChainTransport, LocalTransport,
    TransportError,
};
