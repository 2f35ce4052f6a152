//! Pending-transaction buffer.
//!
//! The mempool holds transactions waiting to be sealed into the next block,
//! in arrival order. It is owned by a single [`Blockchain`](crate::Blockchain)
//! and drained whenever a block is appended.

use quorumchain_core::{Transaction, TransactionError};
use thiserror::Error;

/// Errors that can occur during mempool operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MempoolError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),

    #[error("mempool is full (capacity: {0})")]
    MempoolFull(usize),
}

pub type Result<T> = std::result::Result<T, MempoolError>;

/// Configuration for the mempool.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of buffered transactions.
    pub max_transactions: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 10_000,
        }
    }
}

/// Ordered buffer of pending transactions.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    /// Configuration.
    config: MempoolConfig,
    /// Transactions in arrival order.
    transactions: Vec<Transaction>,
}

impl Mempool {
    /// Create a new mempool with default configuration.
    pub fn new() -> Self {
        Self::with_config(MempoolConfig::default())
    }

    /// Create a new mempool with the given configuration.
    pub fn with_config(config: MempoolConfig) -> Self {
        Self {
            config,
            transactions: Vec::new(),
        }
    }

    /// Get the number of transactions in the mempool.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the mempool is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Add a transaction to the end of the buffer.
    pub fn add(&mut self, tx: Transaction) -> Result<()> {
        tx.validate()?;

        if self.transactions.len() >= self.config.max_transactions {
            return Err(MempoolError::MempoolFull(self.config.max_transactions));
        }

        self.transactions.push(tx);
        Ok(())
    }

    /// Pending transactions in arrival order.
    pub fn pending(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Drop every pending transaction once they are sealed into a block.
    pub fn clear(&mut self) {
        self.transactions.clear();
    }
}
