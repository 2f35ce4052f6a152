//! Transaction records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sender used for mining reward transactions.
pub const REWARD_SENDER: &str = "0";

/// Errors that can occur when checking a transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction sender is empty")]
    EmptySender,
    #[error("transaction recipient is empty")]
    EmptyRecipient,
}

/// A value transfer between two parties.
///
/// There is no account model behind these names; a transaction is just a
/// record carried inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender identity.
    pub sender: String,
    /// Recipient identity.
    pub recipient: String,
    /// Amount transferred.
    pub amount: u64,
}

impl Transaction {
    /// Create a new transaction.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Create a mining reward paid to `recipient`.
    pub fn reward(recipient: impl Into<String>, amount: u64) -> Self {
        Self::new(REWARD_SENDER, recipient, amount)
    }

    /// Check if this is a mining reward.
    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    /// Check that both parties are named.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.sender.trim().is_empty() {
            return Err(TransactionError::EmptySender);
        }
        if self.recipient.trim().is_empty() {
            return Err(TransactionError::EmptyRecipient);
        }
        Ok(())
    }
}
