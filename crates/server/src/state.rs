//! Shared state handed to every request handler.

use crate::config::NodeConfig;
use parking_lot::Mutex;
use quorumchain_chain::{
    Blockchain, BlockchainConfig, ChainTransport, SharedBlockchain, SharedLedger,
};
use quorumchain_consensus::CancelToken;
use quorumchain_core::{Block, NodeId};
use quorumchain_storage::{ChainStore, Storage, StorageError};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub node_id: NodeId,
    pub blockchain: SharedBlockchain,
    pub ledger: SharedLedger,
    pub transport: Arc<dyn ChainTransport>,
    /// Mirror of `blockchain` on disk, if the node was started with one.
    pub storage: Option<Storage>,
    /// Token for the proof search currently in flight.
    mining: Arc<Mutex<CancelToken>>,
}

impl AppState {
    /// In-memory node.
    pub fn new(
        node_id: impl Into<NodeId>,
        blockchain: Blockchain,
        transport: Arc<dyn ChainTransport>,
    ) -> Self {
        let node_id = node_id.into();
        Self {
            ledger: SharedLedger::new(node_id.clone()),
            node_id,
            blockchain: blockchain.into_shared(),
            transport,
            storage: None,
            mining: Arc::new(Mutex::new(CancelToken::new())),
        }
    }

    /// Build a node from its configuration, reloading the chain from
    /// `data_dir` when one is given.
    pub fn from_config(
        config: &NodeConfig,
        transport: Arc<dyn ChainTransport>,
    ) -> anyhow::Result<Self> {
        let chain_config = BlockchainConfig {
            mining_reward: config.mining_reward,
            ..BlockchainConfig::default()
        };

        let (blockchain, storage) = match &config.data_dir {
            Some(dir) => {
                let storage = Storage::open(dir)?;
                let store = ChainStore::new(&storage);
                store.init_genesis()?;
                let blocks = store.load_chain()?;
                info!(path = %dir.display(), length = blocks.len(), "loaded stored chain");
                (Blockchain::from_blocks(blocks, chain_config)?, Some(storage))
            }
            None => (Blockchain::with_config(chain_config), None),
        };

        let mut state = Self::new(config.node_id(), blockchain, transport);
        state.storage = storage;

        for peer in &config.peers {
            state.register_peer(peer)?;
        }
        Ok(state)
    }

    /// Register a peer with both the chain and the quorum ledger.
    ///
    /// Returns the normalized `host:port`.
    pub fn register_peer(&self, address: &str) -> Result<String, quorumchain_chain::BlockchainError> {
        let node = self.blockchain.write().register_node(address)?;
        self.ledger.lock().register_node(node.as_str());
        Ok(node)
    }

    /// A token for a new proof search. Cancelled when the chain is replaced.
    pub fn mining_token(&self) -> CancelToken {
        self.mining.lock().clone()
    }

    /// Abort any in-flight proof search and arm a fresh token.
    pub fn cancel_mining(&self) {
        let mut token = self.mining.lock();
        token.cancel();
        *token = CancelToken::new();
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn persist_block(&self, block: &Block) -> Result<(), StorageError> {
        match &self.storage {
            Some(storage) => ChainStore::new(storage).append_block(block),
            None => Ok(()),
        }
    }

    pub fn persist_chain(&self, blocks: &[Block]) -> Result<(), StorageError> {
        match &self.storage {
            Some(storage) => ChainStore::new(storage).replace_chain(blocks),
            None => Ok(()),
        }
    }
}
