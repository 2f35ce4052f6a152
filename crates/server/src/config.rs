//! Node configuration, parsed from the command line.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "quorumchain-node")]
#[command(about = "Run a quorumchain HTTP node", long_about = None)]
pub struct NodeConfig {
    /// Port to listen on
    #[arg(short, long, default_value_t = 5000)]
    pub port: u16,

    /// Identity used when signing quorum blocks (defaults to 127.0.0.1:<port>)
    #[arg(long)]
    pub node_id: Option<String>,

    /// Peer address to register at startup (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Directory for the persistent chain (in-memory if omitted)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Amount paid to this node for each mined block
    #[arg(long, default_value_t = 1)]
    pub mining_reward: u64,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl NodeConfig {
    /// The identity this node signs with.
    pub fn node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| format!("127.0.0.1:{}", self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::parse_from(["quorumchain-node"]);
        assert_eq!(config.port, 5000);
        assert_eq!(config.node_id(), "127.0.0.1:5000");
        assert!(config.peers.is_empty());
        assert!(config.data_dir.is_none());
        assert_eq!(config.mining_reward, 1);
    }

    #[test]
    fn test_repeated_peers() {
        let config = NodeConfig::parse_from([
            "quorumchain-node",
            "--port",
            "5001",
            "--node-id",
            "alpha",
            "--peer",
            "127.0.0.1:5002",
            "--peer",
            "http://127.0.0.1:5003",
        ]);
        assert_eq!(config.node_id(), "alpha");
        assert_eq!(config.peers.len(), 2);
    }
}
