//! HTTP node for quorumchain.
//!
//! One process runs one node: a proof-of-work [`Blockchain`] with its peer
//! set, and a quorum [`NodeLedger`] that exchanges blocks and signatures with
//! other nodes.
//!
//! [`Blockchain`]: quorumchain_chain::Blockchain
//! [`NodeLedger`]: quorumchain_chain::NodeLedger

pub mod api;
pub mod config;
pub mod state;
pub mod transport;

pub use api::{build_router, ApiError};
pub use config::NodeConfig;
pub use state::AppState;
pub use transport::HttpTransport;
