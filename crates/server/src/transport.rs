//! HTTP implementation of the peer transport.

use async_trait::async_trait;
use quorumchain_chain::{ChainTransport, TransportError};
use quorumchain_consensus::ChainSnapshot;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches `GET http://{peer}/chain` with reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    fn chain_url(peer: &str) -> String {
        format!("http://{peer}/chain")
    }
}

#[async_trait]
impl ChainTransport for HttpTransport {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot, TransportError> {
        let url = Self::chain_url(peer);
        debug!(%url, "fetching peer chain");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable {
                peer: peer.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                peer: peer.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<ChainSnapshot>()
            .await
            .map_err(|e| TransportError::Malformed {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_url() {
        assert_eq!(
            HttpTransport::chain_url("127.0.0.1:5001"),
            "http://127.0.0.1:5001/chain"
        );
    }

    #[tokio::test]
    async fn test_unreachable_peer() {
        let transport = HttpTransport::new().unwrap();
        // Port 1 on loopback is not expected to accept connections.
        let err = transport.fetch_chain("127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable { .. }));
    }
}
