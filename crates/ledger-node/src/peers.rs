//! Peer registry and the HTTP client used to pull peers' chains.

use crate::{api::ChainResponse, constants::MAX_PEER_CHAIN_BYTES};
use ledger_core::Block;
use reqwest::{Client, Url};
use std::{collections::BTreeSet, time::Duration};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("invalid node address `{0}`")]
    InvalidAddress(String),

    #[error("request to peer {host} failed: {source}")]
    Request {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("peer {host} sent more than {limit} bytes")]
    BodyTooLarge { host: String, limit: usize },

    #[error("peer {host} sent an unreadable chain: {source}")]
    Decode {
        host: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("peer {host} reported length {reported} but sent {actual} blocks")]
    LengthMismatch {
        host: String,
        reported: usize,
        actual: usize,
    },
}

/// Reduce a node address to `host[:port]`.
///
/// Accepts full URLs (`http://10.0.0.1:5000/any/path`) as well as bare
/// `host:port` pairs.
pub fn parse_peer(address: &str) -> Result<String, PeerError> {
    let trimmed = address.trim();
    let invalid = || PeerError::InvalidAddress(address.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let url = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("http://{trimmed}"))
    }
    .map_err(|_| invalid())?;
    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Known peers, keyed by `host[:port]` so a peer is polled once per round.
#[derive(Clone, Debug, Default)]
pub struct PeerSet {
    hosts: BTreeSet<String>,
}

impl PeerSet {
    /// Register a peer; returns false if it was already known.
    pub fn register(&mut self, address: &str) -> Result<bool, PeerError> {
        Ok(self.hosts.insert(parse_peer(address)?))
    }

    pub fn hosts(&self) -> Vec<String> {
        self.hosts.iter().cloned().collect()
    }
}

#[derive(Clone, Debug)]
pub struct PeerClient {
    http: Client,
    max_body_bytes: usize,
}

impl PeerClient {
    /// Every request made through this client gives up after `timeout`.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            max_body_bytes: MAX_PEER_CHAIN_BYTES,
        })
    }

    /// Cap on a peer's `/chain` body; larger answers are dropped unread.
    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub async fn fetch_chain(&self, host: &str) -> Result<Vec<Block>, PeerError> {
        let request_failed = |source| PeerError::Request {
            host: host.to_string(),
            source,
        };
        let too_large = || PeerError::BodyTooLarge {
            host: host.to_string(),
            limit: self.max_body_bytes,
        };

        let mut res = self
            .http
            .get(format!("http://{host}/chain"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_failed)?;

        let limit = self.max_body_bytes;
        if res.content_length().is_some_and(|len| len > limit as u64) {
            return Err(too_large());
        }
        let mut raw = Vec::new();
        while let Some(chunk) = res.chunk().await.map_err(request_failed)? {
            if raw.len() + chunk.len() > limit {
                return Err(too_large());
            }
            raw.extend_from_slice(&chunk);
        }
        let body: ChainResponse =
            serde_json::from_slice(&raw).map_err(|source| PeerError::Decode {
                host: host.to_string(),
                source,
            })?;

        if body.length != body.chain.len() {
            return Err(PeerError::LengthMismatch {
                host: host.to_string(),
                reported: body.length,
                actual: body.chain.len(),
            });
        }
        Ok(body.chain)
    }

    /// Fetch every peer's chain concurrently. Peers that fail, time out or
    /// answer with something unreadable are logged and left out.
    pub async fn fetch_all(&self, hosts: Vec<String>) -> Vec<Vec<Block>> {
        let mut tasks = JoinSet::new();
        for host in hosts {
            let client = self.clone();
            tasks.spawn(async move {
                let result = client.fetch_chain(&host).await;
                (host, result)
            });
        }

        let mut chains = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((host, Ok(chain))) => {
                    debug!(%host, len = chain.len(), "fetched peer chain");
                    chains.push(chain);
                }
                Ok((host, Err(err))) => warn!(%host, error = %err, "skipping peer"),
                Err(err) => warn!(error = %err, "peer fetch task failed"),
            }
        }
        chains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_peer_strips_scheme_and_path() {
        assert_eq!(parse_peer("http://192.168.0.5:5000").unwrap(), "192.168.0.5:5000");
        assert_eq!(parse_peer("http://192.168.0.5:5000/chain?x=1").unwrap(), "192.168.0.5:5000");
        assert_eq!(parse_peer("https://node.example.org").unwrap(), "node.example.org");
        assert_eq!(parse_peer("  10.0.0.7:5001 ").unwrap(), "10.0.0.7:5001");
        assert_eq!(parse_peer("localhost").unwrap(), "localhost");
    }

    #[test]
    fn parse_peer_rejects_garbage() {
        assert!(matches!(parse_peer(""), Err(PeerError::InvalidAddress(_))));
        assert!(parse_peer("http://").is_err());
        assert!(parse_peer("http://host:notaport").is_err());
    }

    #[test]
    fn peer_set_deduplicates_by_host() {
        let mut peers = PeerSet::default();
        assert!(peers.register("http://10.0.0.1:5000").unwrap());
        assert!(!peers.register("10.0.0.1:5000").unwrap());
        assert!(!peers.register("http://10.0.0.1:5000/chain").unwrap());
        assert!(peers.register("10.0.0.1:5001").unwrap());
        assert_eq!(peers.hosts(), vec!["10.0.0.1:5000", "10.0.0.1:5001"]);
    }

    #[tokio::test]
    async fn unreachable_peers_are_skipped() {
        let client = PeerClient::new(Duration::from_millis(500)).unwrap();
        // nothing listens on port 1
        let chains = client.fetch_all(vec!["127.0.0.1:1".to_string()]).await;
        assert!(chains.is_empty());
    }
}
