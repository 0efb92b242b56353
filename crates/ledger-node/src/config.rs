use crate::constants::{DEFAULT_LISTEN, DEFAULT_PEER_TIMEOUT_SECS};
use clap::Parser;
use ledger_core::constants::POW_DIFFICULTY;
use std::{net::SocketAddr, time::Duration};
use uuid::Uuid;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node with longest-chain peer sync")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:5000
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Leading zero hex digits required of a proof hash. Must match every peer.
    #[arg(long, default_value_t = POW_DIFFICULTY, value_parser = clap::value_parser!(u32).range(1..=16))]
    pub difficulty: u32,

    /// Recipient of mining rewards; a random id when omitted
    #[arg(long)]
    pub node_id: Option<String>,

    /// Peer to register at startup (repeatable), e.g. http://127.0.0.1:5001
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Per-peer timeout when fetching chains during resolution
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_SECS)]
    pub peer_timeout_secs: u64,

    /// Search for proofs on all cores instead of one
    #[arg(long)]
    pub parallel_seal: bool,
}

impl Args {
    pub fn node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string())
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }
}
