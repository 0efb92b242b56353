use crate::{
    config::Args,
    constants::MAX_SEAL_ATTEMPTS,
    peers::{PeerClient, PeerError, PeerSet},
};
use ledger_core::{
    consensus::best_candidate,
    constants::{MINING_REWARD, REWARD_SENDER},
    mine::seal_parallel,
    Block, Ledger, LedgerError, ProofOfWork, Transaction,
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("chain tip kept moving; gave up after {0} sealing attempts")]
    TipContended(u32),

    #[error("sealing task failed: {0}")]
    Sealing(#[from] tokio::task::JoinError),

    #[error("chain validation task failed: {0}")]
    Validation(tokio::task::JoinError),

    #[error(transparent)]
    Peer(#[from] PeerError),
}

/// State shared by every request handler.
///
/// One `RwLock` guards the whole ledger: writers (submission, block append,
/// chain replacement) are exclusive, readers see a consistent chain.
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<RwLock<Ledger>>,
    peers: Arc<RwLock<PeerSet>>,
    client: PeerClient,
    pow: ProofOfWork,
    node_id: Arc<str>,
    parallel_seal: bool,
}

impl AppState {
    pub fn new(
        pow: ProofOfWork,
        node_id: impl Into<String>,
        peer_timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            ledger: Arc::new(RwLock::new(Ledger::new())),
            peers: Arc::new(RwLock::new(PeerSet::default())),
            client: PeerClient::new(peer_timeout)?,
            pow,
            node_id: Arc::from(node_id.into()),
            parallel_seal: false,
        })
    }

    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let mut state = Self::new(
            ProofOfWork::new(args.difficulty),
            args.node_id(),
            args.peer_timeout(),
        )?;
        state.parallel_seal = args.parallel_seal;
        let mut peers = PeerSet::default();
        for address in &args.peers {
            peers.register(address)?;
        }
        state.peers = Arc::new(RwLock::new(peers));
        Ok(state)
    }

    pub fn with_parallel_seal(mut self, parallel_seal: bool) -> Self {
        self.parallel_seal = parallel_seal;
        self
    }

    pub fn pow(&self) -> ProofOfWork {
        self.pow
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub async fn chain(&self) -> Vec<Block> {
        self.ledger.read().await.blocks().to_vec()
    }

    pub async fn pending(&self) -> Vec<Transaction> {
        self.ledger.read().await.pending().to_vec()
    }

    pub async fn submit(&self, tx: Transaction) -> u64 {
        let mut ledger = self.ledger.write().await;
        ledger.new_transaction(tx.sender, tx.recipient, tx.amount)
    }

    /// Seal the current tip and append a block carrying the pending
    /// transactions plus this node's reward.
    ///
    /// The proof search runs on the blocking pool without any lock held; the
    /// write lock is only taken for the append. If the tip moved meanwhile
    /// the search starts over, up to `MAX_SEAL_ATTEMPTS` times.
    pub async fn mine(&self) -> Result<Block, NodeError> {
        for attempt in 1..=MAX_SEAL_ATTEMPTS {
            let (previous_proof, sealed_on) = {
                let ledger = self.ledger.read().await;
                let last = ledger.last_block();
                (last.proof, last.hash.clone())
            };

            let pow = self.pow;
            let parallel = self.parallel_seal;
            let search_on = sealed_on.clone();
            let proof = tokio::task::spawn_blocking(move || {
                if parallel {
                    seal_parallel(&pow, previous_proof, &search_on)
                } else {
                    pow.seal(previous_proof, &search_on)
                }
            })
            .await?;

            let reward = Transaction::new(REWARD_SENDER, self.node_id(), MINING_REWARD);
            let mut ledger = self.ledger.write().await;
            match ledger.append_sealed(&sealed_on, proof, Some(reward), &self.pow) {
                Ok(block) => {
                    info!(
                        index = block.index,
                        proof,
                        txs = block.transactions.len(),
                        "new block forged"
                    );
                    return Ok(block.clone());
                }
                Err(LedgerError::StaleTip { tip, .. }) => {
                    warn!(attempt, %tip, "tip moved while sealing, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(NodeError::TipContended(MAX_SEAL_ATTEMPTS))
    }

    /// Register every address or none of them. Returns the resulting peer list.
    pub async fn register_peers(&self, addresses: &[String]) -> Result<Vec<String>, NodeError> {
        let mut parsed = PeerSet::default();
        for address in addresses {
            parsed.register(address)?;
        }
        let mut peers = self.peers.write().await;
        for host in parsed.hosts() {
            if peers.register(&host)? {
                info!(%host, "peer registered");
            }
        }
        Ok(peers.hosts())
    }

    pub async fn peers(&self) -> Vec<String> {
        self.peers.read().await.hosts()
    }

    /// Poll every peer and adopt the longest valid chain that beats ours.
    ///
    /// Fetching and validation both run without the ledger lock, validation
    /// on the blocking pool. The write lock is only held to compare lengths
    /// once more and swap the chain in.
    pub async fn resolve_conflicts(&self) -> Result<(bool, Vec<Block>), NodeError> {
        let hosts = self.peers().await;
        let candidates = self.client.fetch_all(hosts).await;

        let local_len = self.ledger.read().await.height();
        let pow = self.pow;
        let best = tokio::task::spawn_blocking(move || best_candidate(local_len, candidates, &pow))
            .await
            .map_err(NodeError::Validation)?;

        let mut ledger = self.ledger.write().await;
        let replaced = best.is_some_and(|chain| ledger.replace_if_longer(chain));
        if !replaced {
            info!(len = ledger.height(), "local chain is authoritative");
        }
        Ok((replaced, ledger.blocks().to_vec()))
    }
}
