use crate::{
    consensus,
    constants::{GENESIS_INDEX, GENESIS_PREVIOUS_HASH, GENESIS_PROOF},
    now_secs, Block, LedgerError, ProofOfWork, Transaction,
};
use tracing::{debug, info};

/// In-memory chain of sealed blocks plus the buffer of transactions waiting
/// for the next block. Never empty: the genesis block is created in [`Ledger::new`].
///
/// `Ledger` does no locking of its own; share it behind one lock so that
/// submission, mining and chain replacement are mutually exclusive.
#[derive(Clone, Debug)]
pub struct Ledger {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        let mut ledger = Self {
            blocks: Vec::new(),
            pending: Vec::new(),
        };
        ledger.new_block(GENESIS_PROOF, GENESIS_PREVIOUS_HASH);
        ledger
    }

    /// Queue a transaction and return the index of the block it will land in.
    pub fn new_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: i64,
    ) -> u64 {
        self.pending.push(Transaction::new(sender, recipient, amount));
        self.last_block().index + 1
    }

    /// Seal the pending buffer into a new block and append it.
    ///
    /// The pending buffer is emptied in the same step. Timestamps never run
    /// backwards along the chain even if the wall clock does.
    pub fn new_block(&mut self, proof: u64, previous_hash: impl Into<String>) -> &Block {
        let (index, timestamp) = match self.blocks.last() {
            Some(last) => (last.index + 1, now_secs().max(last.timestamp)),
            None => (GENESIS_INDEX, now_secs()),
        };
        let transactions = std::mem::take(&mut self.pending);
        let block = Block::new(index, timestamp, transactions, proof, previous_hash.into());
        debug!(
            index,
            proof,
            txs = block.transactions.len(),
            hash = %block.hash,
            "block appended"
        );
        self.blocks.push(block);
        self.last_block()
    }

    pub fn last_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("ledger always holds the genesis block")
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// Number of blocks, genesis included.
    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    /// Append a block whose proof was searched for outside the lock.
    ///
    /// `sealed_on` is the hash of the block the proof was computed against.
    /// If the tip has changed since, nothing is appended and the caller must
    /// seal again. `reward`, if any, joins the pending buffer right before
    /// the block is built.
    pub fn append_sealed(
        &mut self,
        sealed_on: &str,
        proof: u64,
        reward: Option<Transaction>,
        pow: &ProofOfWork,
    ) -> Result<&Block, LedgerError> {
        let last = self.last_block();
        if last.hash != sealed_on {
            return Err(LedgerError::StaleTip {
                sealed_on: sealed_on.to_string(),
                tip: last.hash.clone(),
            });
        }
        if !pow.verify(last.proof, proof, &last.hash) {
            return Err(LedgerError::InvalidProof {
                proof,
                difficulty: pow.difficulty(),
                index: last.index,
            });
        }
        if let Some(tx) = reward {
            self.pending.push(tx);
        }
        Ok(self.new_block(proof, sealed_on))
    }

    /// Replace `blocks` with the longest valid candidate that is strictly
    /// longer than the local chain. Returns whether a replacement happened.
    /// Pending transactions are left untouched.
    pub fn adopt_longest<I>(&mut self, candidates: I, pow: &ProofOfWork) -> bool
    where
        I: IntoIterator<Item = Vec<Block>>,
    {
        consensus::best_candidate(self.height(), candidates, pow)
            .is_some_and(|chain| self.replace_if_longer(chain))
    }

    /// Swap in a chain that was already validated, unless the local chain has
    /// caught up with it meanwhile. Only length is compared here.
    pub fn replace_if_longer(&mut self, chain: Vec<Block>) -> bool {
        if chain.len() <= self.height() {
            debug!(
                local = self.height(),
                candidate = chain.len(),
                "candidate no longer longer than local chain"
            );
            return false;
        }
        info!(
            old_len = self.height(),
            new_len = chain.len(),
            "local chain replaced by longer valid chain"
        );
        self.blocks = chain;
        true
    }
}
