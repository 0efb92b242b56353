//! Chain validation and longest-valid-chain selection.

use crate::{
    constants::{GENESIS_INDEX, GENESIS_PREVIOUS_HASH, GENESIS_PROOF},
    Block, ProofOfWork,
};
use tracing::debug;

/// Check a candidate chain block by block.
///
/// The first block must carry the fixed genesis index, proof and previous
/// hash. Every block must carry a hash matching its contents. Every block
/// after the first must follow its predecessor's index, link to the
/// predecessor's hash, and carry a proof that verifies against the
/// predecessor's proof and hash.
pub fn validate_chain(chain: &[Block], pow: &ProofOfWork) -> bool {
    let Some(first) = chain.first() else {
        debug!("rejecting empty chain");
        return false;
    };
    if !is_genesis(first) {
        debug!(index = first.index, proof = first.proof, "first block is not a genesis block");
        return false;
    }
    if !first.has_valid_hash() {
        debug!(index = first.index, "genesis hash does not match contents");
        return false;
    }

    for pair in chain.windows(2) {
        let (previous, block) = (&pair[0], &pair[1]);
        if previous.index.checked_add(1) != Some(block.index) {
            debug!(index = block.index, previous = previous.index, "index gap");
            return false;
        }
        if block.previous_hash != previous.hash {
            debug!(index = block.index, "previous hash does not link");
            return false;
        }
        if !pow.verify(previous.proof, block.proof, &previous.hash) {
            debug!(index = block.index, proof = block.proof, "proof rejected");
            return false;
        }
        if !block.has_valid_hash() {
            debug!(index = block.index, "hash does not match contents");
            return false;
        }
    }
    true
}

fn is_genesis(block: &Block) -> bool {
    block.index == GENESIS_INDEX
        && block.proof == GENESIS_PROOF
        && block.previous_hash == GENESIS_PREVIOUS_HASH
}

/// Pick the longest valid chain strictly longer than `local_len`.
///
/// Among equally long winners the first one seen is kept.
pub fn best_candidate<I>(local_len: usize, candidates: I, pow: &ProofOfWork) -> Option<Vec<Block>>
where
    I: IntoIterator<Item = Vec<Block>>,
{
    let mut best: Option<Vec<Block>> = None;
    let mut max_len = local_len;
    for chain in candidates {
        if chain.len() > max_len && validate_chain(&chain, pow) {
            max_len = chain.len();
            best = Some(chain);
        }
    }
    best
}
