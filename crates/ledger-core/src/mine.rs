use crate::{Block, ProofOfWork};
use rayon::prelude::*;
use tracing::info;

/// Same result as [`ProofOfWork::seal`], searched on the rayon pool.
///
/// `find_first` keeps the lowest accepted proof, so every node agrees on the
/// proof no matter how many threads took part.
pub fn seal_parallel(pow: &ProofOfWork, previous_proof: u64, previous_hash: &str) -> u64 {
    let found = (0u64..u64::MAX)
        .into_par_iter()
        .find_first(|proof| pow.verify(previous_proof, *proof, previous_hash))
        .expect("proof space exhausted (practically impossible)");

    info!(
        previous_proof,
        proof = found,
        difficulty = pow.difficulty(),
        "parallel seal finished"
    );
    found
}

pub fn seal_parallel_after(pow: &ProofOfWork, last: &Block) -> u64 {
    seal_parallel(pow, last.proof, &last.hash)
}
