use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("chain tip moved while sealing: sealed on {sealed_on}, tip is now {tip}")]
    StaleTip { sealed_on: String, tip: String },

    #[error("proof {proof} does not meet difficulty {difficulty} on top of block {index}")]
    InvalidProof {
        proof: u64,
        difficulty: u32,
        index: u64,
    },
}
