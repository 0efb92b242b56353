pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Leading zero hex digits a proof hash needs. All peers must agree on it.
pub const POW_DIFFICULTY: u32 = 4;
pub const GENESIS_INDEX: u64 = 1;
pub const GENESIS_PROOF: u64 = 100;
pub const GENESIS_PREVIOUS_HASH: &str = "1";
/// Sender of the mining reward transaction.
pub const REWARD_SENDER: &str = "0";
pub const MINING_REWARD: i64 = 1;
