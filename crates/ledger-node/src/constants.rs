pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:5000";
pub(crate) const DEFAULT_PEER_TIMEOUT_SECS: u64 = 5;
/// How often `/mine` re-seals after losing a race for the tip.
pub(crate) const MAX_SEAL_ATTEMPTS: u32 = 3;
/// Largest `/chain` body accepted from a peer during resolution.
pub(crate) const MAX_PEER_CHAIN_BYTES: usize = 64 * 1024 * 1024;
