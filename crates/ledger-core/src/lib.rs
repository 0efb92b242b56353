use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod mine;

pub use chain::Ledger;
pub use error::LedgerError;
pub use pow::ProofOfWork;

pub type Hash = [u8; constants::HASH_SIZE];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    fn write_hash_bytes(&self, bytes: &mut Vec<u8>) {
        put_str(bytes, &self.sender);
        put_str(bytes, &self.recipient);
        bytes.extend_from_slice(&self.amount.to_le_bytes());
    }
}

/// A sealed block. `hash` is computed once in [`Block::new`] and never
/// participates in its own digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
    pub hash: String,
}

impl Block {
    pub fn new(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            proof,
            previous_hash,
            hash: String::new(),
        };
        block.hash = hex::encode(block.compute_hash());
        block
    }

    /// Canonical, field-order-stable encoding fed to the block digest.
    ///
    /// Integers are little-endian, strings and the transaction list are
    /// length-prefixed with a `u64`, so no two distinct blocks share an
    /// encoding. Every node must produce exactly these bytes.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(64 + self.transactions.len() * 48);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&(self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            tx.write_hash_bytes(&mut bytes);
        }
        bytes.extend_from_slice(&self.proof.to_le_bytes());
        put_str(&mut bytes, &self.previous_hash);
        bytes
    }

    pub fn compute_hash(&self) -> Hash {
        sha256(&self.hash_bytes())
    }

    /// True when the cached `hash` matches the block's contents.
    pub fn has_valid_hash(&self) -> bool {
        self.hash == hex::encode(self.compute_hash())
    }
}

fn put_str(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(&(s.len() as u64).to_le_bytes());
    bytes.extend_from_slice(s.as_bytes());
}

pub fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; constants::HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}

pub mod pow {
    use super::{sha256, Block, Hash};
    use crate::constants::POW_DIFFICULTY;
    use tracing::debug;

    /// Proof-of-work rule: `sha256(previous_proof ‖ proof ‖ previous_hash)`
    /// must start with `difficulty` zero hex digits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ProofOfWork {
        difficulty: u32,
    }

    impl Default for ProofOfWork {
        fn default() -> Self {
            Self::new(POW_DIFFICULTY)
        }
    }

    impl ProofOfWork {
        pub fn new(difficulty: u32) -> Self {
            Self { difficulty }
        }

        pub fn difficulty(&self) -> u32 {
            self.difficulty
        }

        /// Digest checked against the difficulty target. Both integers are
        /// encoded as 8 little-endian bytes, the hash as its UTF-8 hex text.
        pub fn proof_hash(previous_proof: u64, proof: u64, previous_hash: &str) -> Hash {
            let mut bytes = Vec::with_capacity(16 + previous_hash.len());
            bytes.extend_from_slice(&previous_proof.to_le_bytes());
            bytes.extend_from_slice(&proof.to_le_bytes());
            bytes.extend_from_slice(previous_hash.as_bytes());
            sha256(&bytes)
        }

        pub fn verify(&self, previous_proof: u64, proof: u64, previous_hash: &str) -> bool {
            meets_target(
                &Self::proof_hash(previous_proof, proof, previous_hash),
                self.difficulty,
            )
        }

        /// Linear search from 0 for the first proof accepted by [`verify`].
        /// CPU-bound and unbounded in time; run it off the async executor.
        ///
        /// [`verify`]: ProofOfWork::verify
        pub fn seal(&self, previous_proof: u64, previous_hash: &str) -> u64 {
            let mut proof = 0u64;
            while !self.verify(previous_proof, proof, previous_hash) {
                proof += 1;
            }
            debug!(previous_proof, proof, difficulty = self.difficulty, "proof found");
            proof
        }

        /// Seal on top of `last`, i.e. against its proof and cached hash.
        pub fn seal_after(&self, last: &Block) -> u64 {
            self.seal(last.proof, &last.hash)
        }
    }

    /// A hash meets a difficulty of `d` hex digits when its first `4 * d` bits are zero.
    pub fn meets_target(hash: &Hash, difficulty: u32) -> bool {
        count_leading_zero_bits(hash) >= difficulty.saturating_mul(4)
    }

    pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;

    fn sample_block() -> Block {
        Block::new(
            2,
            1_600_000_000,
            vec![Transaction::new("0", "X", 1)],
            12345,
            "1".to_string(),
        )
    }

    #[test]
    fn leading_zero_bits_examples() {
        let mut h = [0u8; 32];
        assert_eq!(pow::count_leading_zero_bits(&h), 256);
        h[0] = 0x0F; // 00001111
        assert_eq!(pow::count_leading_zero_bits(&h), 4);
        h = [0u8; 32];
        h[1] = 0x80; // 00000000 10000000
        assert_eq!(pow::count_leading_zero_bits(&h), 8);
        h[1] = 0x40; // 01000000
        assert_eq!(pow::count_leading_zero_bits(&h), 9);
    }

    #[test]
    fn meets_target_matches_hex_prefix() {
        let mut h = [0xffu8; 32];
        h[0] = 0x00;
        h[1] = 0x0f;
        // hex "000f..." has three leading zero digits
        assert!(hex::encode(h).starts_with("000"));
        assert!(pow::meets_target(&h, 3));
        assert!(!pow::meets_target(&h, 4));
        assert!(pow::meets_target(&h, 0));
    }

    #[test]
    fn block_hash_bytes_layout() {
        let block = sample_block();
        let bytes = block.hash_bytes();
        assert_eq!(bytes.len(), 67);
        assert_eq!(&bytes[0..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &1_600_000_000u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &1u64.to_le_bytes());
        // sender "0"
        assert_eq!(&bytes[24..32], &1u64.to_le_bytes());
        assert_eq!(bytes[32], b'0');
        // recipient "X"
        assert_eq!(&bytes[33..41], &1u64.to_le_bytes());
        assert_eq!(bytes[41], b'X');
        assert_eq!(&bytes[42..50], &1i64.to_le_bytes());
        assert_eq!(&bytes[50..58], &12345u64.to_le_bytes());
        assert_eq!(&bytes[58..66], &1u64.to_le_bytes());
        assert_eq!(bytes[66], b'1');
    }

    #[test]
    fn block_hash_example() {
        let block = sample_block();
        let expected_hex = "5af5910db2acd1fd91271cac6e7bfd015c34f4cf9ec5d020d939a54a1c30b325";
        assert_eq!(block.hash, expected_hex);
        assert_eq!(block.hash.len(), HASH_HEX_SIZE);
        assert!(block.has_valid_hash());
    }

    #[test]
    fn genesis_shaped_block_hash_example() {
        let block = Block::new(1, 1_600_000_000, vec![], 100, "1".to_string());
        assert_eq!(
            block.hash,
            "3068fd99bd8cdc3cdc4d8f7430d25f13f7fd8eb4521e0e75aa56b2f12038fc2f"
        );
    }

    #[test]
    fn cached_hash_is_not_hashed() {
        let mut block = sample_block();
        let before = block.compute_hash();
        block.hash = "something else".into();
        assert_eq!(block.compute_hash(), before);
        assert!(!block.has_valid_hash());
    }

    #[test]
    fn block_hash_changes_with_each_field() {
        let base = sample_block();
        let mut other = base.clone();
        other.proof += 1;
        assert_ne!(base.compute_hash(), other.compute_hash());

        let mut other = base.clone();
        other.previous_hash = "2".into();
        assert_ne!(base.compute_hash(), other.compute_hash());

        let mut other = base.clone();
        other.transactions[0].amount = 2;
        assert_ne!(base.compute_hash(), other.compute_hash());

        let mut other = base.clone();
        other.timestamp += 1;
        assert_ne!(base.compute_hash(), other.compute_hash());
    }

    #[test]
    fn string_boundaries_are_unambiguous() {
        let a = Block::new(2, 0, vec![Transaction::new("ab", "c", 1)], 0, "1".into());
        let b = Block::new(2, 0, vec![Transaction::new("a", "bc", 1)], 0, "1".into());
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn proof_hash_example() {
        let h = ProofOfWork::proof_hash(100, 0, "1");
        assert_eq!(
            hex::encode(h),
            "e5c1dcaa966b7d46ce9762a20c9af7f6f9340f3e1a26d99e6c04afe64c2decb0"
        );
    }

    #[test]
    fn seal_finds_first_valid_proof() {
        let genesis_hash = "3068fd99bd8cdc3cdc4d8f7430d25f13f7fd8eb4521e0e75aa56b2f12038fc2f";
        let pow = ProofOfWork::new(2);
        let proof = pow.seal(100, genesis_hash);
        assert_eq!(proof, 201);
        assert!(pow.verify(100, proof, genesis_hash));
        assert!((0..proof).all(|p| !pow.verify(100, p, genesis_hash)));
    }

    #[test]
    fn seal_default_difficulty_example() {
        let genesis_hash = "3068fd99bd8cdc3cdc4d8f7430d25f13f7fd8eb4521e0e75aa56b2f12038fc2f";
        let pow = ProofOfWork::default();
        assert_eq!(pow.difficulty(), 4);
        let proof = pow.seal(100, genesis_hash);
        assert_eq!(proof, 36454);
        assert!(hex::encode(ProofOfWork::proof_hash(100, proof, genesis_hash)).starts_with("0000"));
    }

    #[test]
    fn verify_is_deterministic() {
        let pow = ProofOfWork::new(2);
        let proof = pow.seal(7, "abc");
        for _ in 0..10 {
            assert!(pow.verify(7, proof, "abc"));
        }
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::new("Alice", "Bob", 10);
        let json = serde_json::to_string(&tx).unwrap();
        assert_eq!(json, r#"{"sender":"Alice","recipient":"Bob","amount":10}"#);
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, back);
    }

    #[test]
    fn block_serialization_keeps_cached_hash() {
        let block = sample_block();
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["index"], 2);
        assert_eq!(json["previous_hash"], "1");
        assert_eq!(json["hash"], block.hash.as_str());
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
        assert!(back.has_valid_hash());
    }
}
