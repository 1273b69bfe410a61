use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single block in the chain. The wire encoding (field names fixed by the
/// peer protocol) is the serde form with camelCase keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub data: String,
    pub timestamp: i64, // Unix timestamp (UTC seconds)
    pub previous_hash: String,
    pub difficulty: u32, // required leading hex zeros in `hash`
    pub nonce: u64,      // Proof-of-Work search variable
    pub hash: String,    // Cached hash of the block
    pub mining_time: f64, // wall-clock seconds spent searching, 0 for genesis
}

/// Fixed genesis timestamp. Every node must construct a byte-identical
/// genesis block or cross-node block adoption would fail on linkage.
pub const GENESIS_TIMESTAMP: i64 = 1_700_000_000;

impl Block {
    /// Create the genesis block (first block in the chain).
    pub fn genesis() -> Self {
        let mut block = Self {
            index: 0,
            data: String::from("Genesis Block"),
            timestamp: GENESIS_TIMESTAMP,
            previous_hash: String::from("0"),
            difficulty: 0,
            nonce: 0,
            hash: String::new(),
            mining_time: 0.0,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Create an unsealed block template. The timestamp is fixed here and
    /// never changes during the nonce search; the miner seals it.
    pub fn template(index: u64, data: String, previous_hash: String, difficulty: u32) -> Self {
        Self {
            index,
            data,
            timestamp: Utc::now().timestamp(),
            previous_hash,
            difficulty,
            nonce: 0,
            hash: String::new(),
            mining_time: 0.0,
        }
    }

    /// Compute the SHA-256 hash of this block over all fields except the
    /// cached `hash` itself and the `mining_time` telemetry.
    pub fn compute_hash(&self) -> String {
        let preimage = format!(
            "{}:{}:{}:{}:{}:{}",
            self.index, self.data, self.timestamp, self.previous_hash, self.difficulty, self.nonce
        );
        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// A hash meets difficulty `d` iff its first `d` hex characters are '0'.
    /// `d = 0` always satisfies.
    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        let d = difficulty as usize;
        hash.len() >= d && hash.as_bytes()[..d].iter().all(|&c| c == b'0')
    }

    /// Validate that the cached `hash` matches the block content and
    /// satisfies the block's own difficulty. (Does NOT validate linkage.)
    pub fn is_sealed(&self) -> bool {
        self.hash == self.compute_hash() && Self::meets_difficulty(&self.hash, self.difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::Block;

    #[test]
    fn genesis_has_valid_hash() {
        let b = Block::genesis();
        assert_eq!(b.index, 0);
        assert_eq!(b.previous_hash, "0");
        assert_eq!(b.hash, b.compute_hash());
        assert!(b.is_sealed());
    }

    #[test]
    fn hash_is_deterministic() {
        let b = Block::template(1, "payload".into(), "prev".into(), 2);
        assert_eq!(b.compute_hash(), b.compute_hash());
    }

    #[test]
    fn hash_changes_with_nonce() {
        let mut b = Block::template(1, "payload".into(), "prev".into(), 2);
        let h0 = b.compute_hash();
        b.nonce = 1;
        assert_ne!(h0, b.compute_hash());
    }

    #[test]
    fn difficulty_zero_always_met() {
        assert!(Block::meets_difficulty("ff00", 0));
        assert!(Block::meets_difficulty("", 0));
    }

    #[test]
    fn difficulty_counts_leading_hex_zeros() {
        assert!(Block::meets_difficulty("00ab", 2));
        assert!(!Block::meets_difficulty("0ab0", 2));
        assert!(!Block::meets_difficulty("0", 2));
    }

    #[test]
    fn invalid_when_mutated() {
        let mut b = Block::template(2, "payload".into(), "prev".into(), 0);
        b.hash = b.compute_hash();
        assert!(b.is_sealed());
        b.data.push('!');
        assert!(!b.is_sealed());
    }

    #[test]
    fn wire_encoding_uses_camel_case_keys() {
        let b = Block::genesis();
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.contains("\"previousHash\""));
        assert!(json.contains("\"miningTime\""));
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hash, b.hash);
    }

    #[test]
    fn decoding_rejects_missing_fields() {
        // fail-closed: a payload without `hash` is a decode error, not a
        // zero-defaulted block
        let err = serde_json::from_str::<Block>(
            r#"{"index":1,"data":"x","timestamp":0,"previousHash":"0","difficulty":0,"nonce":0,"miningTime":0.0}"#,
        );
        assert!(err.is_err());
    }
}
