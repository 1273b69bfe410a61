use thiserror::Error;

use super::Block;

/// Maximum clock drift tolerated when validating a block's timestamp, in
/// seconds: at most this far ahead of current time, at most this far behind
/// the predecessor.
pub const MAX_TIMESTAMP_DRIFT_SECS: i64 = 60;

/// Reason a candidate block or chain was rejected. Business-rule failures
/// are values, never panics; callers needing the boolean contract use
/// `is_ok()`.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid index: expected {expected}, got {got}")]
    Index { expected: u64, got: u64 },
    #[error("previous hash does not match predecessor's hash")]
    PreviousHash,
    #[error("recomputed hash does not match claimed hash")]
    HashMismatch,
    #[error("hash does not meet difficulty {difficulty}")]
    Difficulty { difficulty: u32 },
    #[error("timestamp out of allowed range")]
    Timestamp,
    #[error("chain is empty")]
    EmptyChain,
    #[error("malformed genesis block")]
    Genesis,
}

/// Check that `candidate` is a valid successor of `predecessor` at wall time
/// `now` (Unix seconds).
pub fn validate_transition(
    candidate: &Block,
    predecessor: &Block,
    now: i64,
) -> Result<(), ValidationError> {
    if predecessor.index + 1 != candidate.index {
        return Err(ValidationError::Index {
            expected: predecessor.index + 1,
            got: candidate.index,
        });
    }
    if predecessor.hash != candidate.previous_hash {
        return Err(ValidationError::PreviousHash);
    }
    if candidate.compute_hash() != candidate.hash {
        return Err(ValidationError::HashMismatch);
    }
    if !Block::meets_difficulty(&candidate.hash, candidate.difficulty) {
        return Err(ValidationError::Difficulty {
            difficulty: candidate.difficulty,
        });
    }
    if candidate.timestamp > now + MAX_TIMESTAMP_DRIFT_SECS
        || candidate.timestamp < predecessor.timestamp - MAX_TIMESTAMP_DRIFT_SECS
    {
        return Err(ValidationError::Timestamp);
    }
    Ok(())
}

/// Validate a whole chain: genesis well-formedness plus every consecutive
/// transition. Short-circuits on the first failure.
pub fn validate_chain(chain: &[Block], now: i64) -> Result<(), ValidationError> {
    let genesis = chain.first().ok_or(ValidationError::EmptyChain)?;
    if genesis.index != 0 || genesis.previous_hash != "0" || !genesis.is_sealed() {
        return Err(ValidationError::Genesis);
    }
    for pair in chain.windows(2) {
        validate_transition(&pair[1], &pair[0], now)?;
    }
    Ok(())
}

/// Cumulative chain weight: `sum(2^difficulty)` over all blocks. Used only
/// for fork-choice comparison.
pub fn chain_weight(chain: &[Block]) -> f64 {
    chain.iter().map(|b| 2f64.powi(b.difficulty as i32)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Block;

    fn sealed_child(prev: &Block, difficulty: u32) -> Block {
        let mut b = Block::template(prev.index + 1, "data".into(), prev.hash.clone(), difficulty);
        loop {
            b.hash = b.compute_hash();
            if Block::meets_difficulty(&b.hash, difficulty) {
                return b;
            }
            b.nonce += 1;
        }
    }

    #[test]
    fn single_genesis_chain_is_valid() {
        let genesis = Block::genesis();
        let now = genesis.timestamp;
        assert!(validate_chain(&[genesis], now).is_ok());
    }

    #[test]
    fn empty_chain_is_invalid() {
        assert_eq!(validate_chain(&[], 0), Err(ValidationError::EmptyChain));
    }

    #[test]
    fn valid_transition_accepts_mined_child() {
        let genesis = Block::genesis();
        let child = sealed_child(&genesis, 1);
        assert!(validate_transition(&child, &genesis, child.timestamp).is_ok());
    }

    #[test]
    fn transition_rejects_bad_index() {
        let genesis = Block::genesis();
        let mut child = sealed_child(&genesis, 0);
        child.index = 5;
        child.hash = child.compute_hash();
        assert_eq!(
            validate_transition(&child, &genesis, child.timestamp),
            Err(ValidationError::Index { expected: 1, got: 5 })
        );
    }

    #[test]
    fn transition_rejects_forged_hash() {
        // peer claims a hash that does not match the block content
        let genesis = Block::genesis();
        let mut child = sealed_child(&genesis, 0);
        child.hash = "deadbeef".repeat(8);
        assert_eq!(
            validate_transition(&child, &genesis, child.timestamp),
            Err(ValidationError::HashMismatch)
        );
    }

    #[test]
    fn transition_rejects_unmet_difficulty() {
        let genesis = Block::genesis();
        let mut child = Block::template(1, "data".into(), genesis.hash.clone(), 64);
        child.hash = child.compute_hash();
        // a SHA-256 hex digest cannot have 64 leading zeros in practice
        assert_eq!(
            validate_transition(&child, &genesis, child.timestamp),
            Err(ValidationError::Difficulty { difficulty: 64 })
        );
    }

    #[test]
    fn transition_rejects_future_timestamp() {
        let genesis = Block::genesis();
        let mut child = sealed_child(&genesis, 0);
        child.timestamp += 120;
        child.hash = child.compute_hash();
        assert_eq!(
            // `now` is the template's original timestamp, so the candidate
            // sits 120 s in the future
            validate_transition(&child, &genesis, child.timestamp - 120),
            Err(ValidationError::Timestamp)
        );
    }

    #[test]
    fn transition_rejects_timestamp_behind_predecessor() {
        let genesis = Block::genesis();
        let mut child = sealed_child(&genesis, 0);
        child.timestamp = genesis.timestamp - 61;
        child.hash = child.compute_hash();
        assert_eq!(
            validate_transition(&child, &genesis, genesis.timestamp),
            Err(ValidationError::Timestamp)
        );
    }

    #[test]
    fn appending_valid_block_keeps_chain_valid() {
        let genesis = Block::genesis();
        let b1 = sealed_child(&genesis, 1);
        let b2 = sealed_child(&b1, 1);
        let chain = vec![genesis, b1, b2];
        assert!(validate_chain(&chain, chain[2].timestamp).is_ok());
    }

    #[test]
    fn weight_sums_powers_of_two() {
        let genesis = Block::genesis();
        let b1 = sealed_child(&genesis, 1);
        let b2 = sealed_child(&b1, 2);
        let chain = vec![genesis, b1, b2];
        // 2^0 + 2^1 + 2^2
        assert_eq!(chain_weight(&chain), 7.0);
    }
}
