use std::sync::Mutex;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::validate::{chain_weight, validate_chain, validate_transition};
use super::{Block, DifficultyPolicy, ValidationError, next_difficulty};

/// Why a candidate chain did not replace the current one.
#[derive(Debug, Error, PartialEq)]
pub enum ReplaceError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("candidate weight {candidate} is not greater than current {current}")]
    NotHeavier { candidate: f64, current: f64 },
}

/// Lightweight view of a node's chain, exchanged during reconciliation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChainSummary {
    pub length: usize,
    pub difficulty: u32,
    pub weight: f64,
}

/// The authoritative chain for one node. The single internal lock serializes
/// append/replace against concurrent readers; it is held only for
/// validate-then-commit, never across the nonce search or a transport call.
#[derive(Debug)]
pub struct ChainStore {
    chain: Mutex<Vec<Block>>,
    policy: DifficultyPolicy,
}

impl ChainStore {
    /// Initialize with a fresh genesis block.
    pub fn new(policy: DifficultyPolicy) -> Self {
        Self {
            chain: Mutex::new(vec![Block::genesis()]),
            policy,
        }
    }

    /// Clone of the full chain.
    pub fn snapshot(&self) -> Vec<Block> {
        self.chain.lock().expect("mutex poisoned").clone()
    }

    /// Clone of the tip block.
    pub fn latest(&self) -> Block {
        let chain = self.chain.lock().expect("mutex poisoned");
        chain
            .last()
            .expect("chain always holds at least the genesis block")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.chain.lock().expect("mutex poisoned").len()
    }

    /// Difficulty target for the next block under the store's policy.
    pub fn next_difficulty(&self) -> u32 {
        let chain = self.chain.lock().expect("mutex poisoned");
        next_difficulty(&chain, self.policy)
    }

    pub fn weight(&self) -> f64 {
        let chain = self.chain.lock().expect("mutex poisoned");
        chain_weight(&chain)
    }

    pub fn summary(&self) -> ChainSummary {
        let chain = self.chain.lock().expect("mutex poisoned");
        ChainSummary {
            length: chain.len(),
            difficulty: next_difficulty(&chain, self.policy),
            weight: chain_weight(&chain),
        }
    }

    /// Validate `candidate` against the current tip and append it. On
    /// rejection the chain is unchanged and the reason is returned.
    pub fn append(&self, candidate: Block) -> Result<(), ValidationError> {
        let mut chain = self.chain.lock().expect("mutex poisoned");
        let tip = chain.last().expect("chain never empty");
        match validate_transition(&candidate, tip, Utc::now().timestamp()) {
            Ok(()) => {
                info!(
                    "CHAIN - block #{} appended (hash={}...)",
                    candidate.index,
                    &candidate.hash[..candidate.hash.len().min(16)]
                );
                chain.push(candidate);
                Ok(())
            }
            Err(reason) => {
                warn!("CHAIN - block #{} rejected: {}", candidate.index, reason);
                Err(reason)
            }
        }
    }

    /// Replace the whole chain if `candidate` validates and carries strictly
    /// greater weight. Ties keep the current chain. The swap is atomic: a
    /// reader sees either the old chain or the new one, never a mix.
    pub fn replace(&self, candidate: Vec<Block>) -> Result<(), ReplaceError> {
        validate_chain(&candidate, Utc::now().timestamp()).inspect_err(|reason| {
            warn!("CHAIN - candidate chain rejected: {}", reason);
        })?;
        let mut chain = self.chain.lock().expect("mutex poisoned");
        let current = chain_weight(&chain);
        let incoming = chain_weight(&candidate);
        if incoming > current {
            info!(
                "CHAIN - replacing chain: weight {} > {}, length {} -> {}",
                incoming,
                current,
                chain.len(),
                candidate.len()
            );
            *chain = candidate;
            Ok(())
        } else {
            warn!(
                "CHAIN - candidate chain kept out: weight {} <= {}",
                incoming, current
            );
            Err(ReplaceError::NotHeavier {
                candidate: incoming,
                current,
            })
        }
    }
}
