pub mod block;
pub mod difficulty;
pub mod store;
pub mod validate;

pub use block::Block;
pub use difficulty::{DifficultyPolicy, next_difficulty};
pub use store::{ChainStore, ChainSummary, ReplaceError};
pub use validate::{ValidationError, chain_weight, validate_chain, validate_transition};

/// Target seconds per block.
pub const BLOCK_GENERATION_INTERVAL_SECS: i64 = 10;

/// Difficulty is re-derived every this many blocks.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;
