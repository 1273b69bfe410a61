pub mod link;
pub mod round;

pub use link::{ClusterLink, LocalClusterLink, local_cluster};
pub use round::{MiningRound, ReconcileOutcome, RoundError, RoundState};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// This node's identity within a fixed-size cooperating cluster. Constructed
/// once at startup and passed explicitly wherever cluster coordination needs
/// it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterContext {
    /// Identity index in `[0, size)`.
    pub rank: usize,
    /// Total cooperating node count.
    pub size: usize,
}

impl ClusterContext {
    pub fn new(rank: usize, size: usize) -> Self {
        debug_assert!(size > 0 && rank < size);
        Self { rank, size }
    }
}

/// A collective call across the cluster did not complete. The round that
/// issued it is aborted with local state unchanged.
#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("collective did not complete: {0}")]
    Collective(String),
    #[error("broadcast root {0} supplied no payload")]
    MissingPayload(usize),
}
