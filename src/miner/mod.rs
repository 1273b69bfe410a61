pub mod engine;

pub use engine::{MineOutcome, SearchPlan, mine};

use thiserror::Error;

/// Upper bound on local search workers regardless of hardware.
pub const MAX_WORKERS: usize = 8;

/// Nonces a worker tries between checks of the shared stop flag. Polling
/// every iteration would thrash the cache line; polling too rarely delays
/// shutdown after a win.
pub const STOP_POLL_BATCH: u64 = 1024;

/// Progress log cadence, in total hashes.
pub const PROGRESS_LOG_EVERY: u64 = 100_000;

/// Why a search round produced no sealed block.
#[derive(Debug, Error, PartialEq)]
pub enum MineError {
    /// Every worker ran its nonce lane off the end of the 64-bit space.
    /// Fatal to the round; the difficulty was presumably unreachable.
    #[error("nonce space exhausted with no hash meeting difficulty {difficulty}")]
    Exhausted { difficulty: u32 },
    /// The shared stop flag was raised from outside before a local win
    /// (another node won the round).
    #[error("search stopped externally")]
    Stopped,
}

/// Local worker count: hardware parallelism minus one of headroom, split
/// across co-resident node processes, clamped to `[1, MAX_WORKERS]`. An
/// explicit override wins (still clamped).
pub fn resolve_workers(override_count: Option<usize>, co_resident_nodes: usize) -> usize {
    if let Some(n) = override_count {
        return n.clamp(1, MAX_WORKERS);
    }
    let cores = num_cpus::get().saturating_sub(1).max(1);
    (cores / co_resident_nodes.max(1)).clamp(1, MAX_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_is_clamped() {
        assert_eq!(resolve_workers(Some(0), 1), 1);
        assert_eq!(resolve_workers(Some(64), 1), MAX_WORKERS);
        assert_eq!(resolve_workers(Some(3), 1), 3);
    }

    #[test]
    fn derived_count_stays_in_bounds() {
        for nodes in 1..=4 {
            let w = resolve_workers(None, nodes);
            assert!((1..=MAX_WORKERS).contains(&w));
        }
    }

    #[test]
    fn co_resident_processes_share_the_cores() {
        // more processes on the same host never means more workers each
        let alone = resolve_workers(None, 1);
        let sharing = resolve_workers(None, 2);
        assert!(sharing <= alone);
        // an explicit override is per-process and ignores co-residency
        assert_eq!(resolve_workers(Some(4), 8), 4);
    }
}
