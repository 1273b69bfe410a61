use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::blockchain::Block;

use super::{MineError, PROGRESS_LOG_EVERY, STOP_POLL_BATCH};

/// How the nonce space is partitioned for one engine invocation. Worker `w`
/// of the local pool searches the residue class
/// `offset + w, offset + w + stride, …`, so every (node, worker) pair in a
/// cluster covers a disjoint slice of the 64-bit space.
#[derive(Debug, Clone, Copy)]
pub struct SearchPlan {
    /// Local worker count.
    pub workers: usize,
    /// Global id of local worker 0 (`rank * workers`).
    pub offset: u64,
    /// Global worker count (`cluster_size * workers`).
    pub stride: u64,
}

impl SearchPlan {
    /// Single-node plan: workers `0..w` with stride `w`.
    pub fn local(workers: usize) -> Self {
        Self {
            workers,
            offset: 0,
            stride: workers as u64,
        }
    }

    /// Plan for one node of a cluster where every node runs `workers`
    /// local workers.
    pub fn clustered(workers: usize, rank: usize, cluster_size: usize) -> Self {
        Self {
            workers,
            offset: (rank * workers) as u64,
            stride: (cluster_size * workers) as u64,
        }
    }
}

/// One worker's arithmetic progression through the nonce space. Ends when
/// the next step would overflow 64 bits: the lane is exhausted.
#[derive(Debug)]
pub struct NonceLane {
    next: Option<u64>,
    stride: u64,
}

impl NonceLane {
    pub fn new(first: u64, stride: u64) -> Self {
        Self {
            next: Some(first),
            stride,
        }
    }
}

impl Iterator for NonceLane {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let current = self.next?;
        self.next = current.checked_add(self.stride);
        Some(current)
    }
}

/// A sealed block plus search telemetry.
#[derive(Debug, Clone)]
pub struct MineOutcome {
    pub block: Block,
    pub elapsed: Duration,
    pub hashes: u64,
    pub hash_rate: f64,
}

struct Winner {
    nonce: u64,
    hash: String,
}

/// Search for a nonce sealing `template` at its difficulty. Returns the
/// sealed block, or why the round ended without one. `stop` is the shared
/// cancellation flag: raising it from outside halts the search; a winning
/// worker claims it with a single compare-and-set, so exactly one worker
/// records a result even if several find valid nonces concurrently.
pub fn mine(template: &Block, plan: &SearchPlan, stop: &AtomicBool) -> Result<MineOutcome, MineError> {
    let start = Instant::now();
    let total_hashes = AtomicU64::new(0);
    let winner: Mutex<Option<Winner>> = Mutex::new(None);

    info!(
        "MINER - searching block #{} at difficulty {} with {} workers (offset {}, stride {})",
        template.index, template.difficulty, plan.workers, plan.offset, plan.stride
    );

    thread::scope(|scope| {
        for w in 0..plan.workers {
            let lane = NonceLane::new(plan.offset + w as u64, plan.stride);
            let total_hashes = &total_hashes;
            let winner = &winner;
            let mut candidate = template.clone();
            scope.spawn(move || {
                let mut batched: u64 = 0;
                for nonce in lane {
                    candidate.nonce = nonce;
                    let hash = candidate.compute_hash();
                    batched += 1;

                    if Block::meets_difficulty(&hash, candidate.difficulty) {
                        total_hashes.fetch_add(batched, Ordering::Relaxed);
                        // Exactly one worker wins this exchange; the external
                        // stop path stores the flag without claiming a win.
                        if stop
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            let mut slot = winner.lock().expect("mutex poisoned");
                            *slot = Some(Winner { nonce, hash });
                        }
                        return;
                    }

                    if batched >= STOP_POLL_BATCH {
                        let total = total_hashes.fetch_add(batched, Ordering::Relaxed) + batched;
                        batched = 0;
                        if stop.load(Ordering::Acquire) {
                            return;
                        }
                        if total % PROGRESS_LOG_EVERY < STOP_POLL_BATCH {
                            debug!("MINER - progress: {} hashes, nonce {}", total, nonce);
                        }
                    }
                }
                // lane overflowed 64 bits: this partition is exhausted
                total_hashes.fetch_add(batched, Ordering::Relaxed);
            });
        }
    });

    let elapsed = start.elapsed();
    let hashes = total_hashes.load(Ordering::Relaxed);
    let hash_rate = hashes as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    let won = winner.into_inner().expect("mutex poisoned");
    match won {
        Some(Winner { nonce, hash }) => {
            let mut block = template.clone();
            block.nonce = nonce;
            block.hash = hash;
            block.mining_time = elapsed.as_secs_f64();
            info!(
                "MINER - block #{} sealed: nonce={}, {} hashes in {:.3}s ({:.0} H/s)",
                block.index,
                block.nonce,
                hashes,
                elapsed.as_secs_f64(),
                hash_rate
            );
            Ok(MineOutcome {
                block,
                elapsed,
                hashes,
                hash_rate,
            })
        }
        None if stop.load(Ordering::Acquire) => Err(MineError::Stopped),
        None => Err(MineError::Exhausted {
            difficulty: template.difficulty,
        }),
    }
}
