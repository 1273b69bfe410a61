use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

use crate::blockchain::{Block, ChainStore, ChainSummary, ReplaceError, ValidationError};
use crate::miner::{MineError, MineOutcome, SearchPlan, mine};

use super::{ClusterError, ClusterLink};

/// How often the liveness watcher checks for a peer's stop signal.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-round lifecycle of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Searching,
    Found,
    Exhausted,
    StoppedExternally,
    Reconciled,
}

/// Why a mining round or reconciliation produced no result on this node.
#[derive(Debug, Error)]
pub enum RoundError {
    #[error("no node produced a winning nonce this round")]
    NoWinner,
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error("peer payload could not be decoded: {0}")]
    MalformedPeerData(String),
    #[error("adopted block or chain failed validation: {0}")]
    Validation(#[from] ValidationError),
}

/// What reconciliation did on this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This node held the heaviest chain and broadcast it.
    BroadcastLocal,
    /// A heavier peer chain validated and replaced the local one.
    Replaced,
    /// The received chain was not strictly heavier; local chain kept.
    KeptLocal,
}

/// Drives distributed mining rounds and chain reconciliation for one node.
/// One instance per node; each `run` call is one round of the state machine
/// `Idle -> Searching -> {Found | Exhausted | StoppedExternally} ->
/// Reconciled -> Idle`, gated by a cluster-wide barrier so no node starts a
/// new round while others are still adopting the previous block.
pub struct MiningRound<'a, L: ClusterLink> {
    link: &'a L,
    store: &'a ChainStore,
    workers: usize,
    state: RoundState,
}

impl<'a, L: ClusterLink> MiningRound<'a, L> {
    pub fn new(link: &'a L, store: &'a ChainStore, workers: usize) -> Self {
        Self {
            link,
            store,
            workers,
            state: RoundState::Idle,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Mine one block carrying `data` in cooperation with the whole cluster.
    /// Returns the globally agreed block (which has also been appended to
    /// the local store), or why the round failed.
    pub fn run(&mut self, data: String) -> Result<Block, RoundError> {
        // a stop posted during the previous round must not leak into this one
        self.link.clear_stop();
        self.link.barrier()?;

        let tip = self.store.latest();
        let difficulty = self.store.next_difficulty();
        let template = Block::template(tip.index + 1, data, tip.hash.clone(), difficulty);
        self.state = RoundState::Searching;

        let local = self.search(&template);
        self.state = match &local {
            Ok(_) => RoundState::Found,
            Err(MineError::Stopped) => RoundState::StoppedExternally,
            Err(MineError::Exhausted { .. }) => RoundState::Exhausted,
        };

        if local.is_ok() {
            // halt peers still searching; they adopt our block after election
            self.link.post_stop();
        }

        let adopted = self.arbitrate(local.ok());

        // every node must reach the barrier even on failure, or the cluster
        // deadlocks on the next round's entry
        if adopted.is_ok() {
            self.state = RoundState::Reconciled;
        }
        self.link.barrier()?;
        self.state = RoundState::Idle;
        adopted
    }

    /// Run the local engine with a liveness watcher that maps a peer's stop
    /// signal onto the engine's shared flag.
    fn search(&self, template: &Block) -> Result<MineOutcome, MineError> {
        let ctx = self.link.context();
        let plan = SearchPlan::clustered(self.workers, ctx.rank, ctx.size);
        let stop = AtomicBool::new(false);
        let search_done = AtomicBool::new(false);

        thread::scope(|scope| {
            let watcher = scope.spawn(|| {
                while !search_done.load(Ordering::Acquire) {
                    if self.link.stop_requested() {
                        stop.store(true, Ordering::Release);
                        break;
                    }
                    thread::sleep(STOP_POLL_INTERVAL);
                }
            });
            let result = mine(template, &plan, &stop);
            search_done.store(true, Ordering::Release);
            let _ = watcher.join();
            result
        })
    }

    /// Elect the global winner and adopt its block everywhere.
    fn arbitrate(&self, local: Option<MineOutcome>) -> Result<Block, RoundError> {
        let ctx = self.link.context();
        let report = if local.is_some() { "1" } else { "0" };
        let gathered = self.link.allgather(report.to_string())?;
        let winner = elect_winner(&gathered);

        let Some(winner) = winner else {
            warn!("ROUND - no node found a winning nonce");
            return Err(RoundError::NoWinner);
        };

        let payload = if ctx.rank == winner {
            let outcome = local.expect("elected winner must hold a local result");
            info!(
                "ROUND - node {} won block #{} ({} hashes, {:.0} H/s)",
                ctx.rank, outcome.block.index, outcome.hashes, outcome.hash_rate
            );
            Some(serde_json::to_string(&outcome.block).expect("block encoding is infallible"))
        } else {
            None
        };

        let encoded = self.link.broadcast(winner, payload)?;
        let block: Block = serde_json::from_str(&encoded)
            .map_err(|e| RoundError::MalformedPeerData(e.to_string()))?;

        // peer data is untrusted even in a cooperative cluster; the winner's
        // own block goes through the same check
        self.store.append(block.clone())?;
        if ctx.rank != winner {
            info!("ROUND - adopted block #{} from node {}", block.index, winner);
        }
        Ok(block)
    }

    /// Exchange chain summaries, let the heaviest node broadcast its chain,
    /// and apply it locally under the strict-greater-weight rule. Run
    /// periodically or on demand, independent of per-block mining.
    pub fn reconcile(&mut self) -> Result<ReconcileOutcome, RoundError> {
        let ctx = self.link.context();
        let summary = self.store.summary();
        let encoded = serde_json::to_string(&summary).expect("summary encoding is infallible");
        let gathered = self.link.allgather(encoded)?;

        let mut summaries = Vec::with_capacity(gathered.len());
        for payload in &gathered {
            let s: ChainSummary = serde_json::from_str(payload)
                .map_err(|e| RoundError::MalformedPeerData(e.to_string()))?;
            summaries.push(s);
        }
        // lowest rank among equals, matching a strictly-greater scan
        let mut best = 0usize;
        for (rank, s) in summaries.iter().enumerate().skip(1) {
            if s.weight > summaries[best].weight {
                best = rank;
            }
        }
        info!(
            "RECONCILE - heaviest chain on node {} (weight {}, length {})",
            best, summaries[best].weight, summaries[best].length
        );

        let payload = (ctx.rank == best).then(|| {
            serde_json::to_string(&self.store.snapshot()).expect("chain encoding is infallible")
        });
        let encoded = self.link.broadcast(best, payload)?;

        let outcome = if ctx.rank == best {
            Ok(ReconcileOutcome::BroadcastLocal)
        } else {
            let chain: Vec<Block> = serde_json::from_str(&encoded)
                .map_err(|e| RoundError::MalformedPeerData(e.to_string()))?;
            // local state may have changed since the summary exchange; the
            // store re-checks strict weight
            match self.store.replace(chain) {
                Ok(()) => Ok(ReconcileOutcome::Replaced),
                Err(ReplaceError::NotHeavier { .. }) => Ok(ReconcileOutcome::KeptLocal),
                Err(ReplaceError::Invalid(reason)) => Err(RoundError::Validation(reason)),
            }
        };
        self.link.barrier()?;
        outcome
    }
}

/// Maximum rank among nodes reporting success; `None` if nobody did. The
/// highest-rank tie-break is arbitrary but deterministic.
fn elect_winner(reports: &[String]) -> Option<usize> {
    reports
        .iter()
        .enumerate()
        .filter(|(_, r)| r.as_str() == "1")
        .map(|(rank, _)| rank)
        .max()
}
