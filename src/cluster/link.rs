use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use super::{ClusterContext, ClusterError};

/// Message-passing seam between cooperating nodes. Collectives are
/// synchronization points: every node of the cluster must make the same call
/// in the same order, and no node proceeds until all have contributed.
/// Payloads are the canonical JSON encodings of blocks, chains and
/// summaries; the link itself does not interpret them.
pub trait ClusterLink: Send + Sync {
    fn context(&self) -> ClusterContext;

    /// Every node contributes a payload; every node receives all payloads,
    /// indexed by rank.
    fn allgather(&self, payload: String) -> Result<Vec<String>, ClusterError>;

    /// `root` supplies the payload; every node receives it.
    fn broadcast(&self, root: usize, payload: Option<String>) -> Result<String, ClusterError>;

    /// Block until every node has reached this point.
    fn barrier(&self) -> Result<(), ClusterError>;

    /// Raise the round's external stop signal on every peer.
    fn post_stop(&self);

    /// Whether a peer has raised the stop signal for this node. Polled by
    /// the liveness watcher, never blocking.
    fn stop_requested(&self) -> bool;

    /// Reset this node's stop signal at round entry.
    fn clear_stop(&self);
}

struct Shared {
    size: usize,
    barrier: Barrier,
    board: Mutex<Vec<Option<String>>>,
    bcast: Mutex<Option<String>>,
    stops: Vec<AtomicBool>,
}

/// In-process `ClusterLink` over shared memory: one link per simulated node,
/// collectives built from a reusable barrier and rank-indexed boards. A
/// wire-backed link between separately-addressed processes is a transport
/// concern and lives outside this crate.
pub struct LocalClusterLink {
    rank: usize,
    shared: Arc<Shared>,
}

/// Create the links for an in-process cluster of `size` nodes, indexed by
/// rank.
pub fn local_cluster(size: usize) -> Vec<LocalClusterLink> {
    assert!(size > 0);
    let shared = Arc::new(Shared {
        size,
        barrier: Barrier::new(size),
        board: Mutex::new(vec![None; size]),
        bcast: Mutex::new(None),
        stops: (0..size).map(|_| AtomicBool::new(false)).collect(),
    });
    (0..size)
        .map(|rank| LocalClusterLink {
            rank,
            shared: Arc::clone(&shared),
        })
        .collect()
}

impl ClusterLink for LocalClusterLink {
    fn context(&self) -> ClusterContext {
        ClusterContext::new(self.rank, self.shared.size)
    }

    fn allgather(&self, payload: String) -> Result<Vec<String>, ClusterError> {
        {
            let mut board = self.shared.board.lock().expect("mutex poisoned");
            board[self.rank] = Some(payload);
        }
        self.shared.barrier.wait();
        let gathered = {
            let board = self.shared.board.lock().expect("mutex poisoned");
            board
                .iter()
                .cloned()
                .collect::<Option<Vec<String>>>()
                .ok_or_else(|| ClusterError::Collective("allgather slot left empty".into()))?
        };
        self.shared.barrier.wait();
        if self.rank == 0 {
            let mut board = self.shared.board.lock().expect("mutex poisoned");
            board.iter_mut().for_each(|slot| *slot = None);
        }
        self.shared.barrier.wait();
        Ok(gathered)
    }

    fn broadcast(&self, root: usize, payload: Option<String>) -> Result<String, ClusterError> {
        if self.rank == root {
            let mut slot = self.shared.bcast.lock().expect("mutex poisoned");
            *slot = payload;
        }
        self.shared.barrier.wait();
        let received = {
            let slot = self.shared.bcast.lock().expect("mutex poisoned");
            slot.clone().ok_or(ClusterError::MissingPayload(root))?
        };
        self.shared.barrier.wait();
        if self.rank == root {
            let mut slot = self.shared.bcast.lock().expect("mutex poisoned");
            *slot = None;
        }
        self.shared.barrier.wait();
        Ok(received)
    }

    fn barrier(&self) -> Result<(), ClusterError> {
        self.shared.barrier.wait();
        Ok(())
    }

    fn post_stop(&self) {
        for (rank, stop) in self.shared.stops.iter().enumerate() {
            if rank != self.rank {
                stop.store(true, Ordering::Release);
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.shared.stops[self.rank].load(Ordering::Acquire)
    }

    fn clear_stop(&self) {
        self.shared.stops[self.rank].store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn allgather_indexes_payloads_by_rank() {
        let links = local_cluster(3);
        let results: Vec<Vec<String>> = thread::scope(|scope| {
            let handles: Vec<_> = links
                .iter()
                .map(|link| {
                    scope.spawn(move || link.allgather(format!("from-{}", link.context().rank)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });
        for gathered in results {
            assert_eq!(gathered, vec!["from-0", "from-1", "from-2"]);
        }
    }

    #[test]
    fn broadcast_delivers_root_payload_to_all() {
        let links = local_cluster(2);
        let results: Vec<String> = thread::scope(|scope| {
            let handles: Vec<_> = links
                .iter()
                .map(|link| {
                    scope.spawn(move || {
                        let payload = (link.context().rank == 1).then(|| "the-block".to_string());
                        link.broadcast(1, payload)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });
        assert_eq!(results, vec!["the-block", "the-block"]);
    }

    #[test]
    fn stop_signal_reaches_peers_but_not_self() {
        let links = local_cluster(2);
        links[0].post_stop();
        assert!(!links[0].stop_requested());
        assert!(links[1].stop_requested());
        links[1].clear_stop();
        assert!(!links[1].stop_requested());
    }
}
