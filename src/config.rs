use std::env;

use crate::blockchain::DifficultyPolicy;
use crate::cluster::ClusterContext;

/// Process-level configuration, read once at startup from the environment
/// (with `.env` support via dotenvy).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub cluster: ClusterContext,
    /// Explicit local worker count; derived from hardware when absent.
    pub worker_override: Option<usize>,
    /// Node processes sharing this host's cores. Distinct from the cluster
    /// size: a multi-host cluster has remote peers that cost no local cores.
    pub co_resident: usize,
    pub policy: DifficultyPolicy,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let size: usize = env::var("CLUSTER_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(1);
        let rank: usize = env::var("NODE_RANK")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&r| r < size)
            .unwrap_or(0);
        let worker_override = env::var("MINER_THREADS").ok().and_then(|v| v.parse().ok());
        let co_resident: usize = env::var("CO_RESIDENT_NODES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(1);
        let policy = env::var("DIFFICULTY_POLICY")
            .ok()
            .and_then(|v| DifficultyPolicy::parse(&v))
            .unwrap_or(DifficultyPolicy::WallClock);

        Self {
            host,
            port,
            cluster: ClusterContext::new(rank, size),
            worker_override,
            co_resident,
            policy,
        }
    }
}
