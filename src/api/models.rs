use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blockchain::{Block, ChainStore, DifficultyPolicy};
use crate::cluster::ClusterContext;
use crate::config::NodeConfig;
use crate::miner::resolve_workers;

/// Shared application state: the node's chain store plus its cluster
/// identity and resolved worker count.
pub struct AppState {
    pub store: Arc<ChainStore>,
    pub cluster: ClusterContext,
    pub workers: usize,
    pub policy: DifficultyPolicy,
}

impl AppState {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            store: Arc::new(ChainStore::new(config.policy)),
            cluster: config.cluster,
            workers: resolve_workers(config.worker_override, config.co_resident),
            policy: config.policy,
        }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse {
    pub length: usize,
    pub difficulty: u32,
    pub chain: Vec<Block>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
}

#[derive(Serialize)]
pub struct AcceptResponse {
    pub accepted: bool,
    pub reason: Option<String>,
}

impl AcceptResponse {
    pub fn ok() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl ToString) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.to_string()),
        }
    }
}

/* ---------- Mining API Models ---------- */

#[derive(Deserialize)]
pub struct MineRequest {
    pub data: String,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub mined_index: u64,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub mining_time_secs: f64,
    pub hashes: u64,
    pub hash_rate: f64,
}

/* ---------- Stats API Models ---------- */

#[derive(Serialize)]
pub struct StatsResponse {
    pub length: usize,
    pub difficulty: u32,
    pub weight: f64,
    pub policy: String,
    pub workers: usize,
    pub rank: usize,
    pub cluster_size: usize,
}
