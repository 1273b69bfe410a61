//! A minimal proof-of-work ledger node: hash-linked blocks, difficulty
//! adjustment, a parallel nonce search, and cluster-wide winner arbitration
//! with chain reconciliation.

pub mod api;
pub mod blockchain;
pub mod cluster;
pub mod config;
pub mod miner;
