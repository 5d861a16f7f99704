//! Multichain Batcher - chain-aware compilation and batched submission of
//! EVM transaction intents
//!
//! Intents (approvals, transfers, raw calls, concentrated-liquidity mints) may
//! target different chains. The batcher moves the connected wallet onto each
//! intent's chain before encoding it, groups the results into one atomic batch
//! per chain and tracks every batch through to its receipt.

pub mod chain;
pub mod config;
pub mod coordination;
pub mod error;
pub mod intent;
pub mod liquidity;
pub mod metrics;
pub mod tx;
pub mod wallet;

pub use chain::{Chain, ChainRegistry};
pub use config::Settings;
pub use coordination::{BatcherContext, Orchestrator, RunReport};
pub use error::{BatcherError, BatcherResult, OrchestratorError};
pub use intent::{ChatDataParams, TransactionIntent};
