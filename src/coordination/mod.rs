//! Coordination of multichain intent runs
//!
//! A run flows through:
//! 1. `IntentCompiler` - switch to each intent's chain, then encode it
//! 2. `BatchAggregator` - group compiled transactions by chain in input order
//! 3. `SubmissionPipeline` - per chain: switch, submit the batch, await the receipt
//!
//! `ChainSwitchCoordinator` is the only component that moves the wallet
//! between chains.

pub mod aggregator;
pub mod compiler;
pub mod engine;
pub mod pipeline;
pub mod switch;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{BatchAggregator, BatchPlan, ChainBatch};
pub use compiler::{IntentCompiler, IntentPosition};
pub use engine::{BatcherContext, Orchestrator, RunReport};
pub use pipeline::{ChainReceipt, SubmissionPipeline};
pub use switch::ChainSwitchCoordinator;
