//! Batch aggregation across intent lists

use super::compiler::{IntentCompiler, IntentPosition};
use crate::config::CompileFailurePolicy;
use crate::error::CompileError;
use crate::intent::TransactionIntent;
use crate::tx::CompiledTransaction;

use std::collections::HashMap;
use tracing::{info, warn};

/// Ordered transactions for one chain
#[derive(Debug, Clone)]
pub struct ChainBatch {
    chain_id: u64,
    transactions: Vec<CompiledTransaction>,
}

impl ChainBatch {
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn transactions(&self) -> &[CompiledTransaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Compiled transactions grouped by chain.
///
/// One batch per distinct chain, batches in first-seen chain order, and each
/// batch in input order. Nothing is reordered or deduplicated.
#[derive(Debug, Default)]
pub struct BatchPlan {
    batches: Vec<ChainBatch>,
    index: HashMap<u64, usize>,
    skipped: Vec<CompileError>,
}

impl BatchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the chain's batch, opening it on first sight of the chain
    pub fn push(&mut self, tx: CompiledTransaction) {
        let chain_id = tx.chain_id();
        let slot = *self.index.entry(chain_id).or_insert_with(|| {
            self.batches.push(ChainBatch {
                chain_id,
                transactions: Vec::new(),
            });
            self.batches.len() - 1
        });
        self.batches[slot].transactions.push(tx);
    }

    pub fn batch(&self, chain_id: u64) -> Option<&ChainBatch> {
        self.index.get(&chain_id).map(|&i| &self.batches[i])
    }

    pub fn batches(&self) -> &[ChainBatch] {
        &self.batches
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.batches.iter().map(ChainBatch::chain_id).collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.batches.iter().map(ChainBatch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Intents dropped under [`CompileFailurePolicy::Skip`]
    pub fn skipped(&self) -> &[CompileError] {
        &self.skipped
    }

    pub fn take_skipped(&mut self) -> Vec<CompileError> {
        std::mem::take(&mut self.skipped)
    }
}

pub struct BatchAggregator {
    compiler: IntentCompiler,
    policy: CompileFailurePolicy,
}

impl BatchAggregator {
    pub fn new(compiler: IntentCompiler, policy: CompileFailurePolicy) -> Self {
        Self { compiler, policy }
    }

    /// Compile every intent in order and group the results by chain.
    ///
    /// Each compile, chain switch included, completes before the next starts.
    /// A chain switch failure always ends aggregation; other compile failures
    /// do too unless the policy is `Skip`.
    pub async fn aggregate(
        &self,
        intent_lists: &[Vec<TransactionIntent>],
    ) -> Result<BatchPlan, CompileError> {
        let mut plan = BatchPlan::new();

        let mut index = 0;
        for (turn, list) in intent_lists.iter().enumerate() {
            for intent in list {
                match self
                    .compiler
                    .compile(IntentPosition { index, turn }, intent)
                    .await
                {
                    Ok(tx) => plan.push(tx),
                    Err(e)
                        if self.policy == CompileFailurePolicy::Skip && !e.is_switch_failure() =>
                    {
                        warn!(
                            index,
                            turn,
                            chain_id = e.chain_id,
                            kind = e.kind,
                            "Intent skipped"
                        );
                        plan.skipped.push(e);
                    }
                    Err(e) => return Err(e),
                }
                index += 1;
            }
        }

        info!(
            chains = plan.batches.len(),
            transactions = plan.transaction_count(),
            skipped = plan.skipped.len(),
            "Batch plan built"
        );
        Ok(plan)
    }
}
