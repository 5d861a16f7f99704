//! Per-chain batch submission
//!
//! Groups are submitted one at a time. There is no cross-chain atomicity: a
//! failure stops the pipeline and reports the groups that already landed.

use super::aggregator::{BatchPlan, ChainBatch};
use super::switch::ChainSwitchCoordinator;
use crate::chain::ChainRegistry;
use crate::config::OrchestratorConfig;
use crate::error::{SubmissionCause, SubmissionError, SubmissionStage, SwitchError};
use crate::metrics;
use crate::wallet::Wallet;

use ethers::types::H256;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

/// Confirmation of one chain group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReceipt {
    pub chain_id: u64,
    pub transaction_hash: H256,
    pub block_number: Option<u64>,
    pub transaction_count: usize,
}

pub struct SubmissionPipeline {
    registry: Arc<ChainRegistry>,
    wallet: Arc<dyn Wallet>,
    switcher: Arc<ChainSwitchCoordinator>,
    submit_timeout: Duration,
    receipt_timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(
        registry: Arc<ChainRegistry>,
        wallet: Arc<dyn Wallet>,
        switcher: Arc<ChainSwitchCoordinator>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            wallet,
            switcher,
            submit_timeout: config.submit_timeout(),
            receipt_timeout: config.receipt_timeout(),
        }
    }

    /// Submit every chain group in plan order and wait for each receipt
    pub async fn submit_all(&self, plan: &BatchPlan) -> Result<Vec<ChainReceipt>, SubmissionError> {
        let mut confirmed = Vec::with_capacity(plan.batches().len());

        for (position, batch) in plan.batches().iter().enumerate() {
            if batch.is_empty() {
                continue;
            }

            match self.submit_batch(batch).await {
                Ok(receipt) => confirmed.push(receipt),
                Err((stage, cause)) => {
                    let not_attempted = plan.batches()[position + 1..]
                        .iter()
                        .map(ChainBatch::chain_id)
                        .collect();
                    error!(
                        chain_id = batch.chain_id(),
                        %stage,
                        error = %cause,
                        confirmed = confirmed.len(),
                        "Chain group submission failed"
                    );
                    return Err(SubmissionError {
                        chain_id: batch.chain_id(),
                        stage,
                        cause,
                        confirmed,
                        not_attempted,
                    });
                }
            }
        }

        Ok(confirmed)
    }

    async fn submit_batch(
        &self,
        batch: &ChainBatch,
    ) -> Result<ChainReceipt, (SubmissionStage, SubmissionCause)> {
        let chain_id = batch.chain_id();
        let chain = self
            .registry
            .resolve(chain_id)
            .map_err(|e| (SubmissionStage::Switch, SubmissionCause::Wallet(e)))?;

        self.switcher
            .ensure_active_chain(chain)
            .await
            .map_err(|e| (SubmissionStage::Switch, SubmissionCause::Switch(e)))?;

        let submit = |cause| (SubmissionStage::Submit, cause);

        let account = self
            .wallet
            .account()
            .await
            .map_err(|e| submit(SubmissionCause::Wallet(e)))?
            .ok_or_else(|| submit(SubmissionCause::Switch(SwitchError::NotConnected)))?;

        let submitted = timeout(
            self.submit_timeout,
            self.wallet.send_batch(chain, batch.transactions(), &account),
        )
        .await
        .map_err(|_| submit(SubmissionCause::SubmitTimeout(self.submit_timeout)))?
        .map_err(|e| submit(SubmissionCause::Wallet(e)))?;

        info!(
            chain_id,
            transactions = batch.len(),
            transaction_hash = ?submitted.transaction_hash,
            "Batch submitted"
        );
        metrics::record_batch_submitted(chain_id, batch.len());

        let hash = submitted.transaction_hash;
        let receipt_err = |cause| (SubmissionStage::Receipt, cause);

        let receipt = timeout(self.receipt_timeout, self.wallet.wait_for_receipt(chain, hash))
            .await
            .map_err(|_| {
                metrics::record_receipt(chain_id, false);
                receipt_err(SubmissionCause::ReceiptTimeout {
                    transaction_hash: hash,
                    after: self.receipt_timeout,
                })
            })?
            .map_err(|e| receipt_err(SubmissionCause::Wallet(e)))?
            .ok_or_else(|| receipt_err(SubmissionCause::ReceiptMissing(hash)))?;

        if !receipt.success {
            metrics::record_receipt(chain_id, false);
            return Err(receipt_err(SubmissionCause::Reverted(hash)));
        }

        info!(
            chain_id,
            transaction_hash = ?hash,
            block_number = ?receipt.block_number,
            "Receipt confirmed"
        );
        metrics::record_receipt(chain_id, true);

        Ok(ChainReceipt {
            chain_id,
            transaction_hash: hash,
            block_number: receipt.block_number,
            transaction_count: batch.len(),
        })
    }
}
