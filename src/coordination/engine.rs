//! Orchestration of one intent run: compile, aggregate, submit

use super::aggregator::{BatchAggregator, BatchPlan};
use super::compiler::IntentCompiler;
use super::pipeline::{ChainReceipt, SubmissionPipeline};
use super::switch::ChainSwitchCoordinator;
use crate::chain::{ChainReader, ChainRegistry};
use crate::config::{LiquidityConfig, OrchestratorConfig, Settings};
use crate::error::{BatcherResult, CompileError, OrchestratorError};
use crate::intent::TransactionIntent;
use crate::liquidity::LiquidityPositionPlanner;
use crate::metrics;
use crate::wallet::Wallet;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Process-wide collaborators, built once at startup and handed to the orchestrator
#[derive(Clone)]
pub struct BatcherContext {
    pub registry: Arc<ChainRegistry>,
    pub wallet: Arc<dyn Wallet>,
    pub reader: Arc<dyn ChainReader>,
    pub orchestrator: OrchestratorConfig,
    pub liquidity: LiquidityConfig,
}

impl BatcherContext {
    pub fn from_settings(
        settings: &Settings,
        wallet: Arc<dyn Wallet>,
        reader: Arc<dyn ChainReader>,
    ) -> BatcherResult<Self> {
        Ok(Self {
            registry: Arc::new(ChainRegistry::from_settings(settings)?),
            wallet,
            reader,
            orchestrator: settings.orchestrator.clone(),
            liquidity: settings.liquidity.clone(),
        })
    }
}

/// Outcome of a successful run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub receipts: Vec<ChainReceipt>,
    /// Intents dropped by the skip policy
    pub skipped: Vec<CompileError>,
}

/// Runs intent lists end to end.
///
/// Runs never interleave: the wallet has a single active chain, so a second
/// run waits for the first to finish.
pub struct Orchestrator {
    aggregator: BatchAggregator,
    pipeline: SubmissionPipeline,
    run_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(ctx: &BatcherContext) -> Self {
        let switcher = Arc::new(ChainSwitchCoordinator::new(
            ctx.wallet.clone(),
            &ctx.orchestrator,
        ));
        let planner = LiquidityPositionPlanner::new(ctx.reader.clone(), &ctx.liquidity);
        let compiler = IntentCompiler::new(
            ctx.registry.clone(),
            switcher.clone(),
            ctx.reader.clone(),
            planner,
        );

        Self {
            aggregator: BatchAggregator::new(compiler, ctx.orchestrator.compile_failure),
            pipeline: SubmissionPipeline::new(
                ctx.registry.clone(),
                ctx.wallet.clone(),
                switcher,
                &ctx.orchestrator,
            ),
            run_lock: Mutex::new(()),
        }
    }

    /// Compile and group without submitting anything
    pub async fn plan(
        &self,
        intent_lists: &[Vec<TransactionIntent>],
    ) -> Result<BatchPlan, OrchestratorError> {
        let _guard = self.run_lock.lock().await;
        let run_id = Uuid::new_v4();

        let plan = self
            .aggregator
            .aggregate(intent_lists)
            .instrument(info_span!("plan", %run_id))
            .await?;
        Ok(plan)
    }

    /// Compile, group and submit every chain group
    pub async fn execute(
        &self,
        intent_lists: &[Vec<TransactionIntent>],
    ) -> Result<RunReport, OrchestratorError> {
        let _guard = self.run_lock.lock().await;
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        let result = async {
            info!(
                intent_lists = intent_lists.len(),
                intents = intent_lists.iter().map(Vec::len).sum::<usize>(),
                "Run started"
            );

            let mut plan = self.aggregator.aggregate(intent_lists).await?;
            let skipped = plan.take_skipped();
            let receipts = self.pipeline.submit_all(&plan).await?;

            info!(
                chains = receipts.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Run complete"
            );
            Ok::<_, OrchestratorError>(RunReport {
                run_id,
                receipts,
                skipped,
            })
        }
        .instrument(info_span!("run", %run_id))
        .await;

        if let Err(e) = &result {
            error!(
                %run_id,
                stage = e.stage(),
                chain_id = e.chain_id(),
                confirmed = e.confirmed().len(),
                "Run failed: {}",
                e
            );
        }
        metrics::record_run(result.is_ok(), started.elapsed().as_secs_f64());
        result
    }
}
