//! Multichain Batcher - compile intent files and submit them through a wallet bridge
//!
//! `run` compiles, groups and submits; `plan` stops after grouping and prints
//! what would be submitted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

use multichain_batcher::chain::RpcChainReader;
use multichain_batcher::coordination::{BatchPlan, BatcherContext, Orchestrator};
use multichain_batcher::intent::{intent_lists, parse_turns, ChatDataParams};
use multichain_batcher::metrics::MetricsServer;
use multichain_batcher::wallet::RpcWallet;
use multichain_batcher::{OrchestratorError, Settings};

#[derive(Parser, Debug)]
#[command(name = "multichain-batcher")]
#[command(author, version, about = "Chain-aware batching of EVM transaction intents")]
struct Cli {
    /// Configuration file, overrides BATCHER_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile, batch and submit the intents in the given files
    Run {
        /// Files holding one turn or an array of turns
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Compile and batch only; nothing is submitted
    Plan {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    init_logging(cli.json_logs || settings.logging.json);

    info!("Starting Multichain Batcher v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Loaded configuration for {} chains",
        settings.enabled_chains().len()
    );

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    let wallet = Arc::new(RpcWallet::new(&settings.wallet)?);
    let reader = Arc::new(RpcChainReader::new());
    let ctx = BatcherContext::from_settings(&settings, wallet, reader)?;
    let orchestrator = Orchestrator::new(&ctx);

    let outcome = match cli.command {
        Command::Plan { files } => {
            let lists = intent_lists(&read_turns(&files)?);
            match orchestrator.plan(&lists).await {
                Ok(plan) => {
                    print_plan(&plan)?;
                    Ok(())
                }
                Err(e) => Err(report_failure(e)),
            }
        }
        Command::Run { files } => {
            let lists = intent_lists(&read_turns(&files)?);
            tokio::select! {
                result = orchestrator.execute(&lists) => match result {
                    Ok(report) => {
                        let skipped: Vec<String> =
                            report.skipped.iter().map(ToString::to_string).collect();
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&json!({
                                "run_id": report.run_id,
                                "receipts": report.receipts,
                                "skipped": skipped,
                            }))?
                        );
                        Ok(())
                    }
                    Err(e) => Err(report_failure(e)),
                },
                _ = shutdown_signal() => {
                    warn!("Interrupted; chain groups already confirmed are not rolled back");
                    Err(anyhow::anyhow!("run interrupted"))
                }
            }
        }
    };

    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Multichain Batcher stopped");
    outcome
}

fn read_turns(files: &[PathBuf]) -> Result<Vec<ChatDataParams>> {
    let mut turns = Vec::new();
    for file in files {
        turns.extend(read_turn_file(file)?);
    }
    Ok(turns)
}

fn read_turn_file(path: &Path) -> Result<Vec<ChatDataParams>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read intent file: {:?}", path))?;
    let turns =
        parse_turns(&raw).with_context(|| format!("Failed to parse intent file: {:?}", path))?;

    for turn in &turns {
        debug!(
            turn_id = turn.id.as_deref().unwrap_or("-"),
            chain_id = ?turn.chain_id,
            intents = turn.transactions_data.len(),
            "Loaded turn"
        );
    }
    Ok(turns)
}

fn print_plan(plan: &BatchPlan) -> Result<()> {
    let batches: Vec<_> = plan
        .batches()
        .iter()
        .map(|batch| {
            json!({
                "chain_id": batch.chain_id(),
                "transactions": batch
                    .transactions()
                    .iter()
                    .map(|tx| json!({
                        "kind": tx.kind().as_str(),
                        "to": tx.transaction().to_addr(),
                        "data": tx.transaction().data(),
                    }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    let skipped: Vec<String> = plan.skipped().iter().map(ToString::to_string).collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "batches": batches, "skipped": skipped }))?
    );
    Ok(())
}

/// Log the failing stage and disclose groups that already landed
fn report_failure(e: OrchestratorError) -> anyhow::Error {
    for receipt in e.confirmed() {
        warn!(
            chain_id = receipt.chain_id,
            transaction_hash = ?receipt.transaction_hash,
            "Chain group already confirmed before failure"
        );
    }
    if e.is_retryable() {
        info!("Failure looks transient; rerunning the unconfirmed intents may succeed");
    }
    anyhow::anyhow!(
        "{} failed on chain {}: {}",
        e.stage(),
        e.chain_id(),
        e
    )
}

fn init_logging(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,multichain_batcher=debug,hyper=warn")
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
