//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Chain switches and how long the wallet took to confirm them
//! - Intent compilation by kind
//! - Batch submission and receipt outcomes per chain
//! - Whole-run outcomes

use crate::error::{BatcherError, BatcherResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Chain switch metrics
    pub static ref SWITCH_REQUESTED: CounterVec = register_counter_vec!(
        "batcher_chain_switch_requested_total",
        "Chain switches requested from the wallet",
        &["chain_id"]
    ).unwrap();

    pub static ref SWITCH_TIMEOUTS: CounterVec = register_counter_vec!(
        "batcher_chain_switch_timeouts_total",
        "Chain switches not confirmed in time",
        &["chain_id"]
    ).unwrap();

    pub static ref SWITCH_LATENCY: HistogramVec = register_histogram_vec!(
        "batcher_chain_switch_latency_seconds",
        "Time from switch request to confirmed active chain",
        &["chain_id"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();

    // Compilation metrics
    pub static ref INTENTS_COMPILED: CounterVec = register_counter_vec!(
        "batcher_intents_compiled_total",
        "Intents compiled into transactions",
        &["kind"]
    ).unwrap();

    pub static ref COMPILE_FAILURES: CounterVec = register_counter_vec!(
        "batcher_compile_failures_total",
        "Intents that failed to compile",
        &["kind"]
    ).unwrap();

    // Submission metrics
    pub static ref BATCHES_SUBMITTED: CounterVec = register_counter_vec!(
        "batcher_batches_submitted_total",
        "Chain batches handed to the wallet",
        &["chain_id"]
    ).unwrap();

    pub static ref TRANSACTIONS_SUBMITTED: CounterVec = register_counter_vec!(
        "batcher_transactions_submitted_total",
        "Transactions inside submitted batches",
        &["chain_id"]
    ).unwrap();

    pub static ref RECEIPTS: CounterVec = register_counter_vec!(
        "batcher_receipts_total",
        "Batch receipts by outcome",
        &["chain_id", "status"]
    ).unwrap();

    // Run metrics
    pub static ref RUNS: CounterVec = register_counter_vec!(
        "batcher_runs_total",
        "Orchestration runs by outcome",
        &["status"]
    ).unwrap();

    pub static ref RUN_LATENCY: HistogramVec = register_histogram_vec!(
        "batcher_run_duration_seconds",
        "Orchestration run duration",
        &["status"],
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> BatcherResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| BatcherError::Internal(format!("metrics bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| BatcherError::Internal(format!("metrics server: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    render().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))
}

/// Text exposition of every registered metric
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}

// Helper functions to record metrics

pub fn record_switch_requested(chain_id: u64) {
    SWITCH_REQUESTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_switch_confirmed(chain_id: u64, latency_secs: f64) {
    SWITCH_LATENCY
        .with_label_values(&[&chain_id.to_string()])
        .observe(latency_secs);
}

pub fn record_switch_timeout(chain_id: u64) {
    SWITCH_TIMEOUTS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_intent_compiled(kind: &str) {
    INTENTS_COMPILED.with_label_values(&[kind]).inc();
}

pub fn record_compile_failure(kind: &str) {
    COMPILE_FAILURES.with_label_values(&[kind]).inc();
}

pub fn record_batch_submitted(chain_id: u64, transactions: usize) {
    let chain = chain_id.to_string();
    BATCHES_SUBMITTED.with_label_values(&[&chain]).inc();
    TRANSACTIONS_SUBMITTED
        .with_label_values(&[&chain])
        .inc_by(transactions as f64);
}

pub fn record_receipt(chain_id: u64, success: bool) {
    let status = if success { "confirmed" } else { "failed" };
    RECEIPTS
        .with_label_values(&[&chain_id.to_string(), status])
        .inc();
}

pub fn record_run(success: bool, duration_secs: f64) {
    let status = if success { "ok" } else { "failed" };
    RUNS.with_label_values(&[status]).inc();
    RUN_LATENCY.with_label_values(&[status]).observe(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        record_intent_compiled("approval");
        record_receipt(8453, true);

        let text = render().unwrap();
        assert!(text.contains("batcher_intents_compiled_total"));
        assert!(text.contains("kind=\"approval\""));
        assert!(text.contains("batcher_receipts_total"));
    }
}
