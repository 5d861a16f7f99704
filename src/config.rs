//! Configuration management for the batcher
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub liquidity: LiquidityConfig,
    pub wallet: WalletConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub switch_timeout_ms: u64,
    pub switch_poll_interval_ms: u64,
    pub submit_timeout_secs: u64,
    pub receipt_timeout_secs: u64,
    pub compile_failure: CompileFailurePolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            switch_timeout_ms: 5_000,
            switch_poll_interval_ms: 100,
            submit_timeout_secs: 120,
            receipt_timeout_secs: 300,
            compile_failure: CompileFailurePolicy::Abort,
        }
    }
}

impl OrchestratorConfig {
    pub fn switch_timeout(&self) -> Duration {
        Duration::from_millis(self.switch_timeout_ms)
    }

    pub fn switch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.switch_poll_interval_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

/// What to do when one intent fails to encode
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompileFailurePolicy {
    /// Fail the whole run on the first compile error
    #[default]
    Abort,
    /// Drop the offending intent and keep going; chain switch failures still abort
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiquidityConfig {
    pub deadline_secs: u64,
    pub slippage_bps: u32,
    pub max_fee_gwei: u64,
    pub priority_fee_gwei: u64,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 1_200,
            slippage_bps: 50,
            max_fee_gwei: 100,
            priority_fee_gwei: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the wallet bridge (EIP-1193 methods over HTTP)
    pub rpc_url: String,
    #[serde(default = "default_wallet_poll_ms")]
    pub poll_interval_ms: u64,
}

fn default_wallet_poll_ms() -> u64 {
    1_000
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_urls: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Settings {
    /// Load settings from the file named by `BATCHER_CONFIG`, or `config/default.toml`
    pub fn load() -> Result<Self> {
        let config_path = env::var("BATCHER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        let mut seen = HashSet::new();
        for (name, chain) in self.enabled_chains() {
            if chain.rpc_urls.iter().all(|u| u.trim().is_empty()) {
                anyhow::bail!("Chain {} has no RPC URLs configured", name);
            }
            if !seen.insert(chain.chain_id) {
                anyhow::bail!("Chain id {} is configured more than once", chain.chain_id);
            }
        }

        if self.wallet.rpc_url.trim().is_empty() {
            anyhow::bail!("wallet.rpc_url must be set");
        }

        let o = &self.orchestrator;
        if o.switch_timeout_ms == 0 || o.switch_poll_interval_ms == 0 {
            anyhow::bail!("Chain switch timeout and poll interval must be non-zero");
        }
        if o.submit_timeout_secs == 0 || o.receipt_timeout_secs == 0 {
            anyhow::bail!("Submission and receipt timeouts must be non-zero");
        }

        if self.liquidity.slippage_bps >= 10_000 {
            anyhow::bail!(
                "liquidity.slippage_bps must be below 10000, got {}",
                self.liquidity.slippage_bps
            );
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    ENV_VAR
        .replace_all(input, |cap: &regex::Captures| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}
