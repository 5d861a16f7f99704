//! Chain module - static chain registry and read access to chain state
//!
//! This module provides:
//! - The process-wide registry from chain id to RPC endpoints
//! - Multi-RPC provider management with automatic failover
//! - Live pool and token reads used while compiling intents

pub mod provider;
pub mod reader;

pub use provider::ChainProvider;
pub use reader::{ChainReader, RpcChainReader, Slot0};

use crate::config::Settings;
use crate::error::{BatcherError, BatcherResult};

use std::collections::HashMap;
use tracing::info;

/// An identified network plus its RPC access points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    id: u64,
    name: String,
    rpc_endpoint: String,
    fallback_endpoints: Vec<String>,
}

impl Chain {
    /// Build a chain record; the first endpoint is primary, the rest are failover
    pub fn new(
        id: u64,
        name: impl Into<String>,
        endpoints: impl IntoIterator<Item = String>,
    ) -> BatcherResult<Self> {
        if id == 0 {
            return Err(BatcherError::Config("chain id must be non-zero".to_string()));
        }

        let mut endpoints = endpoints
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        let rpc_endpoint = endpoints.next().ok_or_else(|| {
            BatcherError::Config(format!("chain {} has no RPC endpoint", id))
        })?;
        let fallback_endpoints: Vec<String> = endpoints.collect();

        for url in std::iter::once(&rpc_endpoint).chain(fallback_endpoints.iter()) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(BatcherError::Config(format!(
                    "chain {} endpoint {:?} is not an http(s) URL",
                    id, url
                )));
            }
        }

        Ok(Self {
            id,
            name: name.into(),
            rpc_endpoint,
            fallback_endpoints,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rpc_endpoint(&self) -> &str {
        &self.rpc_endpoint
    }

    /// Primary endpoint followed by failover endpoints
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.rpc_endpoint.as_str())
            .chain(self.fallback_endpoints.iter().map(String::as_str))
    }
}

/// Static lookup from chain id to chain record, fixed at startup
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<u64, Chain>,
}

impl ChainRegistry {
    pub fn new(chains: impl IntoIterator<Item = Chain>) -> BatcherResult<Self> {
        let mut map = HashMap::new();
        for chain in chains {
            let id = chain.id();
            if map.insert(id, chain).is_some() {
                return Err(BatcherError::Config(format!(
                    "chain {} registered more than once",
                    id
                )));
            }
        }
        Ok(Self { chains: map })
    }

    /// Build the registry from every enabled chain in the settings
    pub fn from_settings(settings: &Settings) -> BatcherResult<Self> {
        let chains = settings
            .enabled_chains()
            .into_iter()
            .map(|(_, c)| Chain::new(c.chain_id, c.name.clone(), c.rpc_urls.clone()))
            .collect::<BatcherResult<Vec<_>>>()?;

        let registry = Self::new(chains)?;
        info!(chains = registry.len(), "Chain registry loaded");
        Ok(registry)
    }

    pub fn resolve(&self, chain_id: u64) -> BatcherResult<&Chain> {
        self.chains
            .get(&chain_id)
            .ok_or(BatcherError::ChainNotFound { chain_id })
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
