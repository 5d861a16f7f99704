//! Chain provider with multi-RPC support and automatic failover

use super::Chain;
use crate::error::{BatcherError, BatcherResult};

use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    chain_id: u64,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ChainProvider {
    /// Create a provider over every endpoint of the chain
    pub fn new(chain: &Chain) -> BatcherResult<Self> {
        let mut http_providers = Vec::new();

        for url in chain.endpoints() {
            match Provider::<Http>::try_from(url) {
                Ok(provider) => {
                    http_providers.push(provider.interval(Duration::from_millis(100)));
                    debug!("Added HTTP provider for chain {}: {}", chain.id(), url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(BatcherError::ChainConnection {
                chain_id: chain.id(),
                message: "No valid RPC providers".to_string(),
            });
        }

        Ok(Self {
            chain_id: chain.id(),
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.chain_id, next);
    }

    /// Read-only contract call with failover; empty return data is passed through
    pub async fn call(&self, to: Address, data: Bytes) -> BatcherResult<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        let mut last_error = None;

        for _ in 0..self.http_providers.len() {
            match self.http().call(&tx, None).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    warn!("eth_call to {:?} on chain {} failed: {}", to, self.chain_id, e);
                    last_error = Some(e.to_string());
                    self.failover();
                }
            }
        }

        Err(BatcherError::ChainConnection {
            chain_id: self.chain_id,
            message: last_error.unwrap_or_else(|| "All providers failed".to_string()),
        })
    }

    /// Get transaction receipt
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> BatcherResult<Option<TransactionReceipt>> {
        self.http()
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| BatcherError::ChainConnection {
                chain_id: self.chain_id,
                message: e.to_string(),
            })
    }
}
