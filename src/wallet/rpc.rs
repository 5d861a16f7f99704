//! EIP-1193 wallet bridge over JSON-RPC
//!
//! Batches go through EIP-5792 `wallet_sendCalls` with `atomicRequired`, so the
//! bridge (smart account, 7702 delegate, ...) decides how atomicity is achieved.

use super::{Account, Receipt, SubmittedBatch, Wallet};
use crate::chain::{Chain, ChainProvider};
use crate::config::WalletConfig;
use crate::error::{BatcherError, BatcherResult};
use crate::tx::CompiledTransaction;

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::providers::{Http, JsonRpcClient, Provider, ProviderError, RpcError};
use ethers::types::{Address, H256, U256};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// `wallet_switchEthereumChain` error code for a chain the wallet does not know
const UNRECOGNIZED_CHAIN: i64 = 4902;

pub struct RpcWallet<C = Http> {
    provider: Provider<C>,
    poll_interval: Duration,
    /// Receipt lookups go to the chain's own RPC, not the wallet bridge
    chain_providers: DashMap<u64, Arc<ChainProvider>>,
}

impl RpcWallet<Http> {
    pub fn new(config: &WalletConfig) -> BatcherResult<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| BatcherError::Config(format!("invalid wallet rpc_url: {}", e)))?;

        Ok(Self::with_provider(
            provider,
            Duration::from_millis(config.poll_interval_ms),
        ))
    }
}

impl<C: JsonRpcClient> RpcWallet<C> {
    pub fn with_provider(provider: Provider<C>, poll_interval: Duration) -> Self {
        Self {
            provider,
            poll_interval,
            chain_providers: DashMap::new(),
        }
    }

    async fn request<P, R>(&self, method: &'static str, params: P) -> BatcherResult<R>
    where
        P: serde::Serialize + std::fmt::Debug + Send + Sync,
        R: serde::Serialize + serde::de::DeserializeOwned + std::fmt::Debug + Send,
    {
        self.provider
            .request(method, params)
            .await
            .map_err(|e| rpc_error(method, &e))
    }

    fn chain_provider(&self, chain: &Chain) -> BatcherResult<Arc<ChainProvider>> {
        if let Some(p) = self.chain_providers.get(&chain.id()) {
            return Ok(p.clone());
        }
        let provider = Arc::new(ChainProvider::new(chain)?);
        self.chain_providers.insert(chain.id(), provider.clone());
        Ok(provider)
    }

    async fn add_chain(&self, chain: &Chain) -> BatcherResult<()> {
        let params = json!([{
            "chainId": hex_chain_id(chain.id()),
            "chainName": chain.name(),
            "rpcUrls": chain.endpoints().collect::<Vec<_>>(),
        }]);
        let _: Value = self.request("wallet_addEthereumChain", params).await?;
        info!(chain_id = chain.id(), "Chain added to wallet");
        Ok(())
    }

    /// Poll `wallet_getCallsStatus` until the bundle is final
    async fn await_bundle(&self, bundle_id: &str) -> BatcherResult<H256> {
        loop {
            let status: Value = self
                .request("wallet_getCallsStatus", json!([bundle_id]))
                .await?;

            match bundle_state(&status) {
                BundleState::Pending => {
                    debug!(bundle_id, "Call bundle pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
                BundleState::Failed(code) => {
                    return Err(BatcherError::WalletRpc {
                        method: "wallet_getCallsStatus",
                        message: format!("bundle {} failed with status {}", bundle_id, code),
                    });
                }
                BundleState::Included => {
                    return last_receipt_hash(&status).ok_or_else(|| BatcherError::WalletRpc {
                        method: "wallet_getCallsStatus",
                        message: format!("bundle {} has no receipts", bundle_id),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl<C: JsonRpcClient + 'static> Wallet for RpcWallet<C> {
    async fn account(&self) -> BatcherResult<Option<Account>> {
        let accounts: Vec<Address> = self.request("eth_accounts", ()).await?;
        accounts.into_iter().next().map(Account::new).transpose()
    }

    async fn active_chain_id(&self) -> BatcherResult<Option<u64>> {
        let id: U256 = self.request("eth_chainId", ()).await?;
        Ok(Some(id.low_u64()))
    }

    async fn request_switch(&self, chain: &Chain) -> BatcherResult<()> {
        let params = json!([{ "chainId": hex_chain_id(chain.id()) }]);
        let result: Result<Value, ProviderError> = self
            .provider
            .request("wallet_switchEthereumChain", params.clone())
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if error_code(&e) == Some(UNRECOGNIZED_CHAIN) => {
                warn!(chain_id = chain.id(), "Wallet does not know chain, adding it");
                self.add_chain(chain).await?;
                let _: Value = self.request("wallet_switchEthereumChain", params).await?;
                Ok(())
            }
            Err(e) => Err(rpc_error("wallet_switchEthereumChain", &e)),
        }
    }

    async fn send_batch(
        &self,
        chain: &Chain,
        transactions: &[CompiledTransaction],
        account: &Account,
    ) -> BatcherResult<SubmittedBatch> {
        let calls: Vec<Value> = transactions
            .iter()
            .map(|t| {
                let tx = t.transaction();
                json!({
                    "to": tx.to_addr(),
                    "data": tx.data().cloned().unwrap_or_default(),
                    "value": tx.value().cloned().unwrap_or_default(),
                })
            })
            .collect();

        let params = json!([{
            "version": "2.0.0",
            "chainId": hex_chain_id(chain.id()),
            "from": account.address(),
            "atomicRequired": true,
            "calls": calls,
        }]);

        let response: Value = self.request("wallet_sendCalls", params).await?;
        let bundle_id = match &response {
            Value::String(id) => id.clone(),
            other => other
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| BatcherError::WalletRpc {
                    method: "wallet_sendCalls",
                    message: format!("unexpected response {}", other),
                })?,
        };

        info!(
            chain_id = chain.id(),
            bundle_id = %bundle_id,
            calls = transactions.len(),
            "Call bundle accepted"
        );

        let transaction_hash = self.await_bundle(&bundle_id).await?;
        Ok(SubmittedBatch {
            chain_id: chain.id(),
            transaction_hash,
        })
    }

    async fn wait_for_receipt(
        &self,
        chain: &Chain,
        transaction_hash: H256,
    ) -> BatcherResult<Option<Receipt>> {
        let provider = self.chain_provider(chain)?;
        loop {
            if let Some(receipt) = provider.get_transaction_receipt(transaction_hash).await? {
                return Ok(Some(Receipt {
                    transaction_hash,
                    block_number: receipt.block_number.map(|b| b.as_u64()),
                    success: receipt.status == Some(1u64.into()),
                }));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn hex_chain_id(chain_id: u64) -> String {
    format!("0x{:x}", chain_id)
}

fn error_code(e: &ProviderError) -> Option<i64> {
    e.as_error_response().map(|r| r.code)
}

fn rpc_error(method: &'static str, e: &ProviderError) -> BatcherError {
    BatcherError::WalletRpc {
        method,
        message: e.to_string(),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum BundleState {
    Pending,
    Included,
    Failed(String),
}

/// EIP-5792 v2 reports numeric codes (1xx pending, 2xx confirmed); v1 used strings
fn bundle_state(status: &Value) -> BundleState {
    match status.get("status") {
        Some(Value::Number(n)) => match n.as_u64().unwrap_or(0) {
            100..=199 => BundleState::Pending,
            200..=299 => BundleState::Included,
            code => BundleState::Failed(code.to_string()),
        },
        Some(Value::String(s)) if s.eq_ignore_ascii_case("PENDING") => BundleState::Pending,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("CONFIRMED") => BundleState::Included,
        Some(other) => BundleState::Failed(other.to_string()),
        None => BundleState::Pending,
    }
}

fn last_receipt_hash(status: &Value) -> Option<H256> {
    status
        .get("receipts")?
        .as_array()?
        .last()?
        .get("transactionHash")?
        .as_str()?
        .parse()
        .ok()
}
