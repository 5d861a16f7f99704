//! Wallet capability
//!
//! The batcher never holds keys. It asks a connected wallet which account and
//! chain are active, requests chain switches, hands over batches and waits for
//! receipts. [`RpcWallet`] speaks to any wallet bridge exposing the EIP-1193
//! methods over JSON-RPC.

mod rpc;

pub use rpc::RpcWallet;

use crate::chain::Chain;
use crate::error::{BatcherError, BatcherResult};
use crate::tx::CompiledTransaction;

use async_trait::async_trait;
use ethers::types::{Address, H256};

/// The signing account exposed by the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    address: Address,
}

impl Account {
    pub fn new(address: Address) -> BatcherResult<Self> {
        if address.is_zero() {
            return Err(BatcherError::Wallet("account address is zero".to_string()));
        }
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

/// Acknowledgement of a batch handed to the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedBatch {
    pub chain_id: u64,
    pub transaction_hash: H256,
}

/// Inclusion record for a submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: H256,
    pub block_number: Option<u64>,
    pub success: bool,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Connected account, `None` when no wallet is connected
    async fn account(&self) -> BatcherResult<Option<Account>>;

    /// Chain the wallet is currently on
    async fn active_chain_id(&self) -> BatcherResult<Option<u64>>;

    /// Ask the wallet to move to `chain`; completion is observed via [`Wallet::active_chain_id`]
    async fn request_switch(&self, chain: &Chain) -> BatcherResult<()>;

    /// Submit an ordered batch as one atomic submission
    async fn send_batch(
        &self,
        chain: &Chain,
        transactions: &[CompiledTransaction],
        account: &Account,
    ) -> BatcherResult<SubmittedBatch>;

    /// Suspend until the receipt for `transaction_hash` is available
    async fn wait_for_receipt(
        &self,
        chain: &Chain,
        transaction_hash: H256,
    ) -> BatcherResult<Option<Receipt>>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory wallet for exercising the coordination layer

    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct State {
        active: Option<u64>,
        switch_requests: Vec<u64>,
        batches: Vec<(u64, usize)>,
    }

    pub struct FakeWallet {
        account: Option<Account>,
        /// Chains the wallet refuses to actually move to
        stuck_on: HashSet<u64>,
        fail_send_on: HashSet<u64>,
        revert_on: HashSet<u64>,
        /// How long `request_switch` blocks before answering
        switch_delay: Option<Duration>,
        state: Mutex<State>,
    }

    impl FakeWallet {
        pub fn connected(active: u64) -> Self {
            let account = Account::new(Address::repeat_byte(0xaa)).unwrap();
            Self {
                account: Some(account),
                stuck_on: HashSet::new(),
                fail_send_on: HashSet::new(),
                revert_on: HashSet::new(),
                switch_delay: None,
                state: Mutex::new(State {
                    active: Some(active),
                    ..Default::default()
                }),
            }
        }

        pub fn disconnected() -> Self {
            let mut w = Self::connected(1);
            w.account = None;
            w
        }

        pub fn never_switches_to(mut self, chain_id: u64) -> Self {
            self.stuck_on.insert(chain_id);
            self
        }

        /// Holds every switch request open, as a wallet waiting on its user does
        pub fn stalls_switch_for(mut self, delay: Duration) -> Self {
            self.switch_delay = Some(delay);
            self
        }

        pub fn fails_send_on(mut self, chain_id: u64) -> Self {
            self.fail_send_on.insert(chain_id);
            self
        }

        pub fn reverts_on(mut self, chain_id: u64) -> Self {
            self.revert_on.insert(chain_id);
            self
        }

        pub fn switch_requests(&self) -> Vec<u64> {
            self.state.lock().unwrap().switch_requests.clone()
        }

        /// (chain id, transaction count) per submitted batch
        pub fn batches(&self) -> Vec<(u64, usize)> {
            self.state.lock().unwrap().batches.clone()
        }

    }

    #[async_trait]
    impl Wallet for FakeWallet {
        async fn account(&self) -> BatcherResult<Option<Account>> {
            Ok(self.account)
        }

        async fn active_chain_id(&self) -> BatcherResult<Option<u64>> {
            Ok(self.state.lock().unwrap().active)
        }

        async fn request_switch(&self, chain: &Chain) -> BatcherResult<()> {
            self.state.lock().unwrap().switch_requests.push(chain.id());
            if let Some(delay) = self.switch_delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock().unwrap();
            if !self.stuck_on.contains(&chain.id()) {
                state.active = Some(chain.id());
            }
            Ok(())
        }

        async fn send_batch(
            &self,
            chain: &Chain,
            transactions: &[CompiledTransaction],
            _account: &Account,
        ) -> BatcherResult<SubmittedBatch> {
            if self.fail_send_on.contains(&chain.id()) {
                return Err(BatcherError::Wallet("user rejected".to_string()));
            }
            let mut state = self.state.lock().unwrap();
            state.batches.push((chain.id(), transactions.len()));
            Ok(SubmittedBatch {
                chain_id: chain.id(),
                transaction_hash: H256::from_low_u64_be(chain.id()),
            })
        }

        async fn wait_for_receipt(
            &self,
            chain: &Chain,
            transaction_hash: H256,
        ) -> BatcherResult<Option<Receipt>> {
            Ok(Some(Receipt {
                transaction_hash,
                block_number: Some(100),
                success: !self.revert_on.contains(&chain.id()),
            }))
        }
    }
}
