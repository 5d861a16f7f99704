//! Fixtures shared by the coordination tests

use super::compiler::IntentCompiler;
use super::switch::ChainSwitchCoordinator;
use crate::chain::reader::MockChainReader;
use crate::chain::{Chain, ChainRegistry};
use crate::config::{LiquidityConfig, OrchestratorConfig};
use crate::intent::{
    ApprovalIntent, CallData, ChainRef, Quantity, RawCallIntent, TokenAmount, TransactionIntent,
    TransferFromIntent,
};
use crate::liquidity::LiquidityPositionPlanner;
use crate::wallet::testing::FakeWallet;

use ethers::types::Address;
use std::sync::Arc;

pub fn chain(id: u64) -> Chain {
    Chain::new(id, format!("chain-{}", id), vec![format!("https://{}.rpc.example.com", id)])
        .unwrap()
}

pub fn registry() -> Arc<ChainRegistry> {
    Arc::new(ChainRegistry::new([chain(1), chain(10), chain(8453)]).unwrap())
}

/// Short waits so timeout paths finish quickly
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        switch_timeout_ms: 50,
        switch_poll_interval_ms: 5,
        submit_timeout_secs: 1,
        receipt_timeout_secs: 1,
        ..Default::default()
    }
}

pub fn reader_with_decimals(decimals: u8) -> MockChainReader {
    let mut reader = MockChainReader::new();
    reader
        .expect_token_decimals()
        .returning(move |_, _| Ok(Some(decimals)));
    reader
}

pub fn compiler(wallet: Arc<FakeWallet>, reader: MockChainReader) -> IntentCompiler {
    let reader = Arc::new(reader);
    let switcher = Arc::new(ChainSwitchCoordinator::new(wallet, &fast_config()));
    let planner = LiquidityPositionPlanner::new(reader.clone(), &LiquidityConfig::default());
    IntentCompiler::new(registry(), switcher, reader, planner)
}

fn chain_ref(id: u64) -> ChainRef {
    ChainRef { id, rpc: None }
}

pub fn approval(chain_id: u64, amount: &str) -> TransactionIntent {
    TransactionIntent::Approval(ApprovalIntent {
        spender: Address::repeat_byte(0x51),
        amount: TokenAmount::new(amount),
        token_address: Address::repeat_byte(0x70),
        chain: chain_ref(chain_id),
    })
}

pub fn transfer(chain_id: u64, amount: &str) -> TransactionIntent {
    TransactionIntent::TransferFrom(TransferFromIntent {
        from: Address::repeat_byte(0xf1),
        to: Address::repeat_byte(0xf2),
        amount: TokenAmount::new(amount),
        token_address: Address::repeat_byte(0x70),
        chain: chain_ref(chain_id),
    })
}

pub fn raw_call(chain_id: u64, data: &str, gas_price: Option<&str>) -> TransactionIntent {
    TransactionIntent::RawCall(RawCallIntent {
        calldata: CallData {
            data: data.to_string(),
            to: Address::repeat_byte(0xca),
            value: Some(Quantity::new("0")),
            gas_price: gas_price.map(Quantity::new),
            gas_limit: Some(Quantity::new("210000")),
            from: None,
            chain_id: Some(Quantity::new(chain_id.to_string())),
        },
        chain: chain_ref(chain_id),
    })
}
