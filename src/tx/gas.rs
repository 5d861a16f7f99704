//! Gas pricing policy and quantity parsing

use crate::config::LiquidityConfig;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Eip1559TransactionRequest, TransactionRequest, U256};

const GWEI: u64 = 1_000_000_000;

/// Gas price types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPrice {
    Legacy(U256),
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

/// Fixed fee ceiling attached to planner-built transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl FeePolicy {
    pub fn from_gwei(max_fee_gwei: u64, priority_fee_gwei: u64) -> Self {
        Self {
            max_fee_per_gas: U256::from(max_fee_gwei) * U256::from(GWEI),
            max_priority_fee_per_gas: U256::from(priority_fee_gwei) * U256::from(GWEI),
        }
    }

    pub fn from_config(config: &LiquidityConfig) -> Self {
        Self::from_gwei(config.max_fee_gwei, config.priority_fee_gwei)
    }

    pub fn gas_price(&self) -> GasPrice {
        GasPrice::Eip1559 {
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
        }
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self::from_gwei(100, 2)
    }
}

/// Build a typed transaction, legacy or EIP-1559 depending on the price given.
/// Without a price the wallet fills in its own fees.
pub fn build_typed(request: TransactionRequest, gas_price: Option<GasPrice>) -> TypedTransaction {
    match gas_price {
        Some(GasPrice::Legacy(price)) => TypedTransaction::Legacy(request.gas_price(price)),
        Some(GasPrice::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }) => {
            let mut tx = Eip1559TransactionRequest::new()
                .max_fee_per_gas(max_fee_per_gas)
                .max_priority_fee_per_gas(max_priority_fee_per_gas);
            tx.from = request.from;
            tx.to = request.to;
            tx.gas = request.gas;
            tx.value = request.value;
            tx.data = request.data;
            tx.nonce = request.nonce;
            TypedTransaction::Eip1559(tx)
        }
        None => {
            let mut tx = Eip1559TransactionRequest::new();
            tx.from = request.from;
            tx.to = request.to;
            tx.gas = request.gas;
            tx.value = request.value;
            tx.data = request.data;
            TypedTransaction::Eip1559(tx)
        }
    }
}

/// Parse a `0x` hex or decimal quantity
pub fn parse_quantity(value: &str) -> Option<U256> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        if hex.is_empty() {
            return Some(U256::zero());
        }
        U256::from_str_radix(hex, 16).ok()
    } else if value.is_empty() {
        None
    } else {
        U256::from_dec_str(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    #[test]
    fn test_default_policy_is_100_and_2_gwei() {
        let policy = FeePolicy::default();
        assert_eq!(policy.max_fee_per_gas, U256::from(100_000_000_000u64));
        assert_eq!(policy.max_priority_fee_per_gas, U256::from(2_000_000_000u64));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x3b9aca00"), Some(U256::from(1_000_000_000u64)));
        assert_eq!(parse_quantity("210000"), Some(U256::from(210_000u64)));
        assert_eq!(parse_quantity("0x"), Some(U256::zero()));
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("12ab"), None);
    }

    #[test]
    fn test_build_typed_variants() {
        let req = TransactionRequest::new().to(Address::repeat_byte(1)).value(5u64);

        let legacy = build_typed(req.clone(), Some(GasPrice::Legacy(U256::from(7u64))));
        assert!(matches!(legacy, TypedTransaction::Legacy(_)));
        assert_eq!(legacy.gas_price(), Some(U256::from(7u64)));

        let eip1559 = build_typed(req, Some(FeePolicy::default().gas_price()));
        match eip1559 {
            TypedTransaction::Eip1559(tx) => {
                assert_eq!(tx.max_fee_per_gas, Some(U256::from(100_000_000_000u64)));
                assert_eq!(tx.value, Some(U256::from(5u64)));
            }
            other => panic!("expected eip1559, got {:?}", other),
        }
    }
}
