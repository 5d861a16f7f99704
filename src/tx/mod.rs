//! Chain-native transactions produced from intents

mod erc20;
mod gas;

pub use erc20::{
    decode_approve, decode_transfer_from, encode_approve, encode_transfer_from, APPROVE_SELECTOR,
    TRANSFER_FROM_SELECTOR,
};
pub use gas::{build_typed, parse_quantity, FeePolicy, GasPrice};

use crate::intent::IntentKind;

use ethers::types::transaction::eip2718::TypedTransaction;

/// A ready-to-sign transaction plus the chain it must be sent on
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTransaction {
    chain_id: u64,
    kind: IntentKind,
    tx: TypedTransaction,
}

impl CompiledTransaction {
    pub fn new(chain_id: u64, kind: IntentKind, mut tx: TypedTransaction) -> Self {
        tx.set_chain_id(chain_id);
        Self { chain_id, kind, tx }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn kind(&self) -> IntentKind {
        self.kind
    }

    pub fn transaction(&self) -> &TypedTransaction {
        &self.tx
    }
}
