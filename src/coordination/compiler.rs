//! Intent compilation
//!
//! Each intent is compiled only after the wallet is confirmed on the intent's
//! chain. Encoders may read chain state (token decimals, pool state), so a
//! mismatched active chain would encode against the wrong network.

use super::switch::ChainSwitchCoordinator;
use crate::chain::{Chain, ChainReader, ChainRegistry};
use crate::error::{CompileCause, CompileError, EncodeError};
use crate::intent::{
    ApprovalIntent, IntentKind, Quantity, RawCallIntent, TokenAmount, TransactionIntent,
    TransferFromIntent,
};
use crate::liquidity::LiquidityPositionPlanner;
use crate::metrics;
use crate::tx::{
    build_typed, encode_approve, encode_transfer_from, parse_quantity, CompiledTransaction,
    GasPrice,
};

use ethers::types::{Address, Bytes, TransactionRequest, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where an intent sits in the run's input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentPosition {
    /// Index in the flattened intent sequence
    pub index: usize,
    /// Intent list the intent came from
    pub turn: usize,
}

pub struct IntentCompiler {
    registry: Arc<ChainRegistry>,
    switcher: Arc<ChainSwitchCoordinator>,
    reader: Arc<dyn ChainReader>,
    planner: LiquidityPositionPlanner,
}

impl IntentCompiler {
    pub fn new(
        registry: Arc<ChainRegistry>,
        switcher: Arc<ChainSwitchCoordinator>,
        reader: Arc<dyn ChainReader>,
        planner: LiquidityPositionPlanner,
    ) -> Self {
        Self {
            registry,
            switcher,
            reader,
            planner,
        }
    }

    /// Compile one intent into a chain-native transaction
    pub async fn compile(
        &self,
        position: IntentPosition,
        intent: &TransactionIntent,
    ) -> Result<CompiledTransaction, CompileError> {
        let kind = intent.kind();
        let chain_id = intent.chain_id();

        let result = self.compile_inner(intent).await;
        match &result {
            Ok(_) => {
                debug!(
                    index = position.index,
                    turn = position.turn,
                    chain_id,
                    kind = %kind,
                    "Intent compiled"
                );
                metrics::record_intent_compiled(kind.as_str());
            }
            Err(cause) => {
                warn!(
                    index = position.index,
                    turn = position.turn,
                    chain_id,
                    kind = %kind,
                    error = %cause,
                    "Intent failed to compile"
                );
                metrics::record_compile_failure(kind.as_str());
            }
        }

        result.map_err(|cause| CompileError {
            index: position.index,
            turn: position.turn,
            chain_id,
            kind: kind.as_str(),
            cause,
        })
    }

    async fn compile_inner(
        &self,
        intent: &TransactionIntent,
    ) -> Result<CompiledTransaction, CompileCause> {
        let chain = self.registry.resolve(intent.chain_id())?;

        if let Some(hint) = intent.chain().rpc.as_deref() {
            if !chain.endpoints().any(|e| e == hint) {
                debug!(
                    chain_id = chain.id(),
                    hint,
                    "Ignoring intent RPC hint, registry endpoint wins"
                );
            }
        }

        self.switcher.ensure_active_chain(chain).await?;

        let tx = match intent {
            TransactionIntent::Approval(approval) => self.encode_approval(chain, approval).await?,
            TransactionIntent::TransferFrom(transfer) => {
                self.encode_transfer_from(chain, transfer).await?
            }
            TransactionIntent::RawCall(call) => encode_raw_call(chain, call)?,
            TransactionIntent::LiquidityMint(mint) => self.planner.plan_mint(chain, mint).await?,
        };
        Ok(tx)
    }

    async fn base_units(
        &self,
        chain: &Chain,
        token: Address,
        amount: &TokenAmount,
    ) -> Result<U256, EncodeError> {
        let decimals = self
            .reader
            .token_decimals(chain, token)
            .await?
            .ok_or(EncodeError::DecimalsUnavailable { token })?;

        amount
            .to_base_units(decimals)
            .map_err(|reason| EncodeError::InvalidAmount {
                value: amount.to_string(),
                reason,
            })
    }

    async fn encode_approval(
        &self,
        chain: &Chain,
        approval: &ApprovalIntent,
    ) -> Result<CompiledTransaction, EncodeError> {
        let amount = self
            .base_units(chain, approval.token_address, &approval.amount)
            .await?;

        let request = TransactionRequest::new()
            .to(approval.token_address)
            .data(encode_approve(approval.spender, amount));

        Ok(CompiledTransaction::new(
            chain.id(),
            IntentKind::Approval,
            build_typed(request, None),
        ))
    }

    async fn encode_transfer_from(
        &self,
        chain: &Chain,
        transfer: &TransferFromIntent,
    ) -> Result<CompiledTransaction, EncodeError> {
        let amount = self
            .base_units(chain, transfer.token_address, &transfer.amount)
            .await?;

        let request = TransactionRequest::new()
            .to(transfer.token_address)
            .data(encode_transfer_from(transfer.from, transfer.to, amount));

        Ok(CompiledTransaction::new(
            chain.id(),
            IntentKind::TransferFrom,
            build_typed(request, None),
        ))
    }
}

fn quantity(field: &'static str, value: Option<&Quantity>) -> Result<Option<U256>, EncodeError> {
    value
        .map(|q| {
            parse_quantity(q.as_str()).ok_or_else(|| EncodeError::InvalidQuantity {
                field,
                value: q.as_str().to_string(),
            })
        })
        .transpose()
}

/// Forward prebuilt calldata, bound to the intent's chain
fn encode_raw_call(
    chain: &Chain,
    call: &RawCallIntent,
) -> Result<CompiledTransaction, EncodeError> {
    let calldata = &call.calldata;

    let hex_data = calldata.data.trim();
    let hex_data = hex_data
        .strip_prefix("0x")
        .or_else(|| hex_data.strip_prefix("0X"))
        .unwrap_or(hex_data);
    let data = hex::decode(hex_data).map_err(|e| EncodeError::InvalidHex(e.to_string()))?;

    if let Some(declared) = quantity("chain_id", calldata.chain_id.as_ref())? {
        if declared != U256::from(chain.id()) {
            warn!(
                chain_id = chain.id(),
                declared = %declared,
                "Raw call declares a different chain, using the intent's chain"
            );
        }
    }

    let mut request = TransactionRequest::new()
        .to(calldata.to)
        .data(Bytes::from(data));
    if let Some(value) = quantity("value", calldata.value.as_ref())? {
        request = request.value(value);
    }
    if let Some(gas) = quantity("gas_limit", calldata.gas_limit.as_ref())? {
        request = request.gas(gas);
    }
    if let Some(from) = calldata.from {
        request = request.from(from);
    }
    let gas_price = quantity("gas_price", calldata.gas_price.as_ref())?.map(GasPrice::Legacy);

    info!(
        chain_id = chain.id(),
        to = ?calldata.to,
        legacy = gas_price.is_some(),
        "Raw call attached"
    );

    Ok(CompiledTransaction::new(
        chain.id(),
        IntentKind::RawCall,
        build_typed(request, gas_price),
    ))
}
