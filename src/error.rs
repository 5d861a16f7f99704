//! Error types for the batcher
//!
//! Infrastructure failures (RPC, wallet transport, configuration) are
//! [`BatcherError`]. Each orchestration stage has its own error so callers can
//! tell a chain switch that never landed from a pool that could not be read.

use crate::coordination::ChainReceipt;

use ethers::types::{Address, H256};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Infrastructure error shared by the chain, wallet and config layers
#[derive(Error, Debug)]
pub enum BatcherError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error for chain {chain_id}: {message}")]
    ChainConnection { chain_id: u64, message: String },

    #[error("Chain {chain_id} not found in registry")]
    ChainNotFound { chain_id: u64 },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Wallet RPC {method} failed: {message}")]
    WalletRpc { method: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatcherError {
    /// Check if error is transient and the whole operation may be retried by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, BatcherError::ChainConnection { .. })
    }
}

/// Result type for infrastructure operations
pub type BatcherResult<T> = Result<T, BatcherError>;

/// Failure to bring the wallet onto a target chain
#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Switch to chain {target} not confirmed within {waited:?} (active chain: {active:?})")]
    SwitchTimeout {
        target: u64,
        active: Option<u64>,
        waited: Duration,
    },

    #[error("Wallet failed during switch to chain {target}: {source}")]
    Wallet {
        target: u64,
        #[source]
        source: BatcherError,
    },
}

/// Failure while planning a concentrated-liquidity mint
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Pool address unresolved: {0}")]
    PoolAddressUnresolved(String),

    #[error("Pool state unavailable for {pool:?}: {field} query returned nothing")]
    PoolStateUnavailable { pool: Address, field: &'static str },

    #[error("Position unconstructable: {0}")]
    PositionUnconstructable(String),

    #[error("Calldata encoding failed: {0}")]
    CalldataEncodingFailed(String),

    #[error("Invalid amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error(transparent)]
    Chain(#[from] BatcherError),
}

/// Failure while encoding an ERC-20 or raw call intent
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Invalid amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("Invalid {field} quantity {value:?}")]
    InvalidQuantity { field: &'static str, value: String },

    #[error("Invalid calldata hex: {0}")]
    InvalidHex(String),

    #[error("Token {token:?} did not report decimals")]
    DecimalsUnavailable { token: Address },

    #[error(transparent)]
    Chain(#[from] BatcherError),
}

/// Underlying cause of a per-intent compile failure
#[derive(Error, Debug)]
pub enum CompileCause {
    #[error(transparent)]
    Switch(#[from] SwitchError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Chain(#[from] BatcherError),
}

/// A single intent failed to compile
#[derive(Error, Debug)]
#[error("Intent #{index} ({kind}, turn {turn}) on chain {chain_id} failed to compile: {cause}")]
pub struct CompileError {
    /// Position in the flattened intent sequence
    pub index: usize,
    /// Which intent list (upstream turn) the intent came from
    pub turn: usize,
    pub chain_id: u64,
    pub kind: &'static str,
    #[source]
    pub cause: CompileCause,
}

impl CompileError {
    /// Switch failures mean the wallet cannot be trusted for anything that follows
    pub fn is_switch_failure(&self) -> bool {
        matches!(self.cause, CompileCause::Switch(_))
    }
}

/// Where a chain group's submission stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Switch,
    Submit,
    Receipt,
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionStage::Switch => "switch",
            SubmissionStage::Submit => "submit",
            SubmissionStage::Receipt => "receipt",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum SubmissionCause {
    #[error(transparent)]
    Switch(#[from] SwitchError),

    #[error(transparent)]
    Wallet(#[from] BatcherError),

    #[error("Batch submission not acknowledged within {0:?}")]
    SubmitTimeout(Duration),

    #[error("Receipt for {transaction_hash:?} not available within {after:?}")]
    ReceiptTimeout { transaction_hash: H256, after: Duration },

    #[error("Wallet returned no receipt for {0:?}")]
    ReceiptMissing(H256),

    #[error("Batch transaction {0:?} reverted")]
    Reverted(H256),
}

/// A chain group failed; earlier groups already landed and are not rolled back
#[derive(Error, Debug)]
#[error("Submission to chain {chain_id} failed at {stage} stage ({} chain(s) already confirmed): {cause}", confirmed.len())]
pub struct SubmissionError {
    pub chain_id: u64,
    pub stage: SubmissionStage,
    #[source]
    pub cause: SubmissionCause,
    /// Receipts of chain groups confirmed before the failure
    pub confirmed: Vec<ChainReceipt>,
    /// Chain groups never attempted
    pub not_attempted: Vec<u64>,
}

/// Terminal error of one orchestration run
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl OrchestratorError {
    /// Failing stage: switch / compile / submit / receipt
    pub fn stage(&self) -> &'static str {
        match self {
            OrchestratorError::Compile(e) if e.is_switch_failure() => "switch",
            OrchestratorError::Compile(_) => "compile",
            OrchestratorError::Submission(e) => match e.stage {
                SubmissionStage::Switch => "switch",
                SubmissionStage::Submit => "submit",
                SubmissionStage::Receipt => "receipt",
            },
        }
    }

    /// Chain the run failed on
    pub fn chain_id(&self) -> u64 {
        match self {
            OrchestratorError::Compile(e) => e.chain_id,
            OrchestratorError::Submission(e) => e.chain_id,
        }
    }

    /// Whether rerunning the remaining intents is safe and may succeed.
    /// Nothing is retried automatically; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestratorError::Compile(e) => match &e.cause {
                CompileCause::Switch(SwitchError::SwitchTimeout { .. }) => true,
                CompileCause::Chain(b)
                | CompileCause::Plan(PlanError::Chain(b))
                | CompileCause::Encode(EncodeError::Chain(b)) => b.is_retryable(),
                _ => false,
            },
            // once a batch is handed to the wallet it may land, so only
            // failures before submission are safe to repeat
            OrchestratorError::Submission(e) => {
                e.stage == SubmissionStage::Switch
                    && matches!(e.cause, SubmissionCause::Switch(SwitchError::SwitchTimeout { .. }))
            }
        }
    }

    /// On-chain effects that already happened and must be disclosed
    pub fn confirmed(&self) -> &[ChainReceipt] {
        match self {
            OrchestratorError::Compile(_) => &[],
            OrchestratorError::Submission(e) => &e.confirmed,
        }
    }
}
