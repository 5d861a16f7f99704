//! Transaction intents as delivered by the upstream prompt service
//!
//! The wire shape is `{"type": "...", "data": {...}}` per intent and
//! `ChatDataParams` per turn. Every intent names its own chain.

use crate::liquidity::FeeTier;

use ethers::types::Address;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Chain reference embedded in an intent; resolved against the registry by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRef {
    pub id: u64,
    /// Upstream hint only. The registry's endpoint is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc: Option<String>,
}

/// 2^53, the first integer an f64 cannot tell apart from its neighbour
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Decimal amount in token-natural units ("1.5" USDC), scaled by the encoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TokenAmount(String);

impl TokenAmount {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scale to base units with `decimals` fractional digits
    pub fn to_base_units(&self, decimals: u8) -> Result<ethers::types::U256, String> {
        let value = self.0.trim();
        if value.is_empty() {
            return Err("empty amount".to_string());
        }
        if value.starts_with('-') {
            return Err("negative amount".to_string());
        }
        // parse_units drops digits past `decimals`, which would change the amount
        if let Some((_, fraction)) = value.split_once('.') {
            let excess = fraction.get(decimals as usize..).unwrap_or("");
            if excess.chars().any(|c| c != '0') {
                return Err(format!(
                    "more than {} fractional digits for this token",
                    decimals
                ));
            }
        }
        ethers::utils::parse_units(value, decimals as u32)
            .map(Into::into)
            .map_err(|e| e.to_string())
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(u64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => TokenAmount(s),
            Raw::Int(n) => TokenAmount(n.to_string()),
            // past 2^53 a JSON number has already lost digits in f64
            Raw::Float(f) if f.abs() >= MAX_EXACT_FLOAT => {
                return Err(de::Error::custom(format!(
                    "amount {} is too large for a JSON number, send it as a string",
                    f
                )))
            }
            Raw::Float(f) => TokenAmount(f.to_string()),
        })
    }
}

/// Hex or decimal quantity as sent by upstream call builders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Quantity(String);

impl Quantity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Quantity(s),
            Raw::Int(n) => Quantity(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalIntent {
    pub spender: Address,
    pub amount: TokenAmount,
    pub token_address: Address,
    pub chain: ChainRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFromIntent {
    pub from: Address,
    pub to: Address,
    pub amount: TokenAmount,
    pub token_address: Address,
    pub chain: ChainRef,
}

/// Prebuilt call forwarded untouched apart from its chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallData {
    pub data: String,
    pub to: Address,
    #[serde(default)]
    pub value: Option<Quantity>,
    #[serde(default, alias = "gasPrice")]
    pub gas_price: Option<Quantity>,
    #[serde(default, alias = "gasLimit")]
    pub gas_limit: Option<Quantity>,
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default, alias = "chainId")]
    pub chain_id: Option<Quantity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCallIntent {
    pub calldata: CallData,
    pub chain: ChainRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityMintIntent {
    /// Pool factory the pool address is derived from (`pool_address` on the wire)
    #[serde(rename = "pool_address", alias = "factory_address")]
    pub factory_address: Address,
    /// Nonfungible position manager the mint is sent to
    pub npm_address: Address,
    #[serde(alias = "token_address_a")]
    pub token_a: Address,
    #[serde(alias = "token_address_b")]
    pub token_b: Address,
    pub decimals_a: u8,
    pub decimals_b: u8,
    pub amount_a: TokenAmount,
    pub amount_b: TokenAmount,
    #[serde(alias = "fee_amount")]
    pub fee_tier: FeeTier,
    pub from_address: Address,
    pub chain: ChainRef,
}

/// A caller-declared on-chain action before encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TransactionIntent {
    #[serde(rename = "approval")]
    Approval(ApprovalIntent),
    #[serde(rename = "transferFrom")]
    TransferFrom(TransferFromIntent),
    #[serde(rename = "calldata")]
    RawCall(RawCallIntent),
    #[serde(rename = "custom.uniswap_pool")]
    LiquidityMint(LiquidityMintIntent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Approval,
    TransferFrom,
    RawCall,
    LiquidityMint,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Approval => "approval",
            IntentKind::TransferFrom => "transfer_from",
            IntentKind::RawCall => "raw_call",
            IntentKind::LiquidityMint => "liquidity_mint",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransactionIntent {
    pub fn chain(&self) -> &ChainRef {
        match self {
            TransactionIntent::Approval(i) => &i.chain,
            TransactionIntent::TransferFrom(i) => &i.chain,
            TransactionIntent::RawCall(i) => &i.chain,
            TransactionIntent::LiquidityMint(i) => &i.chain,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain().id
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            TransactionIntent::Approval(_) => IntentKind::Approval,
            TransactionIntent::TransferFrom(_) => IntentKind::TransferFrom,
            TransactionIntent::RawCall(_) => IntentKind::RawCall,
            TransactionIntent::LiquidityMint(_) => IntentKind::LiquidityMint,
        }
    }
}

/// One upstream turn. Only `transactions_data` drives aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDataParams {
    #[serde(default)]
    pub id: Option<String>,
    /// Carried for diagnostics; grouping uses each intent's own chain
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(alias = "transaction_data")]
    pub transactions_data: Vec<TransactionIntent>,
}

/// Parse a payload holding either one turn or an array of turns
pub fn parse_turns(json: &str) -> serde_json::Result<Vec<ChatDataParams>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<ChatDataParams>),
        One(ChatDataParams),
    }

    Ok(match serde_json::from_str(json)? {
        OneOrMany::Many(turns) => turns,
        OneOrMany::One(turn) => vec![turn],
    })
}

/// The intent lists of a sequence of turns, in order
pub fn intent_lists(turns: &[ChatDataParams]) -> Vec<Vec<TransactionIntent>> {
    turns.iter().map(|t| t.transactions_data.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TURN: &str = r#"{
        "id": "turn-1",
        "chain_id": 1,
        "ui_data": {"component_id": "fungi.tokenTransfer"},
        "transactions_data": [
            {
                "type": "approval",
                "data": {
                    "spender": "0x1111111111111111111111111111111111111111",
                    "amount": 1.5,
                    "token_address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                    "chain": {"id": 1, "rpc": "https://1.rpc.thirdweb.com"}
                }
            },
            {
                "type": "calldata",
                "data": {
                    "calldata": {
                        "data": "0xdeadbeef",
                        "to": "0x2222222222222222222222222222222222222222",
                        "value": "0",
                        "gasPrice": "0x3b9aca00",
                        "gasLimit": "210000",
                        "from": "0x3333333333333333333333333333333333333333",
                        "chainId": "8453"
                    },
                    "chain": {"id": 8453, "rpc": "https://8453.rpc.thirdweb.com"}
                }
            },
            {
                "type": "custom.uniswap_pool",
                "data": {
                    "chain": {"id": 1, "rpc": "https://1.rpc.thirdweb.com"},
                    "fee_amount": "MEDIUM",
                    "amount_a": "100",
                    "amount_b": "0.05",
                    "pool_address": "0x1F98431c8aD98523631AE4a59f267346ea31F984",
                    "npm_address": "0xC36442b4a4522E871399CD717aBDD847Ab11FE88",
                    "decimals_a": 6,
                    "decimals_b": 18,
                    "token_address_a": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                    "token_address_b": "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
                    "from_address": "0x3333333333333333333333333333333333333333"
                }
            }
        ]
    }"#;

    #[test]
    fn test_parses_upstream_turn() {
        let turns = parse_turns(TURN).unwrap();
        assert_eq!(turns.len(), 1);

        let intents = &turns[0].transactions_data;
        assert_eq!(intents.len(), 3);
        assert_eq!(intents[0].kind(), IntentKind::Approval);
        assert_eq!(intents[1].kind(), IntentKind::RawCall);
        assert_eq!(intents[1].chain_id(), 8453);
        assert_eq!(intents[2].kind(), IntentKind::LiquidityMint);

        match &intents[0] {
            TransactionIntent::Approval(a) => assert_eq!(a.amount.as_str(), "1.5"),
            other => panic!("unexpected intent {:?}", other),
        }
        match &intents[2] {
            TransactionIntent::LiquidityMint(m) => {
                assert_eq!(m.fee_tier, FeeTier::Medium);
                assert_eq!(m.decimals_a, 6);
            }
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[test]
    fn test_parses_array_of_turns() {
        let json = format!("[{}, {}]", TURN, TURN);
        let turns = parse_turns(&json).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(intent_lists(&turns).concat().len(), 6);
    }

    #[test]
    fn test_rejects_unknown_intent_type() {
        let json = r#"{"transactions_data": [{"type": "bridge", "data": {}}]}"#;
        assert!(parse_turns(json).is_err());
    }

    #[test]
    fn test_token_amount_scaling() {
        assert_eq!(
            TokenAmount::new("1.5").to_base_units(6).unwrap(),
            ethers::types::U256::from(1_500_000u64)
        );
        assert_eq!(
            TokenAmount::new("2").to_base_units(18).unwrap(),
            ethers::types::U256::exp10(18) * 2
        );
        assert_eq!(
            TokenAmount::new("1.500000000").to_base_units(6).unwrap(),
            ethers::types::U256::from(1_500_000u64)
        );
        assert!(TokenAmount::new("-1").to_base_units(6).is_err());
        assert!(TokenAmount::new("abc").to_base_units(6).is_err());
    }

    #[test]
    fn test_amount_finer_than_token_decimals_is_rejected() {
        let err = TokenAmount::new("1.1234567").to_base_units(6).unwrap_err();
        assert!(err.contains("6 fractional digits"));
        assert!(TokenAmount::new("1.9999999").to_base_units(6).is_err());
        assert!(TokenAmount::new("0.5").to_base_units(0).is_err());
        assert_eq!(
            TokenAmount::new("1.123456").to_base_units(6).unwrap(),
            ethers::types::U256::from(1_123_456u64)
        );
    }

    #[test]
    fn test_json_number_amounts() {
        let parse = |json: &str| serde_json::from_str::<TokenAmount>(json);

        assert_eq!(parse("1.25").unwrap().as_str(), "1.25");
        assert_eq!(parse("18446744073709551615").unwrap().as_str(), "18446744073709551615");
        // beyond u64 the number has been rounded before it reaches us
        assert!(parse("123456789012345678901").is_err());
        assert_eq!(
            parse("\"123456789012345678901\"").unwrap().as_str(),
            "123456789012345678901"
        );
    }
}
