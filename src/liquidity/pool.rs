//! Pool identity and live pool state

use ethers::abi::{self, Token};
use ethers::types::{Address, U256};
use ethers::utils::{get_create2_address_from_hash, keccak256};
use serde::{de, Deserialize, Deserializer, Serialize};

/// keccak256 of the pool contract creation code, fixed per factory deployment
pub const POOL_INIT_CODE_HASH: [u8; 32] = [
    0xe3, 0x4f, 0x19, 0x9b, 0x19, 0xb2, 0xb4, 0xf4, 0x7f, 0x68, 0x44, 0x26, 0x19, 0xd5, 0x55, 0x52,
    0x7d, 0x24, 0x4f, 0x78, 0xa3, 0x29, 0x7e, 0xa8, 0x93, 0x25, 0xf8, 0x43, 0xf8, 0x7b, 0x8b, 0x54,
];

/// Pool fee tier. Accepted on the wire by name (`"MEDIUM"`) or by fee in
/// hundredths of a bip (`3000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeeTier {
    Lowest,
    Low,
    Medium,
    High,
}

impl FeeTier {
    pub fn fee(self) -> u32 {
        match self {
            FeeTier::Lowest => 100,
            FeeTier::Low => 500,
            FeeTier::Medium => 3_000,
            FeeTier::High => 10_000,
        }
    }

    pub fn tick_spacing(self) -> i32 {
        match self {
            FeeTier::Lowest => 1,
            FeeTier::Low => 10,
            FeeTier::Medium => 60,
            FeeTier::High => 200,
        }
    }

    pub fn from_fee(fee: u32) -> Option<Self> {
        match fee {
            100 => Some(FeeTier::Lowest),
            500 => Some(FeeTier::Low),
            3_000 => Some(FeeTier::Medium),
            10_000 => Some(FeeTier::High),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "LOWEST" => Some(FeeTier::Lowest),
            "LOW" => Some(FeeTier::Low),
            "MEDIUM" => Some(FeeTier::Medium),
            "HIGH" => Some(FeeTier::High),
            other => other.parse().ok().and_then(Self::from_fee),
        }
    }
}

impl<'de> Deserialize<'de> for FeeTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Fee(u32),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Fee(fee) => FeeTier::from_fee(fee)
                .ok_or_else(|| de::Error::custom(format!("unsupported fee tier {}", fee))),
            Raw::Name(name) => FeeTier::from_name(&name)
                .ok_or_else(|| de::Error::custom(format!("unknown fee tier {:?}", name))),
        }
    }
}

/// Snapshot of a pool read for one mint. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub current_tick: i32,
    pub tick_spacing: i32,
    pub fee: FeeTier,
}

/// Order a token pair the way the factory does; `None` for identical tokens
pub fn sort_tokens(a: Address, b: Address) -> Option<(Address, Address)> {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => Some((a, b)),
        std::cmp::Ordering::Greater => Some((b, a)),
        std::cmp::Ordering::Equal => None,
    }
}

/// CREATE2 address of the pool for an already sorted pair
pub fn compute_pool_address(
    factory: Address,
    token0: Address,
    token1: Address,
    fee: FeeTier,
) -> Address {
    let salt = keccak256(abi::encode(&[
        Token::Address(token0),
        Token::Address(token1),
        Token::Uint(U256::from(fee.fee())),
    ]));
    get_create2_address_from_hash(factory, salt, POOL_INIT_CODE_HASH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn test_mainnet_usdc_weth_pools() {
        let factory = addr("0x1F98431c8aD98523631AE4a59f267346ea31F984");
        let usdc = addr("0xA0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let weth = addr("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        let (token0, token1) = sort_tokens(weth, usdc).unwrap();
        assert_eq!(token0, usdc);

        assert_eq!(
            compute_pool_address(factory, token0, token1, FeeTier::Low),
            addr("0x88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640")
        );
        assert_eq!(
            compute_pool_address(factory, token0, token1, FeeTier::Medium),
            addr("0x8ad599c3A0ff1De082011EFDDc58f1908eb6e6D8")
        );
    }

    #[test]
    fn test_sort_rejects_identical_tokens() {
        let t = Address::repeat_byte(7);
        assert_eq!(sort_tokens(t, t), None);
    }

    #[test]
    fn test_fee_tier_wire_forms() {
        let by_name: FeeTier = serde_json::from_str("\"medium\"").unwrap();
        let by_fee: FeeTier = serde_json::from_str("500").unwrap();
        let by_fee_text: FeeTier = serde_json::from_str("\"10000\"").unwrap();
        assert_eq!(by_name, FeeTier::Medium);
        assert_eq!(by_fee, FeeTier::Low);
        assert_eq!(by_fee_text, FeeTier::High);
        assert!(serde_json::from_str::<FeeTier>("2500").is_err());
        assert_eq!(serde_json::to_string(&FeeTier::Lowest).unwrap(), "\"LOWEST\"");
    }

    #[test]
    fn test_tick_spacing_per_tier() {
        let spacings: Vec<(u32, i32)> = [FeeTier::Lowest, FeeTier::Low, FeeTier::Medium, FeeTier::High]
            .into_iter()
            .map(|t| (t.fee(), t.tick_spacing()))
            .collect();
        assert_eq!(spacings, vec![(100, 1), (500, 10), (3_000, 60), (10_000, 200)]);
    }
}
