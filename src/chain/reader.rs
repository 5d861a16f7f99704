//! Live reads of pool and token state
//!
//! Nothing read here is cached: pool state goes stale between blocks and a
//! stale tick would shift the derived position range.

use super::{Chain, ChainProvider};
use crate::error::{BatcherError, BatcherResult};

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;
use std::sync::Arc;
use tracing::debug;

/// The `slot0` fields the planner needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

/// Read capability over chain state. `None` means the call returned no data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// In-range liquidity of a concentrated-liquidity pool
    async fn liquidity(&self, chain: &Chain, pool: Address) -> BatcherResult<Option<u128>>;

    /// Current sqrt price and tick of a pool
    async fn slot0(&self, chain: &Chain, pool: Address) -> BatcherResult<Option<Slot0>>;

    /// ERC-20 `decimals()`
    async fn token_decimals(&self, chain: &Chain, token: Address) -> BatcherResult<Option<u8>>;
}

/// [`ChainReader`] backed by JSON-RPC `eth_call`
#[derive(Default)]
pub struct RpcChainReader {
    providers: DashMap<u64, Arc<ChainProvider>>,
}

impl RpcChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn provider(&self, chain: &Chain) -> BatcherResult<Arc<ChainProvider>> {
        if let Some(p) = self.providers.get(&chain.id()) {
            return Ok(p.clone());
        }
        let provider = Arc::new(ChainProvider::new(chain)?);
        self.providers.insert(chain.id(), provider.clone());
        Ok(provider)
    }

    async fn call(&self, chain: &Chain, to: Address, signature: &str) -> BatcherResult<Bytes> {
        let data = Bytes::from(id(signature).to_vec());
        let out = self.provider(chain)?.call(to, data).await?;
        debug!(chain_id = chain.id(), ?to, signature, len = out.len(), "eth_call");
        Ok(out)
    }
}

fn decode_words(
    chain: &Chain,
    types: &[ParamType],
    data: &[u8],
) -> BatcherResult<Option<Vec<Token>>> {
    if data.len() < 32 * types.len() {
        return Ok(None);
    }
    abi::decode(types, data)
        .map(Some)
        .map_err(|e| BatcherError::ChainConnection {
            chain_id: chain.id(),
            message: format!("malformed call result: {}", e),
        })
}

fn decode_liquidity(chain: &Chain, data: &[u8]) -> BatcherResult<Option<u128>> {
    Ok(decode_words(chain, &[ParamType::Uint(128)], data)?
        .and_then(|t| t.into_iter().next())
        .and_then(Token::into_uint)
        .map(|v| v.low_u128()))
}

/// `slot0()` head words; a zero price means the pool was never initialized
fn decode_slot0(chain: &Chain, data: &[u8]) -> BatcherResult<Option<Slot0>> {
    let Some(tokens) = decode_words(chain, &[ParamType::Uint(160), ParamType::Int(24)], data)?
    else {
        return Ok(None);
    };

    let mut tokens = tokens.into_iter();
    let sqrt_price_x96 = tokens.next().and_then(Token::into_uint);
    // int24 arrives sign-extended to 256 bits; the low 32 bits are the i32 value
    let tick = tokens
        .next()
        .and_then(Token::into_int)
        .map(|raw| raw.low_u32() as i32);

    Ok(match (sqrt_price_x96, tick) {
        (Some(sqrt_price_x96), Some(tick)) if !sqrt_price_x96.is_zero() => Some(Slot0 {
            sqrt_price_x96,
            tick,
        }),
        _ => None,
    })
}

fn decode_decimals(chain: &Chain, data: &[u8]) -> BatcherResult<Option<u8>> {
    Ok(decode_words(chain, &[ParamType::Uint(8)], data)?
        .and_then(|t| t.into_iter().next())
        .and_then(Token::into_uint)
        .map(|v| v.low_u32() as u8))
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn liquidity(&self, chain: &Chain, pool: Address) -> BatcherResult<Option<u128>> {
        let out = self.call(chain, pool, "liquidity()").await?;
        decode_liquidity(chain, &out)
    }

    async fn slot0(&self, chain: &Chain, pool: Address) -> BatcherResult<Option<Slot0>> {
        let out = self.call(chain, pool, "slot0()").await?;
        decode_slot0(chain, &out)
    }

    async fn token_decimals(&self, chain: &Chain, token: Address) -> BatcherResult<Option<u8>> {
        let out = self.call(chain, token, "decimals()").await?;
        decode_decimals(chain, &out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::I256;

    fn chain() -> Chain {
        Chain::new(1, "eth", vec!["https://1.rpc.example.com".to_string()]).unwrap()
    }

    fn slot0_words(sqrt_price_x96: U256, tick: i32) -> Vec<u8> {
        // slot0 returns seven words; only the first two are read
        let mut words = vec![
            Token::Uint(sqrt_price_x96),
            Token::Int(I256::from(tick).into_raw()),
        ];
        words.extend((0..5).map(|_| Token::Uint(U256::zero())));
        abi::encode(&words)
    }

    #[test]
    fn test_decode_negative_tick_slot0() {
        let price = U256::from(1u64) << 96;
        let slot0 = decode_slot0(&chain(), &slot0_words(price, -887_220))
            .unwrap()
            .unwrap();
        assert_eq!(slot0.sqrt_price_x96, price);
        assert_eq!(slot0.tick, -887_220);

        let slot0 = decode_slot0(&chain(), &slot0_words(price, 201_240)).unwrap().unwrap();
        assert_eq!(slot0.tick, 201_240);
    }

    #[test]
    fn test_uninitialized_pool_has_no_slot0() {
        assert!(decode_slot0(&chain(), &slot0_words(U256::zero(), 0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_liquidity_and_decimals() {
        let liquidity = abi::encode(&[Token::Uint(U256::from(34_399_999_543_676u64))]);
        assert_eq!(
            decode_liquidity(&chain(), &liquidity).unwrap(),
            Some(34_399_999_543_676)
        );

        let decimals = abi::encode(&[Token::Uint(U256::from(6u64))]);
        assert_eq!(decode_decimals(&chain(), &decimals).unwrap(), Some(6));
    }

    #[test]
    fn test_empty_result_is_none() {
        assert!(decode_liquidity(&chain(), &[]).unwrap().is_none());
        assert!(decode_slot0(&chain(), &[]).unwrap().is_none());
        assert!(decode_decimals(&chain(), &[]).unwrap().is_none());
    }

    #[test]
    fn test_short_result_is_none() {
        // one word cannot hold both slot0 fields
        let one_word = abi::encode(&[Token::Uint(U256::from(1u64) << 96)]);
        assert!(decode_slot0(&chain(), &one_word).unwrap().is_none());
    }
}
