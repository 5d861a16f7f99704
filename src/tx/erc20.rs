//! ERC-20 call encoding

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};

/// `approve(address,uint256)`
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
/// `transferFrom(address,address,uint256)`
pub const TRANSFER_FROM_SELECTOR: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];

fn with_selector(selector: [u8; 4], args: &[Token]) -> Bytes {
    let mut data = selector.to_vec();
    data.extend_from_slice(&abi::encode(args));
    data.into()
}

fn strip_selector(selector: [u8; 4], data: &[u8]) -> Option<&[u8]> {
    (data.len() >= 4 && data[..4] == selector).then(|| &data[4..])
}

pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    with_selector(
        APPROVE_SELECTOR,
        &[Token::Address(spender), Token::Uint(amount)],
    )
}

pub fn encode_transfer_from(from: Address, to: Address, amount: U256) -> Bytes {
    with_selector(
        TRANSFER_FROM_SELECTOR,
        &[Token::Address(from), Token::Address(to), Token::Uint(amount)],
    )
}

/// Recover `(spender, amount)` from approve calldata
pub fn decode_approve(data: &[u8]) -> Option<(Address, U256)> {
    let args = strip_selector(APPROVE_SELECTOR, data)?;
    let mut tokens = abi::decode(&[ParamType::Address, ParamType::Uint(256)], args)
        .ok()?
        .into_iter();
    Some((tokens.next()?.into_address()?, tokens.next()?.into_uint()?))
}

/// Recover `(from, to, amount)` from transferFrom calldata
pub fn decode_transfer_from(data: &[u8]) -> Option<(Address, Address, U256)> {
    let args = strip_selector(TRANSFER_FROM_SELECTOR, data)?;
    let mut tokens = abi::decode(
        &[ParamType::Address, ParamType::Address, ParamType::Uint(256)],
        args,
    )
    .ok()?
    .into_iter();
    Some((
        tokens.next()?.into_address()?,
        tokens.next()?.into_address()?,
        tokens.next()?.into_uint()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::id;

    #[test]
    fn test_selectors_match_signatures() {
        assert_eq!(APPROVE_SELECTOR, id("approve(address,uint256)"));
        assert_eq!(TRANSFER_FROM_SELECTOR, id("transferFrom(address,address,uint256)"));
    }

    #[test]
    fn test_approve_layout() {
        let spender = Address::repeat_byte(0x11);
        let data = encode_approve(spender, U256::from(1_500_000u64));
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[16..36], spender.as_bytes());
        assert_eq!(decode_approve(&data), Some((spender, U256::from(1_500_000u64))));
    }

    #[test]
    fn test_decode_rejects_other_selector() {
        let data = encode_transfer_from(Address::zero(), Address::zero(), U256::one());
        assert_eq!(decode_approve(&data), None);
        assert!(decode_transfer_from(&data).is_some());
    }
}
