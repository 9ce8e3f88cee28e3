use crate::abi::{self, encode_function_call, AbiParam};
use crate::address::parse_address;
use crate::error::EthError;

/// Function selector for `transfer(address,uint256)`: `0xa9059cbb`.
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Function selector for `balanceOf(address)`: `0x70a08231`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Function selector for `decimals()`: `0x313ce567`.
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

const TRANSFER_CALLDATA_SIZE: usize = 4 + 2 * abi::WORD_SIZE;

/// A decoded `transfer(address,uint256)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20Transfer {
    /// Raw 20-byte recipient.
    pub to: [u8; 20],
    /// Absolute token amount.
    pub amount: u128,
    /// Bytes appended after the ABI arguments (a plain memo, if any).
    pub trailing: Vec<u8>,
}

/// Encodes `transfer(to, amount)`.
pub fn encode_transfer(to: &str, amount: u128) -> Result<Vec<u8>, EthError> {
    let addr = parse_address(to)?;
    Ok(encode_function_call(
        TRANSFER_SELECTOR,
        &[AbiParam::Address(addr), AbiParam::Uint256(abi::u128_to_word(amount))],
    ))
}

/// Encodes `balanceOf(owner)`.
pub fn encode_balance_of(owner: &str) -> Result<Vec<u8>, EthError> {
    let addr = parse_address(owner)?;
    Ok(encode_function_call(BALANCE_OF_SELECTOR, &[AbiParam::Address(addr)]))
}

/// Encodes `decimals()`.
pub fn encode_decimals() -> Vec<u8> {
    encode_function_call(DECIMALS_SELECTOR, &[])
}

/// Decodes a `decimals` return value.
pub fn decode_decimals(return_data: &[u8]) -> Result<u8, EthError> {
    let value = decode_balance(return_data)?;
    u8::try_from(value)
        .map_err(|_| EthError::DecodingError(format!("decimals out of range: {value}")))
}

/// Returns `Some` when `calldata` is a `transfer` call.
pub fn decode_transfer(calldata: &[u8]) -> Result<Option<Erc20Transfer>, EthError> {
    if calldata.len() < TRANSFER_CALLDATA_SIZE || calldata[..4] != TRANSFER_SELECTOR {
        return Ok(None);
    }
    let to = abi::word_to_address(&abi::word_at(calldata, 0)?)?;
    let amount = abi::word_to_u128(&abi::word_at(calldata, 1)?)?;
    Ok(Some(Erc20Transfer {
        to,
        amount,
        trailing: calldata[TRANSFER_CALLDATA_SIZE..].to_vec(),
    }))
}

/// Decodes a `balanceOf` return value.
pub fn decode_balance(return_data: &[u8]) -> Result<u128, EthError> {
    if return_data.len() < abi::WORD_SIZE {
        return Err(EthError::DecodingError(format!(
            "expected at least 32 bytes for uint256, got {}",
            return_data.len()
        )));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&return_data[..abi::WORD_SIZE]);
    abi::word_to_u128(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEAD: &str = "0x000000000000000000000000000000000000dEaD";

    #[test]
    fn transfer_calldata_matches_known_vector() {
        let data = encode_transfer("0xdead000000000000000000000000000000000000", 1_000_000_000_000_000_000)
            .unwrap();
        assert_eq!(hex::encode(&data[..4]), "a9059cbb");
        assert!(hex::encode(&data[4..36]).starts_with("000000000000000000000000dead"));
        assert!(hex::encode(&data[36..68]).ends_with("0de0b6b3a7640000"));
    }

    #[test]
    fn transfer_decode_roundtrip() {
        let mut data = encode_transfer(DEAD, 42).unwrap();
        let decoded = decode_transfer(&data).unwrap().unwrap();
        assert_eq!(decoded.amount, 42);
        assert_eq!(decoded.to[18..], [0xde, 0xad]);
        assert!(decoded.trailing.is_empty());

        data.extend_from_slice(b"memo");
        assert_eq!(decode_transfer(&data).unwrap().unwrap().trailing, b"memo");
    }

    #[test]
    fn non_transfer_calldata_is_none() {
        assert_eq!(decode_transfer(b"hello").unwrap(), None);
        let balance_of = encode_balance_of(DEAD).unwrap();
        assert_eq!(decode_transfer(&balance_of).unwrap(), None);
    }

    #[test]
    fn balance_of_layout() {
        let data = encode_balance_of(DEAD).unwrap();
        assert_eq!(&data[..4], &BALANCE_OF_SELECTOR);
        assert_eq!(data.len(), 36);
    }

    #[test]
    fn decode_balance_reads_first_word() {
        let mut ret = vec![0u8; 64];
        ret[31] = 42;
        ret[63] = 99;
        assert_eq!(decode_balance(&ret).unwrap(), 42);
        assert!(decode_balance(&[0u8; 16]).is_err());
    }

    #[test]
    fn decimals_call_and_return() {
        assert_eq!(encode_decimals(), DECIMALS_SELECTOR.to_vec());
        let mut ret = [0u8; 32];
        ret[31] = 18;
        assert_eq!(decode_decimals(&ret).unwrap(), 18);
        ret[30] = 1;
        assert!(decode_decimals(&ret).is_err());
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        assert!(encode_transfer("not-an-address", 1).is_err());
    }
}
