//! Minimal ABI word encoding for ERC-20 calls.
//!
//! Only static 32-byte words are supported: addresses (left-padded) and
//! uint256 values (big-endian).

use crate::error::EthError;

pub const WORD_SIZE: usize = 32;

/// A single static ABI parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiParam {
    Address([u8; 20]),
    Uint256([u8; 32]),
}

/// `selector || word(params[0]) || word(params[1]) || ...`
pub fn encode_function_call(selector: [u8; 4], params: &[AbiParam]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + params.len() * WORD_SIZE);
    data.extend_from_slice(&selector);
    for param in params {
        data.extend_from_slice(&encode_word(param));
    }
    data
}

fn encode_word(param: &AbiParam) -> [u8; 32] {
    match param {
        AbiParam::Address(addr) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr);
            word
        }
        AbiParam::Uint256(value) => *value,
    }
}

/// Reads the `index`-th word after the 4-byte selector.
pub fn word_at(calldata: &[u8], index: usize) -> Result<[u8; 32], EthError> {
    let start = 4 + index * WORD_SIZE;
    let end = start + WORD_SIZE;
    if calldata.len() < end {
        return Err(EthError::DecodingError(format!(
            "calldata too short for word {index}: {} bytes",
            calldata.len()
        )));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&calldata[start..end]);
    Ok(word)
}

/// Interprets a word as an address. The 12 padding bytes must be zero.
pub fn word_to_address(word: &[u8; 32]) -> Result<[u8; 20], EthError> {
    if word[..12].iter().any(|&b| b != 0) {
        return Err(EthError::DecodingError("address word has non-zero padding".into()));
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&word[12..]);
    Ok(addr)
}

pub fn u128_to_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Narrows a uint256 word to `u128`, failing if the high half is set.
pub fn word_to_u128(word: &[u8; 32]) -> Result<u128, EthError> {
    if word[..16].iter().any(|&b| b != 0) {
        return Err(EthError::DecodingError("uint256 value exceeds 128 bits".into()));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_word_is_left_padded() {
        let mut addr = [0u8; 20];
        addr[0] = 0xde;
        addr[19] = 0xad;
        let word = encode_word(&AbiParam::Address(addr));
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(word_to_address(&word).unwrap(), addr);
    }

    #[test]
    fn function_call_layout() {
        let selector = [0xa9, 0x05, 0x9c, 0xbb];
        let data = encode_function_call(
            selector,
            &[AbiParam::Address([1u8; 20]), AbiParam::Uint256(u128_to_word(100))],
        );
        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &selector);
        assert_eq!(word_to_address(&word_at(&data, 0).unwrap()).unwrap(), [1u8; 20]);
        assert_eq!(word_to_u128(&word_at(&data, 1).unwrap()).unwrap(), 100);
        assert!(word_at(&data, 2).is_err());
    }

    #[test]
    fn u128_words() {
        assert_eq!(word_to_u128(&u128_to_word(u128::MAX)).unwrap(), u128::MAX);
        let mut big = [0u8; 32];
        big[0] = 1;
        assert!(word_to_u128(&big).is_err());
    }

    #[test]
    fn dirty_address_padding_is_rejected() {
        let mut word = [0u8; 32];
        word[0] = 1;
        assert!(word_to_address(&word).is_err());
    }
}
