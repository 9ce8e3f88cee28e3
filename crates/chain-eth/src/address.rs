use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use crate::error::EthError;

/// `keccak256(uncompressed_pk[1..])[12..]`, EIP-55 checksummed.
pub fn address_from_verifying_key(key: &VerifyingKey) -> String {
    let uncompressed = key.to_encoded_point(false);
    let hash = Keccak256::digest(&uncompressed.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    checksum_bytes(&addr)
}

/// Accepts a 33-byte compressed or 65-byte uncompressed SEC1 public key.
pub fn address_from_public_key(public_key: &[u8]) -> Result<String, EthError> {
    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| EthError::InvalidPublicKey(format!("invalid sec1 key: {e}")))?;
    Ok(address_from_verifying_key(&key))
}

pub fn address_from_private_key(private_key: &[u8; 32]) -> Result<String, EthError> {
    Ok(address_from_verifying_key(signing_key(private_key)?.verifying_key()))
}

/// Compressed (33-byte) public key for a private key.
pub fn public_key_from_private_key(private_key: &[u8; 32]) -> Result<[u8; 33], EthError> {
    let key = signing_key(private_key)?;
    let encoded = key.verifying_key().to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(encoded.as_bytes());
    Ok(out)
}

pub(crate) fn signing_key(private_key: &[u8; 32]) -> Result<SigningKey, EthError> {
    let mut key_bytes = *private_key;
    let key = SigningKey::from_bytes((&key_bytes).into())
        .map_err(|e| EthError::InvalidPrivateKey(e.to_string()));
    key_bytes.zeroize();
    key
}

/// Parses a 0x-prefixed address (any case) into raw bytes. The checksum is
/// not verified here; see [`validate_address`].
pub fn parse_address(address: &str) -> Result<[u8; 20], EthError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    let bytes = hex::decode(hex_part)
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&bytes);
    Ok(addr)
}

/// Returns `Ok(false)` for a well-formed address whose mixed case fails the
/// EIP-55 checksum. Single-case addresses carry no checksum and pass.
pub fn validate_address(address: &str) -> Result<bool, EthError> {
    let addr = parse_address(address)?;
    let hex_part = &address[2..];

    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());
    if is_all_lower || is_all_upper {
        return Ok(true);
    }
    Ok(checksum_bytes(&addr) == address)
}

/// EIP-55 form of any-case input.
pub fn checksum_address(address: &str) -> Result<String, EthError> {
    Ok(checksum_bytes(&parse_address(address)?))
}

/// EIP-55: a letter is upper-cased when the matching nibble of
/// `keccak256(lowercase_hex)` is >= 8.
pub fn checksum_bytes(addr: &[u8; 20]) -> String {
    let lower = hex::encode(addr);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 { hash[i / 2] >> 4 } else { hash[i / 2] & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: [u8; 32] = {
        let mut key = [0u8; 32];
        key[31] = 1;
        key
    };

    #[test]
    fn eip55_vectors() {
        let cases = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];
        for expected in cases {
            let lower = expected.to_lowercase();
            assert_eq!(checksum_address(&lower).unwrap(), expected);
        }
    }

    #[test]
    fn private_key_one_address() {
        assert_eq!(
            address_from_private_key(&KEY_ONE).unwrap(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    #[test]
    fn compressed_and_uncompressed_agree() {
        let compressed = public_key_from_private_key(&KEY_ONE).unwrap();
        let from_compressed = address_from_public_key(&compressed).unwrap();

        let key = signing_key(&KEY_ONE).unwrap();
        let uncompressed = key.verifying_key().to_encoded_point(false);
        let from_uncompressed = address_from_public_key(uncompressed.as_bytes()).unwrap();

        assert_eq!(from_compressed, from_uncompressed);
        assert!(address_from_public_key(&[0x05; 33]).is_err());
    }

    #[test]
    fn validate_address_cases() {
        assert!(validate_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap());
        assert!(validate_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap());
        assert!(validate_address("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED").unwrap());
        assert!(!validate_address("0x5AAEB6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap());
        assert!(validate_address("0x5aAeb6053F").is_err());
        assert!(validate_address("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
        assert!(validate_address("0xGGGGb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
    }

    #[test]
    fn zero_private_key_is_rejected() {
        assert!(address_from_private_key(&[0u8; 32]).is_err());
    }
}
