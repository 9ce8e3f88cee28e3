use std::fmt;

use ripemd::Ripemd160;
use sha3::{Digest, Keccak256};

use crate::error::NemError;
use crate::network::NetworkType;

pub const ADDRESS_SIZE: usize = 25;
pub const ENCODED_ADDRESS_SIZE: usize = 40;

const ADDRESS_ALPHABET: base32::Alphabet = base32::Alphabet::RFC4648 { padding: false };

/// `network || ripemd160(keccak256(pk)) || keccak256(prefix)[..4]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; ADDRESS_SIZE]);

impl Address {
    pub fn from_public_key(public_key: &[u8; 32], network: NetworkType) -> Self {
        let ripe = Ripemd160::digest(Keccak256::digest(public_key));
        let mut raw = [0u8; ADDRESS_SIZE];
        raw[0] = network.as_byte();
        raw[1..21].copy_from_slice(&ripe);
        let checksum = Keccak256::digest(&raw[..21]);
        raw[21..].copy_from_slice(&checksum[..4]);
        Address(raw)
    }

    /// Parses the base32 form; dashes are ignored.
    pub fn parse(encoded: &str) -> Result<Self, NemError> {
        let cleaned: String = encoded.chars().filter(|c| *c != '-').collect();
        if cleaned.len() != ENCODED_ADDRESS_SIZE {
            return Err(NemError::InvalidAddress(format!(
                "expected {} characters, got {}",
                ENCODED_ADDRESS_SIZE,
                cleaned.len()
            )));
        }
        let bytes = base32::decode(ADDRESS_ALPHABET, &cleaned.to_ascii_uppercase())
            .ok_or_else(|| NemError::InvalidAddress("invalid base32".into()))?;
        let raw: [u8; ADDRESS_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| NemError::InvalidAddress("wrong decoded length".into()))?;
        NetworkType::from_byte(raw[0])?;

        let checksum = Keccak256::digest(&raw[..21]);
        if checksum[..4] != raw[21..] {
            return Err(NemError::InvalidAddress("checksum mismatch".into()));
        }
        Ok(Address(raw))
    }

    pub fn network(&self) -> Result<NetworkType, NemError> {
        NetworkType::from_byte(self.0[0])
    }

    pub fn encode(&self) -> String {
        base32::encode(ADDRESS_ALPHABET, &self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn prefixes_follow_network() {
        let pk = KeyPair::from_private_key(&[9u8; 32]).public_key();
        let main = Address::from_public_key(&pk, NetworkType::Mainnet).encode();
        let test = Address::from_public_key(&pk, NetworkType::Testnet).encode();
        assert_eq!(main.len(), ENCODED_ADDRESS_SIZE);
        assert!(main.starts_with('N'));
        assert!(test.starts_with('T'));
    }

    #[test]
    fn parse_roundtrip() {
        let pk = KeyPair::from_private_key(&[9u8; 32]).public_key();
        let addr = Address::from_public_key(&pk, NetworkType::Testnet);
        assert_eq!(Address::parse(&addr.encode()).unwrap(), addr);
        assert_eq!(addr.network().unwrap(), NetworkType::Testnet);
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let pk = KeyPair::from_private_key(&[9u8; 32]).public_key();
        let mut raw = Address::from_public_key(&pk, NetworkType::Mainnet).0;
        raw[24] ^= 1;
        assert!(Address::parse(&Address(raw).encode()).is_err());
        assert!(Address::parse("NABC").is_err());
    }
}
