use std::fmt;

use ripemd::Ripemd160;
use sha3::{Digest, Sha3_256};

use crate::error::SymbolError;
use crate::network::NetworkType;

/// Decoded address size: network byte + 20-byte hash + 3-byte checksum.
pub const ADDRESS_SIZE: usize = 24;

/// Length of the base32 form.
pub const ENCODED_ADDRESS_SIZE: usize = 39;

const ADDRESS_ALPHABET: base32::Alphabet = base32::Alphabet::RFC4648 { padding: false };

/// A Symbol address in raw form.
///
/// The same 24-byte slot also carries *unresolved* addresses: when the low
/// bit of the first byte is set, bytes 1..9 hold a namespace id (little
/// endian) that the chain resolves to a real address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; ADDRESS_SIZE]);

impl Address {
    /// `network || ripemd160(sha3_256(pk)) || sha3_256(prefix)[..3]`
    pub fn from_public_key(public_key: &[u8; 32], network: NetworkType) -> Self {
        let sha = Sha3_256::digest(public_key);
        let ripe = Ripemd160::digest(sha);

        let mut raw = [0u8; ADDRESS_SIZE];
        raw[0] = network.as_byte();
        raw[1..21].copy_from_slice(&ripe);
        let checksum = Sha3_256::digest(&raw[..21]);
        raw[21..].copy_from_slice(&checksum[..3]);
        Address(raw)
    }

    /// Builds the unresolved (alias) form pointing at `namespace_id`.
    pub fn from_namespace_id(namespace_id: u64, network: NetworkType) -> Self {
        let mut raw = [0u8; ADDRESS_SIZE];
        raw[0] = network.as_byte() | 0x01;
        raw[1..9].copy_from_slice(&namespace_id.to_le_bytes());
        Address(raw)
    }

    /// Parses the 39-character base32 form, verifying network and checksum.
    pub fn parse(encoded: &str) -> Result<Self, SymbolError> {
        let cleaned: String = encoded.chars().filter(|c| *c != '-').collect();
        if cleaned.len() != ENCODED_ADDRESS_SIZE {
            return Err(SymbolError::InvalidAddress(format!(
                "expected {} characters, got {}",
                ENCODED_ADDRESS_SIZE,
                cleaned.len()
            )));
        }
        let bytes = base32::decode(ADDRESS_ALPHABET, &cleaned.to_ascii_uppercase())
            .ok_or_else(|| SymbolError::InvalidAddress("invalid base32".into()))?;
        let raw = Self::from_bytes(&bytes)?;
        if raw.is_alias() {
            return Err(SymbolError::InvalidAddress(
                "encoded addresses cannot be aliases".into(),
            ));
        }
        raw.verify_checksum()?;
        Ok(raw)
    }

    /// Accepts raw decoded bytes (e.g. from a binary payload or a REST hex
    /// field) without checksum verification, so aliases pass through.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SymbolError> {
        let raw: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| {
            SymbolError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_SIZE,
                bytes.len()
            ))
        })?;
        NetworkType::from_byte(raw[0] & 0xfe)?;
        Ok(Address(raw))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, SymbolError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| SymbolError::InvalidAddress(format!("invalid hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn network(&self) -> Result<NetworkType, SymbolError> {
        NetworkType::from_byte(self.0[0] & 0xfe)
    }

    pub fn is_alias(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// The namespace id an alias points at, or `None` for a plain address.
    pub fn namespace_id(&self) -> Option<u64> {
        if !self.is_alias() {
            return None;
        }
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[1..9]);
        Some(u64::from_le_bytes(id))
    }

    pub fn encode(&self) -> String {
        base32::encode(ADDRESS_ALPHABET, &self.0)
    }

    fn verify_checksum(&self) -> Result<(), SymbolError> {
        let checksum = Sha3_256::digest(&self.0[..21]);
        if checksum[..3] != self.0[21..] {
            return Err(SymbolError::InvalidAddress("checksum mismatch".into()));
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Returns `true` when `encoded` is a well-formed address for `network`.
pub fn validate_address(encoded: &str, network: NetworkType) -> bool {
    Address::parse(encoded)
        .and_then(|a| a.network())
        .map(|n| n == network)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    fn test_public_key() -> [u8; 32] {
        KeyPair::from_private_key(&[0x11; 32]).public_key()
    }

    #[test]
    fn mainnet_addresses_start_with_n() {
        let addr = Address::from_public_key(&test_public_key(), NetworkType::Mainnet);
        let encoded = addr.encode();
        assert_eq!(encoded.len(), ENCODED_ADDRESS_SIZE);
        assert!(encoded.starts_with('N'), "got {encoded}");
    }

    #[test]
    fn testnet_addresses_start_with_t() {
        let addr = Address::from_public_key(&test_public_key(), NetworkType::Testnet);
        assert!(addr.encode().starts_with('T'));
    }

    #[test]
    fn parse_roundtrip_and_network() {
        let addr = Address::from_public_key(&test_public_key(), NetworkType::Testnet);
        let parsed = Address::parse(&addr.encode()).unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(parsed.network().unwrap(), NetworkType::Testnet);
        assert!(validate_address(&addr.encode(), NetworkType::Testnet));
        assert!(!validate_address(&addr.encode(), NetworkType::Mainnet));
    }

    #[test]
    fn pretty_dashes_are_ignored() {
        let addr = Address::from_public_key(&test_public_key(), NetworkType::Mainnet);
        let encoded = addr.encode();
        let pretty: Vec<String> = encoded
            .as_bytes()
            .chunks(6)
            .map(|c| String::from_utf8(c.to_vec()).unwrap())
            .collect();
        assert_eq!(Address::parse(&pretty.join("-")).unwrap(), addr);
    }

    #[test]
    fn checksum_mismatch_is_rejected() {
        let addr = Address::from_public_key(&test_public_key(), NetworkType::Mainnet);
        let mut raw = addr.0;
        raw[23] ^= 0xff;
        let tampered = Address(raw).encode();
        assert!(Address::parse(&tampered).is_err());
    }

    #[test]
    fn alias_roundtrip() {
        let alias = Address::from_namespace_id(0xE74B_99BA_41F4_AFEE, NetworkType::Mainnet);
        assert!(alias.is_alias());
        assert_eq!(alias.namespace_id(), Some(0xE74B_99BA_41F4_AFEE));
        assert_eq!(alias.network().unwrap(), NetworkType::Mainnet);
        assert_eq!(Address::from_bytes(&alias.0).unwrap(), alias);
    }

    #[test]
    fn plain_address_has_no_namespace_id() {
        let addr = Address::from_public_key(&test_public_key(), NetworkType::Mainnet);
        assert!(!addr.is_alias());
        assert_eq!(addr.namespace_id(), None);
    }

    #[test]
    fn hex_form_roundtrip() {
        let addr = Address::from_public_key(&test_public_key(), NetworkType::Mainnet);
        assert_eq!(Address::from_hex(&hex::encode(addr.0)).unwrap(), addr);
        assert!(Address::from_hex("6800").is_err());
    }
}
