use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

use crate::error::SymbolError;

/// An Ed25519 key pair as used by Symbol (standard SHA-512 variant).
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn from_private_key(private_key: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(private_key),
        }
    }

    /// Parses a 64-character hex private key.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, SymbolError> {
        let mut bytes = parse_key_hex(private_key_hex)
            .map_err(|e| SymbolError::InvalidPrivateKey(e.to_string()))?;
        let pair = Self::from_private_key(&bytes);
        bytes.zeroize();
        Ok(pair)
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Raw 32-byte private key. Callers are responsible for wiping copies.
    pub fn private_key(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        self.signing_key.sign(data).to_bytes()
    }
}

/// Verifies a Symbol signature over `data`.
pub fn verify(public_key: &[u8; 32], data: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    key.verify(data, &Signature::from_bytes(signature)).is_ok()
}

/// Parses a 32-byte key from 64 hex characters (either case).
pub fn parse_key_hex(key_hex: &str) -> Result<[u8; 32], SymbolError> {
    if key_hex.len() != 64 {
        return Err(SymbolError::InvalidPublicKey(format!(
            "expected 64 hex characters, got {}",
            key_hex.len()
        )));
    }
    let bytes =
        hex::decode(key_hex).map_err(|e| SymbolError::InvalidPublicKey(format!("invalid hex: {e}")))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8032 test vector 1.
    const RFC_SECRET: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const RFC_PUBLIC: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

    #[test]
    fn known_key_pair_and_testnet_address() {
        use crate::address::Address;
        use crate::network::NetworkType;

        let pair = KeyPair::from_hex(
            "575DBB3062267EFF57C970A336EBBC8FBCFE12C5BD3ED7BC11EB0481D7704CED",
        )
        .unwrap();
        assert_eq!(
            hex::encode_upper(pair.public_key()),
            "2E834140FD66CF87B254A693A2C7862C819217B676D3943267156625E816EC6F"
        );
        let address = Address::from_public_key(&pair.public_key(), NetworkType::Testnet);
        assert_eq!(address.encode(), "TATNE7Q5BITMUTRRN6IB4I7FLSDRDWZA37JGO5Q");
        assert_eq!(
            Address::parse("TATNE7-Q5BITM-UTRRN6-IB4I7F-LSDRDW-ZA37JG-O5Q").unwrap(),
            address
        );
    }

    #[test]
    fn public_key_matches_rfc8032() {
        let pair = KeyPair::from_hex(RFC_SECRET).unwrap();
        assert_eq!(hex::encode(pair.public_key()), RFC_PUBLIC);
    }

    #[test]
    fn sign_and_verify() {
        let pair = KeyPair::from_hex(RFC_SECRET).unwrap();
        let sig = pair.sign(b"symbol");
        assert!(verify(&pair.public_key(), b"symbol", &sig));
        assert!(!verify(&pair.public_key(), b"other", &sig));
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let pair = KeyPair::from_hex(&RFC_SECRET.to_uppercase()).unwrap();
        assert_eq!(hex::encode(pair.public_key()), RFC_PUBLIC);
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!(matches!(
            KeyPair::from_hex("abcd"),
            Err(SymbolError::InvalidPrivateKey(_))
        ));
        assert!(parse_key_hex(&"zz".repeat(32)).is_err());
    }
}
