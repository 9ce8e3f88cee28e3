//! Ed25519 over Keccak-512, as used by NIS1.
//!
//! Differences from RFC 8032: the private key is byte-reversed before
//! hashing and every hash is Keccak-512 instead of SHA-512.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use sha3::{Digest, Keccak512};
use zeroize::Zeroize;

use crate::error::NemError;

pub struct KeyPair {
    scalar: Scalar,
    prefix: [u8; 32],
    public_key: [u8; 32],
}

impl KeyPair {
    pub fn from_private_key(private_key: &[u8; 32]) -> Self {
        let mut reversed = *private_key;
        reversed.reverse();
        let mut hashed = keccak512(&[reversed.as_slice()]);
        reversed.zeroize();

        let mut scalar_bytes = [0u8; 32];
        scalar_bytes.copy_from_slice(&hashed[..32]);
        scalar_bytes[0] &= 248;
        scalar_bytes[31] &= 127;
        scalar_bytes[31] |= 64;
        let scalar = Scalar::from_bytes_mod_order(scalar_bytes);
        scalar_bytes.zeroize();

        let mut prefix = [0u8; 32];
        prefix.copy_from_slice(&hashed[32..]);
        hashed.zeroize();

        let public_key = EdwardsPoint::mul_base(&scalar).compress().to_bytes();
        Self {
            scalar,
            prefix,
            public_key,
        }
    }

    /// Parses 64 hex characters. The legacy 66-character form with a `00`
    /// sign prefix is also accepted.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, NemError> {
        let trimmed = match private_key_hex.len() {
            66 if private_key_hex.starts_with("00") => &private_key_hex[2..],
            _ => private_key_hex,
        };
        if trimmed.len() != 64 {
            return Err(NemError::InvalidPrivateKey(format!(
                "expected 64 hex characters, got {}",
                trimmed.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(trimmed, &mut bytes)
            .map_err(|e| NemError::InvalidPrivateKey(format!("invalid hex: {e}")))?;
        let pair = Self::from_private_key(&bytes);
        bytes.zeroize();
        Ok(pair)
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.public_key
    }

    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        let mut nonce_hash = keccak512(&[self.prefix.as_slice(), data]);
        let r = Scalar::from_bytes_mod_order_wide(&nonce_hash);
        nonce_hash.zeroize();
        let big_r = EdwardsPoint::mul_base(&r).compress().to_bytes();

        let k_hash = keccak512(&[big_r.as_slice(), self.public_key.as_slice(), data]);
        let k = Scalar::from_bytes_mod_order_wide(&k_hash);
        let s = r + k * self.scalar;

        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&big_r);
        signature[32..].copy_from_slice(s.as_bytes());
        signature
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.scalar.zeroize();
        self.prefix.zeroize();
    }
}

/// Checks `S*B == R + k*A` with `k = keccak512(R || A || data)`.
pub fn verify(public_key: &[u8; 32], data: &[u8], signature: &[u8; 64]) -> bool {
    let Some(a) = CompressedEdwardsY(*public_key).decompress() else {
        return false;
    };
    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&signature[32..]);
    let Some(s) = Option::<Scalar>::from(Scalar::from_canonical_bytes(s_bytes)) else {
        return false;
    };

    let k_hash = keccak512(&[&signature[..32], public_key.as_slice(), data]);
    let k = Scalar::from_bytes_mod_order_wide(&k_hash);
    let expected_r = EdwardsPoint::vartime_double_scalar_mul_basepoint(&k, &(-a), &s);
    expected_r.compress().as_bytes()[..] == signature[..32]
}

pub fn parse_public_key(key_hex: &str) -> Result<[u8; 32], NemError> {
    let mut key = [0u8; 32];
    hex::decode_to_slice(key_hex, &mut key)
        .map_err(|e| NemError::InvalidPublicKey(format!("invalid hex: {e}")))?;
    Ok(key)
}

fn keccak512(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Keccak512::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_KEY: &str = "575dbb3062267eff57c970a336ebbc8fbcfe12c5bd3ed7bc11eb0481d7704ced";

    #[test]
    fn known_public_key_and_mainnet_address() {
        use crate::address::Address;
        use crate::network::NetworkType;

        let pair = KeyPair::from_hex(PRIVATE_KEY).unwrap();
        assert_eq!(
            hex::encode(pair.public_key()),
            "c5f54ba980fcbb657dbaaa42700539b207873e134d2375efeab5f1ab52f87844"
        );
        let address = Address::from_public_key(&pair.public_key(), NetworkType::Mainnet);
        assert_eq!(address.encode(), "NDD2CT6LQLIYQ56KIXI3ENTM6EK3D44P5JFXJ4R4");
        assert_eq!(
            Address::parse("ndd2ct6lqliyq56kixi3entm6ek3d44p5jfxj4r4").unwrap(),
            address
        );
    }

    #[test]
    fn sign_and_verify() {
        let pair = KeyPair::from_hex(PRIVATE_KEY).unwrap();
        let signature = pair.sign(b"nem transfer");
        assert!(verify(&pair.public_key(), b"nem transfer", &signature));
        assert!(!verify(&pair.public_key(), b"nem transfeR", &signature));
    }

    #[test]
    fn signatures_are_deterministic() {
        let pair = KeyPair::from_hex(PRIVATE_KEY).unwrap();
        assert_eq!(pair.sign(b"abc"), pair.sign(b"abc"));
        assert_ne!(pair.sign(b"abc"), pair.sign(b"abd"));
    }

    #[test]
    fn wrong_key_does_not_verify() {
        let pair = KeyPair::from_private_key(&[1u8; 32]);
        let other = KeyPair::from_private_key(&[2u8; 32]);
        let signature = pair.sign(b"data");
        assert!(!verify(&other.public_key(), b"data", &signature));
    }

    #[test]
    fn non_canonical_s_is_rejected() {
        let pair = KeyPair::from_private_key(&[3u8; 32]);
        let mut signature = pair.sign(b"data");
        signature[63] = 0xff;
        assert!(!verify(&pair.public_key(), b"data", &signature));
    }

    #[test]
    fn legacy_prefixed_hex_is_accepted() {
        let plain = KeyPair::from_hex(PRIVATE_KEY).unwrap();
        let prefixed = KeyPair::from_hex(&format!("00{PRIVATE_KEY}")).unwrap();
        assert_eq!(plain.public_key(), prefixed.public_key());
        assert!(KeyPair::from_hex("abcd").is_err());
    }

    #[test]
    fn reversal_matters() {
        let mut key = [0u8; 32];
        key[0] = 1;
        let mut reversed = key;
        reversed.reverse();
        assert_ne!(
            KeyPair::from_private_key(&key).public_key(),
            KeyPair::from_private_key(&reversed).public_key()
        );
    }
}
