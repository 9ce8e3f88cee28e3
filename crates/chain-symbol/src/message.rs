//! Transfer message payloads.
//!
//! Plain messages are `0x00 || utf8`. Encrypted messages are
//! `0x01 || tag (16) || iv (12) || ciphertext`, sealed with AES-256-GCM under
//! a key shared between sender and recipient.

use crypto_utils::encryption::{self, SealedBox, NONCE_SIZE, TAG_SIZE};
use curve25519_dalek::edwards::CompressedEdwardsY;
use hkdf::Hkdf;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

use crate::error::SymbolError;
use crate::keys::KeyPair;

pub const PLAIN_MESSAGE_TYPE: u8 = 0x00;
pub const ENCRYPTED_MESSAGE_TYPE: u8 = 0x01;

const SHARED_KEY_INFO: &[u8] = b"catapult";

/// A message as carried in a transfer body, before any decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    Plain(String),
    /// Encrypted bytes after the type marker.
    Encrypted(Vec<u8>),
    /// Any other type marker (e.g. persistent harvesting delegation).
    Raw(Vec<u8>),
}

impl MessagePayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MessagePayload::Plain(text) => {
                let mut out = Vec::with_capacity(text.len() + 1);
                out.push(PLAIN_MESSAGE_TYPE);
                out.extend_from_slice(text.as_bytes());
                out
            }
            MessagePayload::Encrypted(body) => {
                let mut out = Vec::with_capacity(body.len() + 1);
                out.push(ENCRYPTED_MESSAGE_TYPE);
                out.extend_from_slice(body);
                out
            }
            MessagePayload::Raw(bytes) => bytes.clone(),
        }
    }

    /// `None` for an empty message field.
    pub fn from_bytes(bytes: &[u8]) -> Result<Option<Self>, SymbolError> {
        let Some((&marker, body)) = bytes.split_first() else {
            return Ok(None);
        };
        let payload = match marker {
            PLAIN_MESSAGE_TYPE => MessagePayload::Plain(
                String::from_utf8(body.to_vec())
                    .map_err(|e| SymbolError::MessageError(format!("message is not utf-8: {e}")))?,
            ),
            ENCRYPTED_MESSAGE_TYPE => MessagePayload::Encrypted(body.to_vec()),
            _ => MessagePayload::Raw(bytes.to_vec()),
        };
        Ok(Some(payload))
    }
}

/// Derives the AES key shared by `key_pair` and the holder of
/// `other_public_key`. Symmetric: either side computes the same key.
pub fn derive_shared_key(
    key_pair: &KeyPair,
    other_public_key: &[u8; 32],
) -> Result<[u8; 32], SymbolError> {
    let point = CompressedEdwardsY(*other_public_key)
        .decompress()
        .ok_or_else(|| SymbolError::InvalidPublicKey("not a curve point".into()))?;

    let mut private_key = key_pair.private_key();
    let mut hashed = Sha512::digest(private_key);
    private_key.zeroize();

    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&hashed[..32]);
    hashed.as_mut_slice().zeroize();

    let shared_secret = point.mul_clamped(scalar).compress().to_bytes();
    scalar.zeroize();

    let mut shared_key = [0u8; 32];
    Hkdf::<Sha256>::new(None, &shared_secret)
        .expand(SHARED_KEY_INFO, &mut shared_key)
        .map_err(|e| SymbolError::MessageError(format!("hkdf expand failed: {e}")))?;
    Ok(shared_key)
}

/// Encrypts `text` for `recipient_public_key`, returning the full message
/// field (marker included).
pub fn encrypt_message(
    text: &str,
    sender: &KeyPair,
    recipient_public_key: &[u8; 32],
) -> Result<Vec<u8>, SymbolError> {
    let mut key = derive_shared_key(sender, recipient_public_key)?;
    let sealed = encryption::seal(text.as_bytes(), &key);
    key.zeroize();
    let sealed = sealed?;

    let mut body = Vec::with_capacity(TAG_SIZE + NONCE_SIZE + sealed.ciphertext.len());
    body.extend_from_slice(&sealed.tag);
    body.extend_from_slice(&sealed.nonce);
    body.extend_from_slice(&sealed.ciphertext);
    Ok(MessagePayload::Encrypted(body).to_bytes())
}

/// Decrypts the body of an encrypted message (bytes after the marker).
///
/// `other_public_key` is the counterparty: the sender when reading an
/// incoming message, the recipient when reading one we sent.
pub fn decrypt_message(
    body: &[u8],
    key_pair: &KeyPair,
    other_public_key: &[u8; 32],
) -> Result<String, SymbolError> {
    if body.len() < TAG_SIZE + NONCE_SIZE {
        return Err(SymbolError::MessageError(format!(
            "encrypted message too short: {} bytes",
            body.len()
        )));
    }
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&body[..TAG_SIZE]);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&body[TAG_SIZE..TAG_SIZE + NONCE_SIZE]);
    let sealed = SealedBox {
        nonce,
        ciphertext: body[TAG_SIZE + NONCE_SIZE..].to_vec(),
        tag,
    };

    let mut key = derive_shared_key(key_pair, other_public_key)?;
    let plaintext = encryption::open(&sealed, &key);
    key.zeroize();

    String::from_utf8(plaintext?)
        .map_err(|e| SymbolError::MessageError(format!("message is not utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> KeyPair {
        KeyPair::from_private_key(&[0x01; 32])
    }

    fn bob() -> KeyPair {
        KeyPair::from_private_key(&[0x02; 32])
    }

    #[test]
    fn shared_key_is_symmetric() {
        let (a, b) = (alice(), bob());
        let ab = derive_shared_key(&a, &b.public_key()).unwrap();
        let ba = derive_shared_key(&b, &a.public_key()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn encrypted_message_roundtrip_both_directions() {
        let (a, b) = (alice(), bob());
        let field = encrypt_message("meet at noon", &a, &b.public_key()).unwrap();
        assert_eq!(field[0], ENCRYPTED_MESSAGE_TYPE);
        assert_eq!(field.len(), 1 + TAG_SIZE + NONCE_SIZE + "meet at noon".len());

        let Some(MessagePayload::Encrypted(body)) = MessagePayload::from_bytes(&field).unwrap()
        else {
            panic!("expected encrypted payload");
        };
        assert_eq!(decrypt_message(&body, &b, &a.public_key()).unwrap(), "meet at noon");
        assert_eq!(decrypt_message(&body, &a, &b.public_key()).unwrap(), "meet at noon");
    }

    #[test]
    fn third_party_cannot_decrypt() {
        let (a, b) = (alice(), bob());
        let eve = KeyPair::from_private_key(&[0x03; 32]);
        let field = encrypt_message("secret", &a, &b.public_key()).unwrap();
        assert!(decrypt_message(&field[1..], &eve, &a.public_key()).is_err());
    }

    #[test]
    fn plain_message_bytes() {
        let payload = MessagePayload::Plain("hi".into());
        assert_eq!(payload.to_bytes(), vec![0x00, b'h', b'i']);
        assert_eq!(MessagePayload::from_bytes(&payload.to_bytes()).unwrap(), Some(payload));
    }

    #[test]
    fn empty_and_raw_fields() {
        assert_eq!(MessagePayload::from_bytes(&[]).unwrap(), None);
        assert_eq!(
            MessagePayload::from_bytes(&[0xfe, 1, 2]).unwrap(),
            Some(MessagePayload::Raw(vec![0xfe, 1, 2]))
        );
    }

    #[test]
    fn short_encrypted_body_is_rejected() {
        assert!(matches!(
            decrypt_message(&[0u8; 10], &alice(), &bob().public_key()),
            Err(SymbolError::MessageError(_))
        ));
    }
}
