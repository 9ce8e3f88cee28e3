use aes_gcm::aead::{Aead, AeadInPlace, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce, Tag};

use crate::error::CryptoError;

/// AES-256-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-256-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Ciphertext with its nonce and tag kept apart, so callers can lay the
/// parts out in whatever order their wire format requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

/// Encrypts `plaintext` with a fresh random nonce.
///
/// Output layout: `[nonce (12) | ciphertext | tag (16)]`.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Reverses [`encrypt`].
pub fn decrypt(ciphertext_with_nonce: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext_with_nonce.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::InvalidInput(format!(
            "ciphertext too short: expected at least {} bytes, got {}",
            NONCE_SIZE + TAG_SIZE,
            ciphertext_with_nonce.len()
        )));
    }

    let (nonce_bytes, ciphertext) = ciphertext_with_nonce.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Seals `plaintext` under `key` with a random nonce, returning detached parts.
pub fn seal(plaintext: &[u8], key: &[u8; 32]) -> Result<SealedBox, CryptoError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    nonce_bytes.copy_from_slice(&nonce);
    seal_with_nonce(plaintext, key, &nonce_bytes)
}

/// Seals with a caller-chosen nonce. The nonce must never repeat for a key.
pub fn seal_with_nonce(
    plaintext: &[u8],
    key: &[u8; 32],
    nonce: &[u8; NONCE_SIZE],
) -> Result<SealedBox, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), b"", &mut buffer)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);
    Ok(SealedBox {
        nonce: *nonce,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Opens a [`SealedBox`], failing if the tag does not authenticate.
pub fn open(sealed: &SealedBox, key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut buffer = sealed.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&sealed.nonce),
            b"",
            &mut buffer,
            Tag::from_slice(&sealed.tag),
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
    Ok(buffer)
}
