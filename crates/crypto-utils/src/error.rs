use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
