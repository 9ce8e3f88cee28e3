use thiserror::Error;

/// NEM chain operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NemError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unknown network type: {0}")]
    UnknownNetwork(u8),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unsupported transaction type: 0x{0:04x}")]
    UnsupportedTransactionType(u32),
}
