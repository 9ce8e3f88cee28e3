use thiserror::Error;

/// Ethereum chain operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EthError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("unsupported transaction type: 0x{0:02x}")]
    UnsupportedTransactionType(u8),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(u64),
}

impl From<alloy_rlp::Error> for EthError {
    fn from(e: alloy_rlp::Error) -> Self {
        EthError::DecodingError(format!("rlp: {e}"))
    }
}
