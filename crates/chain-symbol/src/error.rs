use thiserror::Error;

/// Symbol chain operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
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
    UnsupportedTransactionType(u16),

    #[error("message error: {0}")]
    MessageError(String),
}

impl From<crypto_utils::CryptoError> for SymbolError {
    fn from(e: crypto_utils::CryptoError) -> Self {
        SymbolError::MessageError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unsupported_type_is_hex() {
        let err = SymbolError::UnsupportedTransactionType(0x414e);
        assert_eq!(err.to_string(), "unsupported transaction type: 0x414e");
    }

    #[test]
    fn display_unknown_network() {
        assert_eq!(SymbolError::UnknownNetwork(7).to_string(), "unknown network type: 7");
    }
}
