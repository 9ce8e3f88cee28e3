use chain_eth::error::EthError;
use chain_nem::error::NemError;
use chain_symbol::error::SymbolError;
use crypto_utils::error::CryptoError;
use thiserror::Error;

use crate::qr::QrType;
use crate::types::Protocol;

/// Every failure the wallet engine reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Malformed caller input (mnemonic, address, key, amount).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unsupported network or protocol setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{operation} is not supported on {protocol}")]
    Unsupported { protocol: Protocol, operation: String },

    /// An alias could not be resolved with the supplied maps.
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("network request failed{}: {message}", status_suffix(.status))]
    NetworkRequest {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    #[error("malformed QR payload: {0}")]
    QrParse(String),

    #[error("QR type mismatch: expected {expected:?}, got {actual:?}")]
    QrTypeMismatch { expected: QrType, actual: QrType },

    #[error("unsupported QR type {0}")]
    QrUnsupportedType(i64),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Discriminant of [`OperationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Configuration,
    Unsupported,
    UnresolvedReference,
    NetworkRequest,
    QrParse,
    QrTypeMismatch,
    QrUnsupportedType,
    Storage,
}

impl OperationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Validation(_) => ErrorKind::Validation,
            OperationError::Configuration(_) => ErrorKind::Configuration,
            OperationError::Unsupported { .. } => ErrorKind::Unsupported,
            OperationError::UnresolvedReference(_) => ErrorKind::UnresolvedReference,
            OperationError::NetworkRequest { .. } => ErrorKind::NetworkRequest,
            OperationError::QrParse(_) => ErrorKind::QrParse,
            OperationError::QrTypeMismatch { .. } => ErrorKind::QrTypeMismatch,
            OperationError::QrUnsupportedType(_) => ErrorKind::QrUnsupportedType,
            OperationError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn unsupported(protocol: Protocol, operation: impl Into<String>) -> Self {
        OperationError::Unsupported {
            protocol,
            operation: operation.into(),
        }
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        OperationError::NetworkRequest {
            status: None,
            code: None,
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl From<SymbolError> for OperationError {
    fn from(e: SymbolError) -> Self {
        match e {
            SymbolError::UnsupportedTransactionType(t) => {
                OperationError::unsupported(Protocol::Symbol, format!("transaction type 0x{t:04X}"))
            }
            other => OperationError::Validation(format!("symbol: {other}")),
        }
    }
}

impl From<EthError> for OperationError {
    fn from(e: EthError) -> Self {
        match e {
            EthError::UnsupportedChain(id) => {
                OperationError::Configuration(format!("unsupported ethereum chain {id}"))
            }
            EthError::UnsupportedTransactionType(t) => OperationError::unsupported(
                Protocol::Ethereum,
                format!("transaction type 0x{t:02x}"),
            ),
            other => OperationError::Validation(format!("ethereum: {other}")),
        }
    }
}

impl From<NemError> for OperationError {
    fn from(e: NemError) -> Self {
        match e {
            NemError::UnsupportedTransactionType(t) => {
                OperationError::unsupported(Protocol::Nem, format!("transaction type 0x{t:04x}"))
            }
            other => OperationError::Validation(format!("nem: {other}")),
        }
    }
}

impl From<CryptoError> for OperationError {
    fn from(e: CryptoError) -> Self {
        OperationError::Validation(e.to_string())
    }
}

impl From<bip39::Error> for OperationError {
    fn from(e: bip39::Error) -> Self {
        OperationError::Validation(format!("invalid mnemonic: {e}"))
    }
}

impl From<reqwest::Error> for OperationError {
    fn from(e: reqwest::Error) -> Self {
        OperationError::NetworkRequest {
            status: e.status().map(|s| s.as_u16()),
            code: None,
            message: e.to_string(),
        }
    }
}
