//! Multi-protocol wallet engine for Symbol, Ethereum and NEM.
//!
//! Key derivation, transaction encoding and signing, fee tiers, QR payloads
//! and node access live in their own modules. [`WalletStore`] ties them to a
//! persisted, observable wallet state.

pub mod config;
pub mod context;
pub mod deriver;
pub mod error;
pub mod fee;
pub mod hd_derivation;
pub mod logging;
pub mod mnemonic;
pub mod network;
pub mod protocol;
pub mod qr;
pub mod store;
pub mod types;

pub use config::WalletConfig;
pub use context::WalletContext;
pub use deriver::AccountDeriver;
pub use error::{ErrorKind, OperationError};
pub use fee::FeeCalculator;
pub use network::{create_adapter, NetworkAdapter};
pub use protocol::{codec_for, DecodeContext, EncodeContext, TransactionCodec};
pub use qr::{QrCode, QrCodec, QrPayload, QrType};
pub use store::{MemoryStorage, Storage, WalletStore};
pub use types::{
    PrivateAccount, Protocol, PublicAccount, SignedTransaction, Token, Transaction,
    TransactionKind,
};
