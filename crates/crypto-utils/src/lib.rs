//! # crypto-utils
//!
//! Symmetric sealing, password key derivation and secret-handling
//! helpers shared by the chain crates and the wallet engine.

pub mod encryption;
pub mod error;
pub mod kdf;
pub mod random;
pub mod zeroizing;

pub use error::CryptoError;
