//! Symbol chain support for the wallet engine.
//!
//! This crate provides:
//! - Ed25519 key pairs and Symbol address derivation (SHA3-256 + RIPEMD-160, base32)
//! - Namespace id generation and alias (unresolved) addresses
//! - Hand-built binary layout for transfer and aggregate transactions,
//!   including embedded transactions, cosignatures and the merkle transactions hash
//! - Transaction signing and hashing against a network generation hash
//! - Encrypted transfer messages (X25519-style shared key, AES-256-GCM)

pub mod address;
pub mod error;
pub mod keys;
pub mod message;
pub mod namespace;
pub mod network;
pub mod transaction;
