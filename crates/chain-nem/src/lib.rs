//! NEM (NIS1) chain support for the wallet engine.
//!
//! This crate provides:
//! - Keccak-512 flavoured Ed25519 key pairs, signing and verification
//! - NEM address derivation (Keccak-256 + RIPEMD-160, base32)
//! - Transfer transaction binary layout, hashing and signing
//! - The protocol fee schedule for transfers

pub mod address;
pub mod error;
pub mod fee;
pub mod keys;
pub mod network;
pub mod transaction;
