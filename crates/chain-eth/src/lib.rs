//! Ethereum chain support for the wallet engine.
//!
//! This crate provides:
//! - Ethereum address derivation from secp256k1 keys (with EIP-55 checksums)
//! - EIP-1559 transaction building, signing, decoding and signer recovery
//! - ERC-20 `transfer` / `balanceOf` calldata encoding and decoding
//! - The table of supported networks (chain id <-> identifier)
//! - Minimal ABI word encoding

pub mod abi;
pub mod address;
pub mod chains;
pub mod erc20;
pub mod error;
pub mod transaction;
