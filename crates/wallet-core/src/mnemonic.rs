use bip39::{Language, Mnemonic};
use crypto_utils::zeroizing::{ZeroizingBytes, ZeroizingString};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::OperationError;

/// Generate a new 24-word BIP-39 mnemonic (256 bits of entropy)
pub fn generate_mnemonic() -> Result<ZeroizingString, OperationError> {
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy);
    entropy.zeroize();
    Ok(ZeroizingString::new(mnemonic?.to_string()))
}

/// Validate a mnemonic phrase (word list and checksum)
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// Derive the 64-byte seed from a mnemonic and optional passphrase
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<ZeroizingBytes, OperationError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)?;
    let mut seed = mnemonic.to_seed(passphrase);
    let out = ZeroizingBytes::new(seed.to_vec());
    seed.zeroize();
    Ok(out)
}

/// Validate a single word against the BIP-39 word list
pub fn is_valid_word(word: &str) -> bool {
    Language::English.find_word(word).is_some()
}
