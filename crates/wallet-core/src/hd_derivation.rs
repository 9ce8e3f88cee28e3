use bip32::{DerivationPath, XPrv};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroize;

use crate::error::OperationError;
use crate::types::Protocol;

type HmacSha512 = Hmac<Sha512>;

const HARDENED: u32 = 0x8000_0000;

/// Account derivation path for `index` on a network.
///
/// - Symbol:   m/44'/4343'/{i}'/0'/0' (testnet coin 1')
/// - NEM:      m/44'/43'/{i}'/0'/0'   (testnet coin 1')
/// - Ethereum: m/44'/60'/0'/0/{i}     (non-mainnet coin 1')
pub fn derivation_path(
    protocol: Protocol,
    network_identifier: &str,
    index: u32,
) -> Result<String, OperationError> {
    // Rejects unknown networks up front.
    protocol.network_type(network_identifier)?;
    let mainnet = network_identifier == "mainnet";
    let path = match protocol {
        Protocol::Symbol if mainnet => format!("m/44'/4343'/{index}'/0'/0'"),
        Protocol::Nem if mainnet => format!("m/44'/43'/{index}'/0'/0'"),
        Protocol::Symbol | Protocol::Nem => format!("m/44'/1'/{index}'/0'/0'"),
        Protocol::Ethereum if mainnet => format!("m/44'/60'/0'/0/{index}"),
        Protocol::Ethereum => format!("m/44'/1'/0'/0/{index}"),
    };
    Ok(path)
}

/// Derive a secp256k1 private key from seed using BIP-32
pub fn derive_secp256k1_key(seed: &[u8], path: &str) -> Result<DerivedKey, OperationError> {
    let parsed: DerivationPath = path
        .parse()
        .map_err(|e: bip32::Error| OperationError::Validation(format!("bad path {path}: {e}")))?;

    let xprv = XPrv::derive_from_path(seed, &parsed)
        .map_err(|e| OperationError::Validation(format!("derivation failed: {e}")))?;

    Ok(DerivedKey {
        private_key: xprv.to_bytes().into(),
        derivation_path: path.to_owned(),
    })
}

/// Derive an Ed25519 private key from seed using SLIP-0010.
/// Every path component must be hardened.
pub fn derive_ed25519_key(seed: &[u8], path: &str) -> Result<DerivedKey, OperationError> {
    let components = parse_derivation_path(path)?;
    if let Some((index, _)) = components.iter().find(|(_, hardened)| !hardened) {
        return Err(OperationError::Validation(format!(
            "ed25519 derivation requires hardened components, got {index} in {path}"
        )));
    }

    // Master key: HMAC-SHA512(key="ed25519 seed", data=seed)
    let mut mac = HmacSha512::new_from_slice(b"ed25519 seed")
        .map_err(|e| OperationError::Validation(e.to_string()))?;
    mac.update(seed);
    let mut result = mac.finalize().into_bytes();

    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&result[..32]);
    chain_code.copy_from_slice(&result[32..]);
    result.as_mut_slice().zeroize();

    for (index, _) in components {
        let mut mac = HmacSha512::new_from_slice(&chain_code)
            .map_err(|e| OperationError::Validation(e.to_string()))?;
        // Hardened child: 0x00 || key || index (with hardened bit set)
        mac.update(&[0x00]);
        mac.update(&key);
        mac.update(&(index | HARDENED).to_be_bytes());
        let mut result = mac.finalize().into_bytes();

        key.copy_from_slice(&result[..32]);
        chain_code.copy_from_slice(&result[32..]);
        result.as_mut_slice().zeroize();
    }

    let derived = DerivedKey {
        private_key: key,
        derivation_path: path.to_owned(),
    };
    key.zeroize();
    chain_code.zeroize();
    Ok(derived)
}

/// Parse "m/44'/4343'/0'/0'/0'" into [(44, true), (4343, true), ...]
fn parse_derivation_path(path: &str) -> Result<Vec<(u32, bool)>, OperationError> {
    if path == "m" {
        return Ok(Vec::new());
    }
    let rest = path
        .strip_prefix("m/")
        .ok_or_else(|| OperationError::Validation(format!("path must start with m/: {path}")))?;

    rest.split('/')
        .map(|component| {
            let (digits, hardened) = match component
                .strip_suffix('\'')
                .or_else(|| component.strip_suffix('h'))
            {
                Some(digits) => (digits, true),
                None => (component, false),
            };
            let index = digits.parse::<u32>().map_err(|e| {
                OperationError::Validation(format!("invalid path component '{component}': {e}"))
            })?;
            if index >= HARDENED {
                return Err(OperationError::Validation(format!(
                    "path component {index} out of range"
                )));
            }
            Ok((index, hardened))
        })
        .collect()
}

/// A derived private key, wiped on drop.
pub struct DerivedKey {
    pub private_key: [u8; 32],
    pub derivation_path: String,
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}
