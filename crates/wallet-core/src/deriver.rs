//! Deterministic account derivation and key import.

use crypto_utils::zeroizing::ZeroizingString;
use tracing::debug;
use zeroize::Zeroize;

use crate::error::OperationError;
use crate::hd_derivation::{self, DerivedKey};
use crate::mnemonic;
use crate::types::{AccountType, PrivateAccount, Protocol, PublicAccount};

/// Legacy path of the NEM opt-in key. Derived over secp256k1 even though
/// the resulting key is used with NEM's Ed25519 variant.
pub const OPT_IN_PATH: &str = "m/44'/43'/0'/0'/0'";

/// Turns mnemonics and raw keys into accounts for one protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountDeriver {
    protocol: Protocol,
}

impl AccountDeriver {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn generate_mnemonic(&self) -> Result<ZeroizingString, OperationError> {
        mnemonic::generate_mnemonic()
    }

    /// Private keys for `indexes`, in the protocol's hex form.
    pub fn derive_keys(
        &self,
        mnemonic: &str,
        indexes: &[u32],
        network_identifier: &str,
    ) -> Result<Vec<ZeroizingString>, OperationError> {
        let seed = mnemonic::mnemonic_to_seed(mnemonic, "")?;
        indexes
            .iter()
            .map(|&index| {
                let path = hd_derivation::derivation_path(self.protocol, network_identifier, index)?;
                let key = self.derive_at(&seed, &path)?;
                Ok(self.encode_private_key(&key.private_key))
            })
            .collect()
    }

    pub fn derive_account(
        &self,
        mnemonic: &str,
        index: u32,
        network_identifier: &str,
        name: &str,
    ) -> Result<PrivateAccount, OperationError> {
        let mut keys = self.derive_keys(mnemonic, &[index], network_identifier)?;
        let private_key = keys
            .pop()
            .ok_or_else(|| OperationError::Validation("no key derived".into()))?;
        let public_key = self.public_key_from_private_key(&private_key)?;
        let account = self.public_account(
            &public_key,
            network_identifier,
            AccountType::Mnemonic,
            Some(index),
            name,
        )?;
        debug!(protocol = %self.protocol, index, address = %account.address, "derived account");
        Ok(PrivateAccount::new(account, private_key))
    }

    /// Wraps an externally supplied private key.
    pub fn import_private_key(
        &self,
        private_key: &str,
        network_identifier: &str,
        name: &str,
    ) -> Result<PrivateAccount, OperationError> {
        let mut bytes = parse_private_key(self.protocol, private_key)?;
        let normalized = self.encode_private_key(&bytes);
        bytes.zeroize();
        let public_key = self.public_key_from_private_key(&normalized)?;
        let account = self.public_account(
            &public_key,
            network_identifier,
            AccountType::External,
            None,
            name,
        )?;
        Ok(PrivateAccount::new(account, normalized))
    }

    /// Builds a public account, deriving its address from `public_key`.
    pub fn public_account(
        &self,
        public_key: &str,
        network_identifier: &str,
        account_type: AccountType,
        index: Option<u32>,
        name: &str,
    ) -> Result<PublicAccount, OperationError> {
        Ok(PublicAccount {
            address: self.address_from_public_key(public_key, network_identifier)?,
            public_key: self.normalize_public_key(public_key)?,
            network_identifier: network_identifier.to_owned(),
            account_type,
            index,
            name: name.to_owned(),
        })
    }

    pub fn public_key_from_private_key(&self, private_key: &str) -> Result<String, OperationError> {
        let mut bytes = parse_private_key(self.protocol, private_key)?;
        let public_key = match self.protocol {
            Protocol::Symbol => Ok(hex::encode_upper(
                chain_symbol::keys::KeyPair::from_private_key(&bytes).public_key(),
            )),
            Protocol::Nem => Ok(hex::encode_upper(
                chain_nem::keys::KeyPair::from_private_key(&bytes).public_key(),
            )),
            Protocol::Ethereum => chain_eth::address::public_key_from_private_key(&bytes)
                .map(|k| format!("0x{}", hex::encode(k)))
                .map_err(OperationError::from),
        };
        bytes.zeroize();
        public_key
    }

    pub fn address_from_public_key(
        &self,
        public_key: &str,
        network_identifier: &str,
    ) -> Result<String, OperationError> {
        let network_type = self.protocol.network_type(network_identifier)?;
        let address = match self.protocol {
            Protocol::Symbol => {
                let key = chain_symbol::keys::parse_key_hex(public_key)?;
                let network = chain_symbol::network::NetworkType::from_byte(network_type as u8)?;
                chain_symbol::address::Address::from_public_key(&key, network).encode()
            }
            Protocol::Nem => {
                let key = chain_nem::keys::parse_public_key(public_key)?;
                let network = chain_nem::network::NetworkType::from_byte(network_type as u8)?;
                chain_nem::address::Address::from_public_key(&key, network).encode()
            }
            Protocol::Ethereum => {
                let bytes = hex::decode(strip_0x(public_key))
                    .map_err(|e| OperationError::Validation(format!("invalid public key: {e}")))?;
                chain_eth::address::address_from_public_key(&bytes)?
            }
        };
        Ok(address)
    }

    /// `true` when `address` is well formed for the given network.
    pub fn validate_address(&self, address: &str, network_identifier: &str) -> bool {
        let Ok(network_type) = self.protocol.network_type(network_identifier) else {
            return false;
        };
        match self.protocol {
            Protocol::Symbol => chain_symbol::network::NetworkType::from_byte(network_type as u8)
                .map(|n| chain_symbol::address::validate_address(address, n))
                .unwrap_or(false),
            Protocol::Nem => chain_nem::address::Address::parse(address)
                .and_then(|a| a.network())
                .map(|n| u64::from(n.as_byte()) == network_type)
                .unwrap_or(false),
            Protocol::Ethereum => chain_eth::address::validate_address(address).unwrap_or(false),
        }
    }

    fn derive_at(&self, seed: &[u8], path: &str) -> Result<DerivedKey, OperationError> {
        match self.protocol {
            Protocol::Symbol | Protocol::Nem => hd_derivation::derive_ed25519_key(seed, path),
            Protocol::Ethereum => hd_derivation::derive_secp256k1_key(seed, path),
        }
    }

    fn encode_private_key(&self, key: &[u8; 32]) -> ZeroizingString {
        match self.protocol {
            Protocol::Symbol | Protocol::Nem => ZeroizingString::new(hex::encode_upper(key)),
            Protocol::Ethereum => ZeroizingString::new(format!("0x{}", hex::encode(key))),
        }
    }

    fn normalize_public_key(&self, public_key: &str) -> Result<String, OperationError> {
        match self.protocol {
            Protocol::Symbol | Protocol::Nem => {
                let key = chain_symbol::keys::parse_key_hex(public_key)?;
                Ok(hex::encode_upper(key))
            }
            Protocol::Ethereum => Ok(format!("0x{}", strip_0x(public_key).to_ascii_lowercase())),
        }
    }
}

/// Derives the legacy opt-in key and returns it only when its NEM public
/// key appears in `allow_list`. `None` is the normal outcome for wallets
/// that never took part in the opt-in.
pub fn derive_opt_in_key(
    mnemonic: &str,
    allow_list: &[String],
) -> Result<Option<ZeroizingString>, OperationError> {
    let seed = mnemonic::mnemonic_to_seed(mnemonic, "")?;
    let key = hd_derivation::derive_secp256k1_key(&seed, OPT_IN_PATH)?;
    let nem_key = chain_nem::keys::KeyPair::from_private_key(&key.private_key);
    let public_key = hex::encode_upper(nem_key.public_key());

    if allow_list.iter().any(|allowed| allowed.eq_ignore_ascii_case(&public_key)) {
        Ok(Some(ZeroizingString::new(hex::encode_upper(key.private_key))))
    } else {
        Ok(None)
    }
}

pub(crate) fn parse_private_key(protocol: Protocol, private_key: &str) -> Result<[u8; 32], OperationError> {
    let trimmed = match protocol {
        Protocol::Ethereum => strip_0x(private_key),
        Protocol::Nem if private_key.len() == 66 && private_key.starts_with("00") => &private_key[2..],
        _ => private_key,
    };
    if trimmed.len() != 64 {
        return Err(OperationError::Validation(format!(
            "private key must be 64 hex characters, got {}",
            trimmed.len()
        )));
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(trimmed, &mut bytes)
        .map_err(|e| OperationError::Validation(format!("invalid private key: {e}")))?;
    Ok(bytes)
}

pub(crate) fn strip_0x(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}
