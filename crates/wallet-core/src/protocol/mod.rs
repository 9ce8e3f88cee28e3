//! Canonical model ⇄ wire format, one codec per protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::OperationError;
use crate::types::{
    Cosignature, NetworkProperties, PrivateAccount, Protocol, PublicAccount, SignedTransaction,
    TokenInfo, Transaction, Wire, WireTransaction,
};

pub mod ethereum;
pub mod nem;
pub mod symbol;

pub use ethereum::EthereumCodec;
pub use nem::NemCodec;
pub use symbol::SymbolCodec;

/// Default validity window when a transaction carries no deadline.
pub const DEFAULT_DEADLINE_MS: u64 = 2 * 60 * 60 * 1000;

/// Inputs for encoding beyond the transaction itself.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub network: &'a NetworkProperties,
    /// Present when the result should be signed.
    pub signer: Option<&'a PrivateAccount>,
    /// Needed to encrypt a message.
    pub recipient_public_key: Option<&'a str>,
}

impl<'a> EncodeContext<'a> {
    pub fn new(network: &'a NetworkProperties) -> Self {
        Self {
            network,
            signer: None,
            recipient_public_key: None,
        }
    }

    pub fn signed_by(mut self, signer: &'a PrivateAccount) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_recipient_public_key(mut self, public_key: &'a str) -> Self {
        self.recipient_public_key = Some(public_key);
        self
    }
}

/// Lookup tables used to turn wire data back into canonical form.
///
/// Map keys are case-insensitive: token ids and namespace ids are stored
/// uppercase, addresses uppercase without dashes.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    pub network: NetworkProperties,
    pub current_account: Option<PublicAccount>,
    pub token_info: HashMap<String, TokenInfo>,
    /// Namespace id → token id.
    pub name_resolution: HashMap<String, String>,
    /// Namespace id → address.
    pub resolved_addresses: HashMap<String, String>,
    /// Address → public key, for reading messages we sent.
    pub recipient_public_keys: HashMap<String, String>,
    pub decryption_key: Option<PrivateAccount>,
}

impl DecodeContext {
    pub fn new(network: NetworkProperties) -> Self {
        Self {
            network,
            current_account: None,
            token_info: HashMap::new(),
            name_resolution: HashMap::new(),
            resolved_addresses: HashMap::new(),
            recipient_public_keys: HashMap::new(),
            decryption_key: None,
        }
    }

    pub fn add_token(&mut self, info: TokenInfo) {
        self.token_info.insert(lookup_key(&info.id), info);
    }

    pub fn add_token_alias(&mut self, namespace_id: &str, token_id: &str) {
        self.name_resolution
            .insert(lookup_key(namespace_id), token_id.to_owned());
    }

    pub fn add_address_alias(&mut self, namespace_id: &str, address: &str) {
        self.resolved_addresses
            .insert(lookup_key(namespace_id), address.to_owned());
    }

    pub fn add_recipient_public_key(&mut self, address: &str, public_key: &str) {
        self.recipient_public_keys
            .insert(lookup_key(address), public_key.to_owned());
    }

    /// Token metadata, falling back to the native currency.
    pub fn token(&self, id: &str) -> Option<TokenInfo> {
        if id.eq_ignore_ascii_case(&self.network.native_currency.id) {
            return Some(self.network.native_currency.token_info());
        }
        self.token_info.get(&lookup_key(id)).cloned()
    }

    pub fn resolve_token_alias(&self, namespace_id: &str) -> Option<&str> {
        self.name_resolution.get(&lookup_key(namespace_id)).map(String::as_str)
    }

    pub fn resolve_address_alias(&self, namespace_id: &str) -> Option<&str> {
        self.resolved_addresses
            .get(&lookup_key(namespace_id))
            .map(String::as_str)
    }

    pub fn recipient_public_key(&self, address: &str) -> Option<&str> {
        self.recipient_public_keys
            .get(&lookup_key(address))
            .map(String::as_str)
    }
}

pub(crate) fn lookup_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Ids a wire transaction refers to that may need fetching before decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub tokens: Vec<String>,
    /// Namespace ids (hex) used as addresses or token ids.
    pub aliases: Vec<String>,
}

impl References {
    pub fn merge(&mut self, other: References) {
        for token in other.tokens {
            if !self.tokens.contains(&token) {
                self.tokens.push(token);
            }
        }
        for alias in other.aliases {
            if !self.aliases.contains(&alias) {
                self.aliases.push(alias);
            }
        }
    }
}

pub trait TransactionCodec: Send + Sync {
    fn protocol(&self) -> Protocol;

    fn to_wire(&self, tx: &Transaction, ctx: &EncodeContext<'_>) -> Result<Wire, OperationError>;

    fn from_wire(
        &self,
        wire: &WireTransaction,
        ctx: &DecodeContext,
    ) -> Result<Transaction, OperationError>;

    fn references(&self, wire: &WireTransaction) -> Result<References, OperationError>;

    /// Signs the hash of an aggregate on behalf of a cosigner.
    fn cosign(
        &self,
        _aggregate_hash: &str,
        _signer: &PrivateAccount,
    ) -> Result<Cosignature, OperationError> {
        Err(OperationError::unsupported(self.protocol(), "cosignatures"))
    }

    /// Attaches cosignatures to a signed aggregate payload.
    fn add_cosignatures(
        &self,
        _payload: &[u8],
        _cosignatures: &[Cosignature],
        _network: &NetworkProperties,
    ) -> Result<SignedTransaction, OperationError> {
        Err(OperationError::unsupported(self.protocol(), "cosignatures"))
    }

    /// Encodes and signs, failing if no signer is supplied.
    fn sign(
        &self,
        tx: &Transaction,
        network: &NetworkProperties,
        signer: &PrivateAccount,
    ) -> Result<SignedTransaction, OperationError> {
        self.sign_with(tx, &EncodeContext::new(network).signed_by(signer))
    }

    fn sign_with(
        &self,
        tx: &Transaction,
        ctx: &EncodeContext<'_>,
    ) -> Result<SignedTransaction, OperationError> {
        match self.to_wire(tx, ctx)? {
            Wire::Signed(signed) => Ok(signed),
            Wire::Unsigned(_) => Err(OperationError::Validation("no signer supplied".into())),
        }
    }
}

pub fn codec_for(protocol: Protocol) -> Arc<dyn TransactionCodec> {
    match protocol {
        Protocol::Symbol => Arc::new(SymbolCodec),
        Protocol::Ethereum => Arc::new(EthereumCodec),
        Protocol::Nem => Arc::new(NemCodec),
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Resolves the signing public key from the signer and the transaction,
/// rejecting a mismatch between them.
pub(crate) fn resolve_signer_key(
    tx: &Transaction,
    signer: Option<&PrivateAccount>,
) -> Result<Option<String>, OperationError> {
    match (signer, tx.signer_public_key.as_deref()) {
        (Some(signer), Some(declared)) if !declared.eq_ignore_ascii_case(signer.public_key()) => {
            Err(OperationError::Validation(format!(
                "transaction signer {declared} does not match signing key {}",
                signer.public_key()
            )))
        }
        (Some(signer), _) => Ok(Some(signer.public_key().to_owned())),
        (None, declared) => Ok(declared.map(str::to_owned)),
    }
}

/// Checks `signer_address == derived` when the transaction declares one.
pub(crate) fn check_signer_address(tx: &Transaction, derived: &str) -> Result<(), OperationError> {
    if !tx.signer_address.is_empty() && lookup_key(&tx.signer_address) != lookup_key(derived) {
        return Err(OperationError::Validation(format!(
            "signer address {} does not belong to public key (expected {derived})",
            tx.signer_address
        )));
    }
    Ok(())
}

pub(crate) fn json_str<'a>(
    value: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, OperationError> {
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| OperationError::Validation(format!("missing string field '{field}'")))
}

/// Reads an unsigned integer sent either as a JSON number or a string.
pub(crate) fn json_u64(value: &serde_json::Value, field: &str) -> Result<u64, OperationError> {
    let raw = value
        .get(field)
        .ok_or_else(|| OperationError::Validation(format!("missing field '{field}'")))?;
    let parsed = match raw {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| OperationError::Validation(format!("field '{field}' is not an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountType, FeeMultipliers, NativeCurrency};
    use crypto_utils::zeroizing::ZeroizingString;

    fn network() -> NetworkProperties {
        NetworkProperties {
            protocol: Protocol::Symbol,
            node_url: "http://localhost:3000".into(),
            network_identifier: "testnet".into(),
            network_type: 152,
            generation_hash: None,
            epoch_adjustment: 0,
            chain_height: 0,
            fee_multipliers: FeeMultipliers::default(),
            base_fee_per_gas: None,
            native_currency: NativeCurrency {
                id: "72C0212E67A08BCE".into(),
                name: "symbol.xym".into(),
                divisibility: 6,
            },
        }
    }

    #[test]
    fn lookups_ignore_case_and_dashes() {
        let mut ctx = DecodeContext::new(network());
        ctx.add_address_alias("e74b99ba41f4afee", "TADDR");
        ctx.add_recipient_public_key("tabc-def", "PK");
        assert_eq!(ctx.resolve_address_alias("E74B99BA41F4AFEE"), Some("TADDR"));
        assert_eq!(ctx.recipient_public_key("TABCDEF"), Some("PK"));
        assert_eq!(ctx.token("72c0212e67a08bce").unwrap().name, "symbol.xym");
        assert!(ctx.token("1234").is_none());
    }

    #[test]
    fn signer_key_mismatch_is_rejected() {
        let signer = PrivateAccount::new(
            PublicAccount {
                address: "T".into(),
                public_key: "AA".into(),
                network_identifier: "testnet".into(),
                account_type: AccountType::External,
                index: None,
                name: String::new(),
            },
            ZeroizingString::from("00"),
        );
        let tx = Transaction {
            signer_public_key: Some("BB".into()),
            ..Default::default()
        };
        assert!(resolve_signer_key(&tx, Some(&signer)).is_err());
        let tx = Transaction {
            signer_public_key: Some("aa".into()),
            ..Default::default()
        };
        assert_eq!(resolve_signer_key(&tx, Some(&signer)).unwrap().as_deref(), Some("AA"));
    }

    #[test]
    fn references_merge_deduplicates() {
        let mut refs = References {
            tokens: vec!["A".into()],
            aliases: vec![],
        };
        refs.merge(References {
            tokens: vec!["A".into(), "B".into()],
            aliases: vec!["N".into()],
        });
        assert_eq!(refs.tokens, vec!["A", "B"]);
        assert_eq!(refs.aliases, vec!["N"]);
    }

    #[test]
    fn json_integers_accept_strings_and_numbers() {
        let value = serde_json::json!({"a": "42", "b": 7, "c": true});
        assert_eq!(json_u64(&value, "a").unwrap(), 42);
        assert_eq!(json_u64(&value, "b").unwrap(), 7);
        assert!(json_u64(&value, "c").is_err());
        assert!(json_str(&value, "a").is_ok());
        assert!(json_str(&value, "b").is_err());
    }
}
