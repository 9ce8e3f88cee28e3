//! Canonical, protocol-agnostic wallet model.
//!
//! Amounts are always relative (human) decimals here. Absolute integers only
//! appear as [`RawToken`] at the codec boundary.

use std::fmt;

use crypto_utils::zeroizing::ZeroizingString;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::OperationError;

const MAX_DIVISIBILITY: u8 = 28;

// ---------------------------------------------------------------------------
// Protocols and networks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Symbol,
    Ethereum,
    Nem,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Symbol, Protocol::Ethereum, Protocol::Nem];

    /// Maps an on-chain network type (Symbol/NEM network byte, Ethereum
    /// chain id) to its wallet identifier.
    pub fn network_identifier(self, network_type: u64) -> Result<&'static str, OperationError> {
        let unknown = || {
            OperationError::Configuration(format!("unknown {self} network type {network_type}"))
        };
        match self {
            Protocol::Symbol => {
                let byte = u8::try_from(network_type).map_err(|_| unknown())?;
                chain_symbol::network::NetworkType::from_byte(byte)
                    .map(|n| n.identifier())
                    .map_err(|_| unknown())
            }
            Protocol::Ethereum => chain_eth::chains::network_by_chain_id(network_type)
                .map(|n| n.identifier)
                .map_err(|_| unknown()),
            Protocol::Nem => {
                let byte = u8::try_from(network_type).map_err(|_| unknown())?;
                chain_nem::network::NetworkType::from_byte(byte)
                    .map(|n| n.identifier())
                    .map_err(|_| unknown())
            }
        }
    }

    /// Inverse of [`Protocol::network_identifier`].
    pub fn network_type(self, identifier: &str) -> Result<u64, OperationError> {
        let network_type = match self {
            Protocol::Symbol => chain_symbol::network::NetworkType::from_identifier(identifier)
                .map(|n| u64::from(n.as_byte())),
            Protocol::Ethereum => {
                chain_eth::chains::network_by_identifier(identifier).map(|n| n.chain_id)
            }
            Protocol::Nem => chain_nem::network::NetworkType::from_identifier(identifier)
                .map(|n| u64::from(n.as_byte())),
        };
        network_type.ok_or_else(|| {
            OperationError::Configuration(format!("unknown {self} network '{identifier}'"))
        })
    }

    pub fn network_identifiers(self) -> &'static [&'static str] {
        match self {
            Protocol::Symbol | Protocol::Nem => &["mainnet", "testnet"],
            Protocol::Ethereum => &["mainnet", "erigon_local", "sepolia"],
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Symbol => "symbol",
            Protocol::Ethereum => "ethereum",
            Protocol::Nem => "nem",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub id: String,
    pub name: String,
    pub divisibility: u8,
}

impl NativeCurrency {
    pub fn token_info(&self) -> TokenInfo {
        TokenInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            divisibility: self.divisibility,
        }
    }
}

/// Per-byte multipliers (Symbol) or priority fees per gas in wei (Ethereum).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeMultipliers {
    pub min: u64,
    pub average: u64,
    pub highest: u64,
}

/// A snapshot of node-reported network state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProperties {
    pub protocol: Protocol,
    pub node_url: String,
    pub network_identifier: String,
    pub network_type: u64,
    pub generation_hash: Option<String>,
    /// Seconds between the Unix epoch and the network epoch.
    pub epoch_adjustment: u64,
    pub chain_height: u64,
    pub fee_multipliers: FeeMultipliers,
    pub base_fee_per_gas: Option<u64>,
    pub native_currency: NativeCurrency,
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    pub name: String,
    pub divisibility: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub name: String,
    pub amount: Decimal,
    pub divisibility: u8,
}

impl Token {
    pub fn new(info: &TokenInfo, amount: Decimal) -> Self {
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            amount,
            divisibility: info.divisibility,
        }
    }

    pub fn from_absolute(info: &TokenInfo, absolute_amount: u128) -> Result<Self, OperationError> {
        Ok(Self::new(
            info,
            absolute_to_relative(absolute_amount, info.divisibility)?,
        ))
    }

    pub fn absolute_amount(&self) -> Result<u128, OperationError> {
        relative_to_absolute(self.amount, self.divisibility)
    }

    pub fn to_raw(&self) -> Result<RawToken, OperationError> {
        Ok(RawToken {
            id: self.id.clone(),
            absolute_amount: self.absolute_amount()?,
        })
    }
}

/// An absolute on-chain quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawToken {
    pub id: String,
    pub absolute_amount: u128,
}

/// `amount * 10^divisibility`, rejecting fractions the token cannot carry.
pub fn relative_to_absolute(amount: Decimal, divisibility: u8) -> Result<u128, OperationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(OperationError::Validation(format!("negative amount {amount}")));
    }
    let factor = power_of_ten(divisibility)?;
    let scaled = amount
        .checked_mul(factor)
        .ok_or_else(|| OperationError::Validation(format!("amount {amount} overflows")))?;
    if !scaled.fract().is_zero() {
        return Err(OperationError::Validation(format!(
            "amount {amount} has more than {divisibility} decimal places"
        )));
    }
    scaled
        .to_u128()
        .ok_or_else(|| OperationError::Validation(format!("amount {amount} out of range")))
}

pub fn absolute_to_relative(absolute: u128, divisibility: u8) -> Result<Decimal, OperationError> {
    if divisibility > MAX_DIVISIBILITY {
        return Err(OperationError::Validation(format!(
            "divisibility {divisibility} exceeds {MAX_DIVISIBILITY}"
        )));
    }
    let mantissa = i128::try_from(absolute)
        .map_err(|_| OperationError::Validation(format!("amount {absolute} out of range")))?;
    Decimal::try_from_i128_with_scale(mantissa, u32::from(divisibility))
        .map_err(|e| OperationError::Validation(format!("amount {absolute} out of range: {e}")))
}

fn power_of_ten(divisibility: u8) -> Result<Decimal, OperationError> {
    if divisibility > MAX_DIVISIBILITY {
        return Err(OperationError::Validation(format!(
            "divisibility {divisibility} exceeds {MAX_DIVISIBILITY}"
        )));
    }
    Decimal::try_from_i128_with_scale(10i128.pow(u32::from(divisibility)), 0)
        .map_err(|e| OperationError::Validation(e.to_string()))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Mnemonic,
    External,
}

/// Public half of a wallet account.
///
/// Built through [`crate::deriver`], which derives `address` from
/// `public_key`; never construct one with an unrelated address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAccount {
    pub address: String,
    pub public_key: String,
    pub network_identifier: String,
    pub account_type: AccountType,
    pub index: Option<u32>,
    pub name: String,
}

/// An account together with its private key.
#[derive(Clone)]
pub struct PrivateAccount {
    pub account: PublicAccount,
    private_key: ZeroizingString,
}

impl PrivateAccount {
    pub(crate) fn new(account: PublicAccount, private_key: ZeroizingString) -> Self {
        Self {
            account,
            private_key,
        }
    }

    /// Uppercase hex private key.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn address(&self) -> &str {
        &self.account.address
    }

    pub fn public_key(&self) -> &str {
        &self.account.public_key
    }
}

impl fmt::Debug for PrivateAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateAccount")
            .field("account", &self.account)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestingKeys {
    pub linked: Option<String>,
    pub node: Option<String>,
    pub vrf: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: String,
    pub public_key: Option<String>,
    pub tokens: Vec<Token>,
    pub importance: Option<Decimal>,
    pub nonce: Option<u64>,
    pub harvesting_keys: HarvestingKeys,
}

impl AccountInfo {
    /// An account the chain has never seen.
    pub fn empty(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            public_key: None,
            tokens: Vec::new(),
            importance: None,
            nonce: None,
            harvesting_keys: HarvestingKeys::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    #[default]
    Transfer,
    AggregateComplete,
    AggregateBonded,
    HarvestReward,
}

impl TransactionKind {
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            TransactionKind::AggregateComplete | TransactionKind::AggregateBonded
        )
    }
}

/// Plaintext message. Encryption happens only at the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub encrypted: bool,
}

impl Message {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            encrypted: false,
        }
    }

    pub fn encrypted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            encrypted: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gas {
    pub limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cosignature {
    pub signer_public_key: String,
    pub signature: String,
}

/// Canonical transaction.
///
/// `deadline` and `timestamp` are Unix milliseconds. `nonce` and `gas` only
/// apply to gas-priced protocols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub signer_public_key: Option<String>,
    pub signer_address: String,
    pub recipient_address: Option<String>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    pub fee: Option<Token>,
    pub deadline: Option<u64>,
    pub timestamp: Option<u64>,
    pub height: Option<u64>,
    pub hash: Option<String>,
    pub message: Option<Message>,
    #[serde(default)]
    pub inner_transactions: Vec<Transaction>,
    #[serde(default)]
    pub cosignatures: Vec<Cosignature>,
    pub aggregate_hash: Option<String>,
    pub nonce: Option<u64>,
    pub gas: Option<Gas>,
}

impl Transaction {
    /// Copy without the fields a chain assigns (hash, height, timestamp,
    /// aggregate hash), with cosignatures in signer order.
    pub fn without_chain_metadata(&self) -> Transaction {
        let mut cosignatures = self.cosignatures.clone();
        cosignatures.sort_by(|a, b| {
            a.signer_public_key
                .to_ascii_uppercase()
                .cmp(&b.signer_public_key.to_ascii_uppercase())
        });
        Transaction {
            hash: None,
            height: None,
            timestamp: None,
            aggregate_hash: None,
            inner_transactions: self
                .inner_transactions
                .iter()
                .map(Transaction::without_chain_metadata)
                .collect(),
            cosignatures,
            ..self.clone()
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }
}

/// Output of a signing encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub wire_payload: Vec<u8>,
    /// Protocol hash of the payload in the protocol's usual hex form.
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wire {
    Signed(SignedTransaction),
    Unsigned(Vec<u8>),
}

/// What a node hands back: raw bytes or a REST/explorer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "snake_case")]
pub enum WireTransaction {
    Payload(Vec<u8>),
    Dto(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFee {
    pub token: Token,
    pub gas: Option<Gas>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    Slow,
    Medium,
    Fast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFeeTiers {
    pub slow: TransactionFee,
    pub medium: TransactionFee,
    pub fast: TransactionFee,
}

impl TransactionFeeTiers {
    pub fn tier(&self, tier: FeeTier) -> &TransactionFee {
        match tier {
            FeeTier::Slow => &self.slow,
            FeeTier::Medium => &self.medium,
            FeeTier::Fast => &self.fast,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionGroup {
    #[default]
    Confirmed,
    Unconfirmed,
    Partial,
}

impl TransactionGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionGroup::Confirmed => "confirmed",
            TransactionGroup::Unconfirmed => "unconfirmed",
            TransactionGroup::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionCriteria {
    pub address: String,
    pub group: TransactionGroup,
    pub page_number: u32,
    pub page_size: u32,
    /// Continuation token for cursor-paged nodes (NIS1 transaction id).
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub is_last_page: bool,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty(page_number: u32) -> Self {
        Self {
            items: Vec::new(),
            page_number,
            is_last_page: true,
            next_cursor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestedBlock {
    pub height: u64,
    pub amount: Token,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub address: String,
    pub name: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_black_listed: bool,
}

/// Target of a Symbol namespace alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    Address(String),
    Token(String),
    None,
}
