//! EIP-1559 (type 2) transactions.
//!
//! ```text
//! unsigned: 0x02 || rlp([chain_id, nonce, max_priority_fee_per_gas,
//!                        max_fee_per_gas, gas_limit, to, value, data,
//!                        access_list])
//! signed:   0x02 || rlp([...unsigned fields, y_parity, r, s])
//! hash:     keccak256(signed)
//! ```

use alloy_rlp::{Decodable, Encodable, Header, RlpEncodable};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::address::{self, parse_address};
use crate::erc20;
use crate::error::EthError;

pub const EIP1559_TX_TYPE: u8 = 0x02;

/// An unsigned EIP-1559 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    /// Recipient (or token contract) as a 0x-prefixed hex string.
    pub to: String,
    /// Native value in wei.
    pub value: u128,
    pub data: Vec<u8>,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEthTransaction {
    /// `0x02 || rlp(signed fields)`.
    pub raw_tx: Vec<u8>,
    pub tx_hash: [u8; 32],
}

impl SignedEthTransaction {
    pub fn tx_hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.tx_hash))
    }
}

/// Result of decoding a signed raw transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEthTransaction {
    pub transaction: EthTransaction,
    /// EIP-55 address recovered from the signature.
    pub signer: String,
    /// Compressed SEC1 key recovered from the signature.
    pub signer_public_key: [u8; 33],
    pub tx_hash: [u8; 32],
}

/// Gas and pricing fields shared by every builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Native ETH transfer. `memo` becomes the calldata.
pub fn build_transfer(
    chain_id: u64,
    nonce: u64,
    to: &str,
    value_wei: u128,
    gas: GasParams,
    memo: &[u8],
) -> Result<EthTransaction, EthError> {
    parse_address(to)?;
    Ok(EthTransaction {
        chain_id,
        nonce,
        max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
        max_fee_per_gas: gas.max_fee_per_gas,
        gas_limit: gas.gas_limit,
        to: address::checksum_address(to)?,
        value: value_wei,
        data: memo.to_vec(),
    })
}

/// ERC-20 `transfer` call. `memo` is appended after the ABI arguments.
pub fn build_erc20_transfer(
    chain_id: u64,
    nonce: u64,
    token_contract: &str,
    to: &str,
    amount: u128,
    gas: GasParams,
    memo: &[u8],
) -> Result<EthTransaction, EthError> {
    parse_address(token_contract)?;
    let mut data = erc20::encode_transfer(to, amount)?;
    data.extend_from_slice(memo);

    Ok(EthTransaction {
        chain_id,
        nonce,
        max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
        max_fee_per_gas: gas.max_fee_per_gas,
        gas_limit: gas.gas_limit,
        to: address::checksum_address(token_contract)?,
        value: 0,
        data,
    })
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

/// Signs `keccak256(0x02 || rlp(unsigned))` and assembles the raw bytes.
pub fn sign_transaction(
    tx: &EthTransaction,
    private_key: &[u8; 32],
) -> Result<SignedEthTransaction, EthError> {
    let msg_hash = Keccak256::digest(encode_unsigned_tx(tx)?);

    let signing_key = address::signing_key(private_key)?;
    let (signature, recovery_id): (Signature, RecoveryId) = signing_key
        .sign_prehash(msg_hash.as_slice())
        .map_err(|e| EthError::SigningError(e.to_string()))?;

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&signature.r().to_bytes());
    s.copy_from_slice(&signature.s().to_bytes());

    let fields = SignedTxFields {
        chain_id: tx.chain_id,
        nonce: tx.nonce,
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        max_fee_per_gas: tx.max_fee_per_gas,
        gas_limit: tx.gas_limit,
        to: RlpAddress(parse_address(&tx.to)?),
        value: tx.value,
        data: RlpBytes(tx.data.clone()),
        access_list: EmptyList,
        signature_y_parity: recovery_id.is_y_odd() as u8,
        signature_r: RlpU256(r),
        signature_s: RlpU256(s),
    };

    let raw_tx = with_type_prefix(&fields);
    let tx_hash = Keccak256::digest(&raw_tx).into();
    Ok(SignedEthTransaction { raw_tx, tx_hash })
}

/// `0x02 || rlp(unsigned fields)`, the signing preimage.
pub fn encode_unsigned_tx(tx: &EthTransaction) -> Result<Vec<u8>, EthError> {
    let fields = UnsignedTxFields {
        chain_id: tx.chain_id,
        nonce: tx.nonce,
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        max_fee_per_gas: tx.max_fee_per_gas,
        gas_limit: tx.gas_limit,
        to: RlpAddress(parse_address(&tx.to)?),
        value: tx.value,
        data: RlpBytes(tx.data.clone()),
        access_list: EmptyList,
    };
    Ok(with_type_prefix(&fields))
}

fn with_type_prefix<T: Encodable>(fields: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + fields.length());
    out.push(EIP1559_TX_TYPE);
    fields.encode(&mut out);
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes a signed type-2 transaction and recovers its signer.
///
/// Transactions with a non-empty access list or contract creation (empty
/// `to`) are rejected.
pub fn decode_signed_transaction(raw: &[u8]) -> Result<DecodedEthTransaction, EthError> {
    let (&tx_type, rest) = raw
        .split_first()
        .ok_or_else(|| EthError::DecodingError("empty transaction".into()))?;
    if tx_type != EIP1559_TX_TYPE {
        return Err(EthError::UnsupportedTransactionType(tx_type));
    }

    let buf = &mut &rest[..];
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(EthError::DecodingError("expected an rlp list".into()));
    }
    if header.payload_length != buf.len() {
        return Err(EthError::DecodingError(format!(
            "list length {} does not match remaining {} bytes",
            header.payload_length,
            buf.len()
        )));
    }

    let chain_id = u64::decode(buf)?;
    let nonce = u64::decode(buf)?;
    let max_priority_fee_per_gas = u128::decode(buf)?;
    let max_fee_per_gas = u128::decode(buf)?;
    let gas_limit = u64::decode(buf)?;
    let to = decode_string(buf)?;
    if to.len() != 20 {
        return Err(EthError::DecodingError(format!(
            "expected a 20-byte recipient, got {} bytes",
            to.len()
        )));
    }
    let mut to_bytes = [0u8; 20];
    to_bytes.copy_from_slice(to);
    let value = u128::decode(buf)?;
    let data = decode_string(buf)?.to_vec();

    let access_list = Header::decode(buf)?;
    if !access_list.list || access_list.payload_length != 0 {
        return Err(EthError::DecodingError("access lists are not supported".into()));
    }

    let y_parity = u8::decode(buf)?;
    let r = decode_word(buf)?;
    let s = decode_word(buf)?;
    if !buf.is_empty() {
        return Err(EthError::DecodingError(format!("{} trailing bytes", buf.len())));
    }

    let transaction = EthTransaction {
        chain_id,
        nonce,
        max_priority_fee_per_gas,
        max_fee_per_gas,
        gas_limit,
        to: address::checksum_bytes(&to_bytes),
        value,
        data,
    };

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&r);
    rs[32..].copy_from_slice(&s);
    let signature =
        Signature::from_slice(&rs).map_err(|e| EthError::SigningError(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(y_parity)
        .filter(|_| y_parity <= 1)
        .ok_or_else(|| EthError::DecodingError(format!("invalid y parity {y_parity}")))?;

    let msg_hash = Keccak256::digest(encode_unsigned_tx(&transaction)?);
    let key = VerifyingKey::recover_from_prehash(&msg_hash, &signature, recovery_id)
        .map_err(|e| EthError::SigningError(format!("signer recovery failed: {e}")))?;

    let mut signer_public_key = [0u8; 33];
    signer_public_key.copy_from_slice(key.to_encoded_point(true).as_bytes());

    Ok(DecodedEthTransaction {
        transaction,
        signer: address::address_from_verifying_key(&key),
        signer_public_key,
        tx_hash: Keccak256::digest(raw).into(),
    })
}

fn decode_string<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], EthError> {
    let header = Header::decode(buf)?;
    if header.list {
        return Err(EthError::DecodingError("expected an rlp string".into()));
    }
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort.into());
    }
    let (value, rest) = buf.split_at(header.payload_length);
    *buf = rest;
    Ok(value)
}

fn decode_word(buf: &mut &[u8]) -> Result<[u8; 32], EthError> {
    let bytes = decode_string(buf)?;
    if bytes.len() > 32 {
        return Err(EthError::DecodingError("integer exceeds 256 bits".into()));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(word)
}

// ---------------------------------------------------------------------------
// RLP-encodable structures
// ---------------------------------------------------------------------------

#[derive(RlpEncodable)]
struct UnsignedTxFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: RlpAddress,
    value: u128,
    data: RlpBytes,
    access_list: EmptyList,
}

#[derive(RlpEncodable)]
struct SignedTxFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: RlpAddress,
    value: u128,
    data: RlpBytes,
    access_list: EmptyList,
    signature_y_parity: u8,
    signature_r: RlpU256,
    signature_s: RlpU256,
}

/// 20-byte address encoded as an rlp string.
struct RlpAddress([u8; 20]);

impl Encodable for RlpAddress {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        self.0.as_slice().length()
    }
}

/// Arbitrary bytes encoded as an rlp string (never as a list of bytes).
struct RlpBytes(Vec<u8>);

impl Encodable for RlpBytes {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        self.0.as_slice().length()
    }
}

/// The always-empty access list (`0xc0`).
struct EmptyList;

impl Encodable for EmptyList {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        Header {
            list: true,
            payload_length: 0,
        }
        .encode(out);
    }

    fn length(&self) -> usize {
        1
    }
}

/// Big-endian 256-bit integer with leading zeros stripped.
struct RlpU256([u8; 32]);

impl RlpU256 {
    fn trimmed(&self) -> &[u8] {
        let start = self.0.iter().position(|&b| b != 0).unwrap_or(32);
        &self.0[start..]
    }
}

impl Encodable for RlpU256 {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.trimmed().encode(out);
    }

    fn length(&self) -> usize {
        self.trimmed().length()
    }
}
