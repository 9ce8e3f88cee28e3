//! Symbol transaction binary layout, signing and hashing.
//!
//! All integers are little-endian.
//!
//! ```text
//! Header (128 bytes):
//!   size                    u32
//!   reserved                u32
//!   signature               64 bytes
//!   signer_public_key       32 bytes
//!   reserved                u32
//!   version                 u8
//!   network                 u8
//!   type                    u16
//!   max_fee                 u64
//!   deadline                u64
//!
//! Transfer body (0x4154, v1):
//!   recipient_address       24 bytes
//!   message_size            u16
//!   mosaics_count           u8
//!   reserved                u8 + u32
//!   mosaics[]               (id u64, amount u64), ascending id
//!   message                 u8 * message_size
//!
//! Aggregate body (0x4141 complete / 0x4241 bonded, v2):
//!   transactions_hash       32 bytes
//!   payload_size            u32
//!   reserved                u32
//!   transactions[]          embedded, each padded to 8 bytes
//!   cosignatures[]          (version u64, signer 32, signature 64)
//!
//! Embedded header (48 bytes):
//!   size                    u32
//!   reserved                u32
//!   signer_public_key       32 bytes
//!   reserved                u32
//!   version                 u8
//!   network                 u8
//!   type                    u16
//! ```

use sha3::{Digest, Sha3_256};

use crate::address::{Address, ADDRESS_SIZE};
use crate::error::SymbolError;
use crate::keys::{self, KeyPair};
use crate::network::NetworkType;

// ---------------------------------------------------------------------------
// Layout constants
// ---------------------------------------------------------------------------

pub const TRANSFER_TYPE: u16 = 0x4154;
pub const AGGREGATE_COMPLETE_TYPE: u16 = 0x4141;
pub const AGGREGATE_BONDED_TYPE: u16 = 0x4241;

pub const TRANSFER_VERSION: u8 = 1;
pub const AGGREGATE_VERSION: u8 = 2;

pub const HEADER_SIZE: usize = 128;
pub const EMBEDDED_HEADER_SIZE: usize = 48;
pub const COSIGNATURE_SIZE: usize = 104;

/// Offset of the first byte covered by the signature (after size, reserved,
/// signature, signer and reserved).
const SIGNED_DATA_OFFSET: usize = 108;

/// Aggregates only sign their header tail plus the transactions hash.
const AGGREGATE_SIGNED_DATA_END: usize = HEADER_SIZE + 32;

const TRANSFER_FIXED_BODY_SIZE: usize = ADDRESS_SIZE + 2 + 1 + 1 + 4;
const MOSAIC_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// An absolute mosaic amount. `id` may be a namespace id (high bit set)
/// until resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mosaic {
    pub id: u64,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBody {
    pub recipient: Address,
    pub mosaics: Vec<Mosaic>,
    /// Full message field, type marker included. Empty for no message.
    pub message: Vec<u8>,
}

/// A transfer embedded in an aggregate. Embedded transactions carry no
/// signature, fee or deadline of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedTransaction {
    pub signer_public_key: [u8; 32],
    pub network: NetworkType,
    pub body: TransferBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cosignature {
    pub version: u64,
    pub signer_public_key: [u8; 32],
    pub signature: [u8; 64],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateBody {
    pub transactions_hash: [u8; 32],
    pub transactions: Vec<EmbeddedTransaction>,
    pub cosignatures: Vec<Cosignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionBody {
    Transfer(TransferBody),
    Aggregate { bonded: bool, body: AggregateBody },
}

/// A top-level Symbol transaction (signed or not).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signature: [u8; 64],
    pub signer_public_key: [u8; 32],
    pub network: NetworkType,
    pub max_fee: u64,
    /// Network-relative milliseconds.
    pub deadline: u64,
    pub body: TransactionBody,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

impl Transaction {
    pub fn transfer(
        signer_public_key: [u8; 32],
        network: NetworkType,
        max_fee: u64,
        deadline: u64,
        body: TransferBody,
    ) -> Self {
        Self {
            signature: [0u8; 64],
            signer_public_key,
            network,
            max_fee,
            deadline,
            body: TransactionBody::Transfer(body),
        }
    }

    /// Builds an aggregate and fills in its transactions hash.
    pub fn aggregate(
        signer_public_key: [u8; 32],
        network: NetworkType,
        max_fee: u64,
        deadline: u64,
        bonded: bool,
        transactions: Vec<EmbeddedTransaction>,
    ) -> Self {
        let transactions_hash = merkle_transactions_hash(&transactions);
        Self {
            signature: [0u8; 64],
            signer_public_key,
            network,
            max_fee,
            deadline,
            body: TransactionBody::Aggregate {
                bonded,
                body: AggregateBody {
                    transactions_hash,
                    transactions,
                    cosignatures: Vec::new(),
                },
            },
        }
    }

    pub fn transaction_type(&self) -> u16 {
        match &self.body {
            TransactionBody::Transfer(_) => TRANSFER_TYPE,
            TransactionBody::Aggregate { bonded: false, .. } => AGGREGATE_COMPLETE_TYPE,
            TransactionBody::Aggregate { bonded: true, .. } => AGGREGATE_BONDED_TYPE,
        }
    }

    pub fn version(&self) -> u8 {
        match &self.body {
            TransactionBody::Transfer(_) => TRANSFER_VERSION,
            TransactionBody::Aggregate { .. } => AGGREGATE_VERSION,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.body, TransactionBody::Aggregate { .. })
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    pub fn serialize(&self) -> Vec<u8> {
        let body = match &self.body {
            TransactionBody::Transfer(transfer) => serialize_transfer_body(transfer),
            TransactionBody::Aggregate { body, .. } => serialize_aggregate_body(body),
        };
        let size = HEADER_SIZE + body.len();

        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&(size as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.signer_public_key);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.push(self.version());
        out.push(self.network.as_byte());
        out.extend_from_slice(&self.transaction_type().to_le_bytes());
        out.extend_from_slice(&self.max_fee.to_le_bytes());
        out.extend_from_slice(&self.deadline.to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    pub fn size(&self) -> usize {
        self.serialize().len()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, SymbolError> {
        let mut reader = Reader::new(bytes);
        let size = reader.u32()? as usize;
        if size != bytes.len() {
            return Err(SymbolError::MalformedPayload(format!(
                "size field {} does not match payload length {}",
                size,
                bytes.len()
            )));
        }
        reader.skip(4)?;
        let signature = reader.array::<64>()?;
        let signer_public_key = reader.array::<32>()?;
        reader.skip(4)?;
        let version = reader.u8()?;
        let network = NetworkType::from_byte(reader.u8()?)?;
        let transaction_type = reader.u16()?;
        let max_fee = reader.u64()?;
        let deadline = reader.u64()?;

        let body = match transaction_type {
            TRANSFER_TYPE => {
                expect_version(transaction_type, version, TRANSFER_VERSION)?;
                TransactionBody::Transfer(parse_transfer_body(&mut reader)?)
            }
            AGGREGATE_COMPLETE_TYPE | AGGREGATE_BONDED_TYPE => {
                expect_version(transaction_type, version, AGGREGATE_VERSION)?;
                TransactionBody::Aggregate {
                    bonded: transaction_type == AGGREGATE_BONDED_TYPE,
                    body: parse_aggregate_body(&mut reader)?,
                }
            }
            other => return Err(SymbolError::UnsupportedTransactionType(other)),
        };
        reader.finish()?;

        Ok(Self {
            signature,
            signer_public_key,
            network,
            max_fee,
            deadline,
            body,
        })
    }

    // -----------------------------------------------------------------------
    // Signing and hashing
    // -----------------------------------------------------------------------

    /// `generation_hash || signed portion of the payload`.
    pub fn signing_payload(&self, generation_hash: &[u8; 32]) -> Vec<u8> {
        let payload = self.serialize();
        let end = if self.is_aggregate() {
            AGGREGATE_SIGNED_DATA_END
        } else {
            payload.len()
        };
        let mut data = Vec::with_capacity(32 + end - SIGNED_DATA_OFFSET);
        data.extend_from_slice(generation_hash);
        data.extend_from_slice(&payload[SIGNED_DATA_OFFSET..end]);
        data
    }

    /// Signs in place. Sets the signer to `key_pair` and, for aggregates,
    /// recomputes the transactions hash first.
    pub fn sign(&mut self, key_pair: &KeyPair, generation_hash: &[u8; 32]) {
        self.signer_public_key = key_pair.public_key();
        if let TransactionBody::Aggregate { body, .. } = &mut self.body {
            body.transactions_hash = merkle_transactions_hash(&body.transactions);
        }
        self.signature = key_pair.sign(&self.signing_payload(generation_hash));
    }

    pub fn verify_signature(&self, generation_hash: &[u8; 32]) -> bool {
        keys::verify(
            &self.signer_public_key,
            &self.signing_payload(generation_hash),
            &self.signature,
        )
    }

    /// `sha3_256(R || signer || signing payload)`, where R is the first half
    /// of the signature.
    pub fn hash(&self, generation_hash: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        hasher.update(&self.signature[..32]);
        hasher.update(self.signer_public_key);
        hasher.update(self.signing_payload(generation_hash));
        hasher.finalize().into()
    }

    /// Appends cosignatures to an aggregate, keeping them ordered by signer.
    /// Signers already present are skipped.
    pub fn add_cosignatures(&mut self, cosignatures: &[Cosignature]) -> Result<(), SymbolError> {
        let transaction_type = self.transaction_type();
        let TransactionBody::Aggregate { body, .. } = &mut self.body else {
            return Err(SymbolError::UnsupportedTransactionType(transaction_type));
        };
        for cosignature in cosignatures {
            if body
                .cosignatures
                .iter()
                .all(|c| c.signer_public_key != cosignature.signer_public_key)
            {
                body.cosignatures.push(cosignature.clone());
            }
        }
        body.cosignatures.sort_by(|a, b| a.signer_public_key.cmp(&b.signer_public_key));
        Ok(())
    }
}

/// Cosigns an aggregate identified by its hash.
pub fn cosign(key_pair: &KeyPair, transaction_hash: &[u8; 32]) -> Cosignature {
    Cosignature {
        version: 0,
        signer_public_key: key_pair.public_key(),
        signature: key_pair.sign(transaction_hash),
    }
}

pub fn verify_cosignature(cosignature: &Cosignature, transaction_hash: &[u8; 32]) -> bool {
    keys::verify(
        &cosignature.signer_public_key,
        transaction_hash,
        &cosignature.signature,
    )
}

/// Merkle root over the SHA3-256 hashes of the (unpadded) embedded
/// transactions. An odd level duplicates its last node.
pub fn merkle_transactions_hash(transactions: &[EmbeddedTransaction]) -> [u8; 32] {
    let mut level: Vec<[u8; 32]> = transactions
        .iter()
        .map(|tx| Sha3_256::digest(tx.serialize()).into())
        .collect();
    if level.is_empty() {
        return [0u8; 32];
    }

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1];
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha3_256::new();
                hasher.update(pair[0]);
                hasher.update(pair[1]);
                hasher.finalize().into()
            })
            .collect();
    }
    level[0]
}

// ---------------------------------------------------------------------------
// Embedded transactions
// ---------------------------------------------------------------------------

impl EmbeddedTransaction {
    /// Unpadded embedded bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let body = serialize_transfer_body(&self.body);
        let size = EMBEDDED_HEADER_SIZE + body.len();

        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&(size as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&self.signer_public_key);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.push(TRANSFER_VERSION);
        out.push(self.network.as_byte());
        out.extend_from_slice(&TRANSFER_TYPE.to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    fn parse(reader: &mut Reader<'_>) -> Result<Self, SymbolError> {
        let start = reader.position();
        let size = reader.u32()? as usize;
        reader.skip(4)?;
        let signer_public_key = reader.array::<32>()?;
        reader.skip(4)?;
        let version = reader.u8()?;
        let network = NetworkType::from_byte(reader.u8()?)?;
        let transaction_type = reader.u16()?;
        if transaction_type != TRANSFER_TYPE {
            return Err(SymbolError::UnsupportedTransactionType(transaction_type));
        }
        expect_version(transaction_type, version, TRANSFER_VERSION)?;
        let body = parse_transfer_body(reader)?;
        if reader.position() - start != size {
            return Err(SymbolError::MalformedPayload(format!(
                "embedded transaction size {} does not match its contents",
                size
            )));
        }
        Ok(Self {
            signer_public_key,
            network,
            body,
        })
    }
}

fn serialize_transfer_body(body: &TransferBody) -> Vec<u8> {
    let mut mosaics = body.mosaics.clone();
    mosaics.sort_by_key(|m| m.id);

    let mut out =
        Vec::with_capacity(TRANSFER_FIXED_BODY_SIZE + mosaics.len() * MOSAIC_SIZE + body.message.len());
    out.extend_from_slice(&body.recipient.0);
    out.extend_from_slice(&(body.message.len() as u16).to_le_bytes());
    out.push(mosaics.len() as u8);
    out.push(0);
    out.extend_from_slice(&0u32.to_le_bytes());
    for mosaic in &mosaics {
        out.extend_from_slice(&mosaic.id.to_le_bytes());
        out.extend_from_slice(&mosaic.amount.to_le_bytes());
    }
    out.extend_from_slice(&body.message);
    out
}

fn parse_transfer_body(reader: &mut Reader<'_>) -> Result<TransferBody, SymbolError> {
    let recipient = Address::from_bytes(reader.take(ADDRESS_SIZE)?)?;
    let message_size = reader.u16()? as usize;
    let mosaics_count = reader.u8()? as usize;
    reader.skip(5)?;

    let mut mosaics = Vec::with_capacity(mosaics_count);
    for _ in 0..mosaics_count {
        mosaics.push(Mosaic {
            id: reader.u64()?,
            amount: reader.u64()?,
        });
    }
    let message = reader.take(message_size)?.to_vec();
    Ok(TransferBody {
        recipient,
        mosaics,
        message,
    })
}

fn serialize_aggregate_body(body: &AggregateBody) -> Vec<u8> {
    let mut transactions = Vec::new();
    for tx in &body.transactions {
        let bytes = tx.serialize();
        let padding = padding_size(bytes.len());
        transactions.extend_from_slice(&bytes);
        transactions.resize(transactions.len() + padding, 0);
    }

    let mut out = Vec::with_capacity(
        40 + transactions.len() + body.cosignatures.len() * COSIGNATURE_SIZE,
    );
    out.extend_from_slice(&body.transactions_hash);
    out.extend_from_slice(&(transactions.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&transactions);
    for cosignature in &body.cosignatures {
        out.extend_from_slice(&cosignature.version.to_le_bytes());
        out.extend_from_slice(&cosignature.signer_public_key);
        out.extend_from_slice(&cosignature.signature);
    }
    out
}

fn parse_aggregate_body(reader: &mut Reader<'_>) -> Result<AggregateBody, SymbolError> {
    let transactions_hash = reader.array::<32>()?;
    let payload_size = reader.u32()? as usize;
    reader.skip(4)?;

    let payload_end = reader.position() + payload_size;
    let mut transactions = Vec::new();
    while reader.position() < payload_end {
        let tx_start = reader.position();
        let tx = EmbeddedTransaction::parse(reader)?;
        reader.skip(padding_size(reader.position() - tx_start))?;
        transactions.push(tx);
    }
    if reader.position() != payload_end {
        return Err(SymbolError::MalformedPayload(
            "aggregate payload size does not match embedded transactions".into(),
        ));
    }

    if reader.remaining() % COSIGNATURE_SIZE != 0 {
        return Err(SymbolError::MalformedPayload(format!(
            "{} trailing bytes do not form whole cosignatures",
            reader.remaining()
        )));
    }
    let mut cosignatures = Vec::with_capacity(reader.remaining() / COSIGNATURE_SIZE);
    while reader.remaining() > 0 {
        cosignatures.push(Cosignature {
            version: reader.u64()?,
            signer_public_key: reader.array::<32>()?,
            signature: reader.array::<64>()?,
        });
    }

    Ok(AggregateBody {
        transactions_hash,
        transactions,
        cosignatures,
    })
}

fn padding_size(size: usize) -> usize {
    (8 - size % 8) % 8
}

fn expect_version(transaction_type: u16, actual: u8, expected: u8) -> Result<(), SymbolError> {
    if actual != expected {
        return Err(SymbolError::MalformedPayload(format!(
            "type 0x{transaction_type:04x} expects version {expected}, got {actual}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SymbolError> {
        if self.remaining() < n {
            return Err(SymbolError::MalformedPayload(format!(
                "unexpected end of payload at offset {} (need {} bytes)",
                self.position, n
            )));
        }
        let slice = &self.bytes[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), SymbolError> {
        self.take(n).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SymbolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, SymbolError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, SymbolError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, SymbolError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, SymbolError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn finish(&self) -> Result<(), SymbolError> {
        if self.remaining() != 0 {
            return Err(SymbolError::MalformedPayload(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}
