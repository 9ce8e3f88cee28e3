//! NIS1 transfer transaction (version 1, XEM only).
//!
//! All integers are little-endian; byte arrays are length-prefixed.
//!
//! ```text
//!   type                    u32   0x0101
//!   version                 u32   (network << 24) | 1
//!   timestamp               u32   seconds since nemesis
//!   signer_len              u32   32
//!   signer_public_key       32 bytes
//!   fee                     u64   micro-XEM
//!   deadline                u32   seconds since nemesis
//!   recipient_len           u32   40
//!   recipient               40 bytes, base32 ascii
//!   amount                  u64   micro-XEM
//!   message_field_len       u32   0 when there is no message
//!     message_type          u32   1 plain, 2 secure
//!     payload_len           u32
//!     payload               bytes
//! ```
//!
//! The announced form is `data` plus a detached 64-byte signature; this
//! crate carries both as `data || signature`.

use sha3::{Digest, Keccak256};

use crate::address::{Address, ENCODED_ADDRESS_SIZE};
use crate::error::NemError;
use crate::keys::{self, KeyPair};
use crate::network::NetworkType;

pub const TRANSFER_TYPE: u32 = 0x0101;
pub const TRANSFER_VERSION: u32 = 1;
pub const PLAIN_MESSAGE_TYPE: u32 = 1;
pub const SECURE_MESSAGE_TYPE: u32 = 2;
pub const SIGNATURE_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_type: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTransaction {
    pub network: NetworkType,
    pub timestamp: u32,
    pub signer_public_key: [u8; 32],
    pub fee: u64,
    pub deadline: u32,
    pub recipient: Address,
    pub amount: u64,
    pub message: Option<Message>,
}

/// A signed transfer as `data || signature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    pub payload: Vec<u8>,
    pub hash: [u8; 32],
}

impl SignedTransfer {
    /// Splits into the `{data, signature}` pair expected by announce.
    pub fn split(&self) -> (&[u8], &[u8]) {
        self.payload.split_at(self.payload.len() - SIGNATURE_SIZE)
    }
}

impl TransferTransaction {
    pub fn serialize(&self) -> Vec<u8> {
        let recipient = self.recipient.encode();
        let mut out = Vec::with_capacity(128 + self.message.as_ref().map_or(0, |m| m.payload.len()));

        out.extend_from_slice(&TRANSFER_TYPE.to_le_bytes());
        let version = ((self.network.as_byte() as u32) << 24) | TRANSFER_VERSION;
        out.extend_from_slice(&version.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&32u32.to_le_bytes());
        out.extend_from_slice(&self.signer_public_key);
        out.extend_from_slice(&self.fee.to_le_bytes());
        out.extend_from_slice(&self.deadline.to_le_bytes());
        out.extend_from_slice(&(recipient.len() as u32).to_le_bytes());
        out.extend_from_slice(recipient.as_bytes());
        out.extend_from_slice(&self.amount.to_le_bytes());

        match &self.message {
            Some(message) => {
                let field_len = 8 + message.payload.len();
                out.extend_from_slice(&(field_len as u32).to_le_bytes());
                out.extend_from_slice(&message.message_type.to_le_bytes());
                out.extend_from_slice(&(message.payload.len() as u32).to_le_bytes());
                out.extend_from_slice(&message.payload);
            }
            None => out.extend_from_slice(&0u32.to_le_bytes()),
        }
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self, NemError> {
        let mut reader = Reader { bytes: data, position: 0 };

        let transaction_type = reader.u32()?;
        if transaction_type != TRANSFER_TYPE {
            return Err(NemError::UnsupportedTransactionType(transaction_type));
        }
        let version = reader.u32()?;
        let network = NetworkType::from_byte((version >> 24) as u8)?;
        if version & 0x00ff_ffff != TRANSFER_VERSION {
            return Err(NemError::MalformedPayload(format!(
                "unsupported transfer version {}",
                version & 0x00ff_ffff
            )));
        }
        let timestamp = reader.u32()?;
        if reader.u32()? != 32 {
            return Err(NemError::MalformedPayload("signer key must be 32 bytes".into()));
        }
        let mut signer_public_key = [0u8; 32];
        signer_public_key.copy_from_slice(reader.take(32)?);
        let fee = reader.u64()?;
        let deadline = reader.u32()?;

        let recipient_len = reader.u32()? as usize;
        if recipient_len != ENCODED_ADDRESS_SIZE {
            return Err(NemError::MalformedPayload(format!(
                "recipient must be {ENCODED_ADDRESS_SIZE} characters, got {recipient_len}"
            )));
        }
        let recipient_ascii = std::str::from_utf8(reader.take(recipient_len)?)
            .map_err(|e| NemError::MalformedPayload(format!("recipient is not ascii: {e}")))?;
        let recipient = Address::parse(recipient_ascii)?;
        let amount = reader.u64()?;

        let field_len = reader.u32()? as usize;
        let message = if field_len == 0 {
            None
        } else {
            let message_type = reader.u32()?;
            let payload_len = reader.u32()? as usize;
            if field_len != 8 + payload_len {
                return Err(NemError::MalformedPayload("message length mismatch".into()));
            }
            Some(Message {
                message_type,
                payload: reader.take(payload_len)?.to_vec(),
            })
        };

        if reader.position != data.len() {
            return Err(NemError::MalformedPayload(format!(
                "{} trailing bytes",
                data.len() - reader.position
            )));
        }

        Ok(Self {
            network,
            timestamp,
            signer_public_key,
            fee,
            deadline,
            recipient,
            amount,
            message,
        })
    }

    /// Signs as `key_pair`, replacing the signer field.
    pub fn sign(&mut self, key_pair: &KeyPair) -> SignedTransfer {
        self.signer_public_key = key_pair.public_key();
        let data = self.serialize();
        let signature = key_pair.sign(&data);
        let hash = transaction_hash(&data);

        let mut payload = data;
        payload.extend_from_slice(&signature);
        SignedTransfer { payload, hash }
    }
}

/// `keccak256(data)`; the signature is not part of the hash.
pub fn transaction_hash(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Parses `data || signature`, verifying the signature.
pub fn parse_signed(payload: &[u8]) -> Result<(TransferTransaction, [u8; 32]), NemError> {
    if payload.len() < SIGNATURE_SIZE {
        return Err(NemError::MalformedPayload("payload shorter than a signature".into()));
    }
    let (data, signature_bytes) = payload.split_at(payload.len() - SIGNATURE_SIZE);
    let transaction = TransferTransaction::parse(data)?;

    let mut signature = [0u8; SIGNATURE_SIZE];
    signature.copy_from_slice(signature_bytes);
    if !keys::verify(&transaction.signer_public_key, data, &signature) {
        return Err(NemError::MalformedPayload("signature does not verify".into()));
    }
    Ok((transaction, transaction_hash(data)))
}

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], NemError> {
        if self.bytes.len() - self.position < n {
            return Err(NemError::MalformedPayload(format!(
                "unexpected end of payload at offset {}",
                self.position
            )));
        }
        let slice = &self.bytes[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, NemError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64, NemError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(message: Option<Message>) -> TransferTransaction {
        let recipient_key = KeyPair::from_private_key(&[5u8; 32]).public_key();
        TransferTransaction {
            network: NetworkType::Testnet,
            timestamp: 100_000,
            signer_public_key: [0u8; 32],
            fee: 50_000,
            deadline: 103_600,
            recipient: Address::from_public_key(&recipient_key, NetworkType::Testnet),
            amount: 1_000_000,
            message,
        }
    }

    #[test]
    fn layout_without_message() {
        let data = sample(None).serialize();
        // 4+4+4 + 4+32 + 8+4 + 4+40 + 8 + 4
        assert_eq!(data.len(), 116);
        assert_eq!(&data[..4], &[0x01, 0x01, 0x00, 0x00]);
        assert_eq!(&data[4..8], &[0x01, 0x00, 0x00, 0x98]);
    }

    #[test]
    fn signed_roundtrip_with_message() {
        let signer = KeyPair::from_private_key(&[7u8; 32]);
        let mut tx = sample(Some(Message {
            message_type: PLAIN_MESSAGE_TYPE,
            payload: b"thanks".to_vec(),
        }));
        let signed = tx.sign(&signer);
        assert_eq!(tx.signer_public_key, signer.public_key());

        let (parsed, hash) = parse_signed(&signed.payload).unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(hash, signed.hash);

        let (data, signature) = signed.split();
        assert_eq!(signature.len(), SIGNATURE_SIZE);
        assert_eq!(transaction_hash(data), signed.hash);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let signer = KeyPair::from_private_key(&[7u8; 32]);
        let mut tx = sample(None);
        let mut payload = tx.sign(&signer).payload;
        // bump the amount
        payload[104] ^= 1;
        assert!(parse_signed(&payload).is_err());
    }

    #[test]
    fn other_types_are_rejected() {
        let mut data = sample(None).serialize();
        data[..4].copy_from_slice(&0x0801u32.to_le_bytes());
        assert_eq!(
            TransferTransaction::parse(&data),
            Err(NemError::UnsupportedTransactionType(0x0801))
        );
        assert!(parse_signed(&[0u8; 10]).is_err());
    }
}
