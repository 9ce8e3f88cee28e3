//! NEM (NIS1) codec. Only XEM transfers with plain messages are encodable.

use chain_nem::address::Address;
use chain_nem::keys::KeyPair;
use chain_nem::network::{NetworkType, NEMESIS_EPOCH};
use chain_nem::transaction::{
    self as chain, TransferTransaction, PLAIN_MESSAGE_TYPE, SECURE_MESSAGE_TYPE,
};
use serde::Deserialize;
use zeroize::Zeroize;

use super::{
    check_signer_address, now_millis, resolve_signer_key, DecodeContext, EncodeContext,
    References, TransactionCodec, DEFAULT_DEADLINE_MS,
};
use crate::deriver::parse_private_key;
use crate::error::OperationError;
use crate::fee::FeeCalculator;
use crate::types::{
    Message, NetworkProperties, Protocol, SignedTransaction, Token, Transaction, TransactionKind,
    Wire, WireTransaction,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct NemCodec;

impl TransactionCodec for NemCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Nem
    }

    fn to_wire(&self, tx: &Transaction, ctx: &EncodeContext<'_>) -> Result<Wire, OperationError> {
        if tx.kind != TransactionKind::Transfer {
            return Err(OperationError::unsupported(
                Protocol::Nem,
                format!("{:?} transactions", tx.kind),
            ));
        }
        let network = network_type(ctx.network)?;
        let signer_key = resolve_signer_key(tx, ctx.signer)?.ok_or_else(|| {
            OperationError::Validation("signer public key required to encode".into())
        })?;
        let signer_key = chain_nem::keys::parse_public_key(&signer_key)?;
        check_signer_address(tx, &Address::from_public_key(&signer_key, network).encode())?;

        let recipient = tx
            .recipient_address
            .as_deref()
            .ok_or_else(|| OperationError::Validation("transfer needs a recipient".into()))?;
        let recipient = Address::parse(recipient)?;
        if recipient.network()? != network {
            return Err(OperationError::Validation(
                "recipient belongs to another network".into(),
            ));
        }

        let fee = match &tx.fee {
            Some(fee) => to_u64(fee.absolute_amount()?, "fee")?,
            None => to_u64(
                FeeCalculator::new(Protocol::Nem)
                    .compute_fee_tiers(tx, ctx.network)?
                    .medium
                    .token
                    .absolute_amount()?,
                "fee",
            )?,
        };
        let timestamp_ms = tx.timestamp.unwrap_or_else(now_millis);
        let deadline_ms = tx.deadline.unwrap_or(timestamp_ms + DEFAULT_DEADLINE_MS);

        let mut built = TransferTransaction {
            network,
            timestamp: nemesis_seconds(timestamp_ms)?,
            signer_public_key: signer_key,
            fee,
            deadline: nemesis_seconds(deadline_ms)?,
            recipient,
            amount: xem_amount(tx, ctx.network)?,
            message: message_field(tx.message.as_ref())?,
        };

        let Some(signer) = ctx.signer else {
            return Ok(Wire::Unsigned(built.serialize()));
        };
        let mut private_key = parse_private_key(Protocol::Nem, signer.private_key())?;
        let key_pair = KeyPair::from_private_key(&private_key);
        private_key.zeroize();
        let signed = built.sign(&key_pair);
        tracing::debug!("signed nem transfer");
        Ok(Wire::Signed(SignedTransaction {
            hash: hex::encode(signed.hash),
            wire_payload: signed.payload,
        }))
    }

    fn from_wire(
        &self,
        wire: &WireTransaction,
        ctx: &DecodeContext,
    ) -> Result<Transaction, OperationError> {
        match wire {
            WireTransaction::Payload(bytes) => {
                // Bare `data` is an unsigned transfer; otherwise `data || signature`.
                let (built, hash) = match TransferTransaction::parse(bytes) {
                    Ok(built) => (built, chain::transaction_hash(bytes)),
                    Err(_) => chain::parse_signed(bytes)?,
                };
                from_chain(&built, ctx, Some(hex::encode(hash)))
            }
            WireTransaction::Dto(value) => {
                let record: TransactionMetaPair = serde_json::from_value(value.clone())
                    .map_err(|e| OperationError::Validation(format!("invalid nem record: {e}")))?;
                let hash = record.meta.as_ref().and_then(|m| m.hash.as_ref()).map(|h| h.data.clone());
                let height = record.meta.as_ref().and_then(|m| m.height);
                let built = record.transaction.into_chain()?;
                let mut tx = from_chain(&built, ctx, hash)?;
                tx.height = height;
                Ok(tx)
            }
        }
    }

    fn references(&self, wire: &WireTransaction) -> Result<References, OperationError> {
        // XEM transfers never refer to anything that needs fetching.
        if let WireTransaction::Payload(bytes) = wire {
            if TransferTransaction::parse(bytes).is_err() {
                chain::parse_signed(bytes)?;
            }
        }
        Ok(References::default())
    }
}

fn xem_amount(tx: &Transaction, network: &NetworkProperties) -> Result<u64, OperationError> {
    match tx.tokens.as_slice() {
        [] => Ok(0),
        [token] if token.id.eq_ignore_ascii_case(&network.native_currency.id) => {
            to_u64(token.absolute_amount()?, "amount")
        }
        _ => Err(OperationError::unsupported(Protocol::Nem, "mosaic transfers")),
    }
}

fn message_field(message: Option<&Message>) -> Result<Option<chain::Message>, OperationError> {
    match message {
        None => Ok(None),
        Some(message) if message.encrypted => {
            Err(OperationError::unsupported(Protocol::Nem, "encrypted messages"))
        }
        Some(message) => Ok(Some(chain::Message {
            message_type: PLAIN_MESSAGE_TYPE,
            payload: message.text.as_bytes().to_vec(),
        })),
    }
}

fn from_chain(
    built: &TransferTransaction,
    ctx: &DecodeContext,
    hash: Option<String>,
) -> Result<Transaction, OperationError> {
    let network = network_type(&ctx.network)?;
    if built.network != network {
        return Err(OperationError::Validation(format!(
            "transaction belongs to {}, expected {}",
            built.network.identifier(),
            network.identifier()
        )));
    }
    let native = ctx.network.native_currency.token_info();
    let tokens = if built.amount == 0 {
        Vec::new()
    } else {
        vec![Token::from_absolute(&native, u128::from(built.amount))?]
    };
    let message = built.message.as_ref().map(|m| match m.message_type {
        SECURE_MESSAGE_TYPE => Message::encrypted(hex::encode(&m.payload)),
        _ => match std::str::from_utf8(&m.payload) {
            Ok(text) => Message::plain(text),
            Err(_) => Message::plain(hex::encode(&m.payload)),
        },
    });

    Ok(Transaction {
        kind: TransactionKind::Transfer,
        signer_public_key: Some(hex::encode_upper(built.signer_public_key)),
        signer_address: Address::from_public_key(&built.signer_public_key, network).encode(),
        recipient_address: Some(built.recipient.encode()),
        tokens,
        fee: Some(Token::from_absolute(&native, u128::from(built.fee))?),
        deadline: Some(unix_millis(built.deadline)),
        timestamp: Some(unix_millis(built.timestamp)),
        hash: hash.map(|h| h.to_ascii_lowercase()),
        message,
        ..Default::default()
    })
}

fn network_type(network: &NetworkProperties) -> Result<NetworkType, OperationError> {
    NetworkType::from_identifier(&network.network_identifier).ok_or_else(|| {
        OperationError::Configuration(format!(
            "unknown nem network '{}'",
            network.network_identifier
        ))
    })
}

fn nemesis_seconds(unix_ms: u64) -> Result<u32, OperationError> {
    (unix_ms / 1000)
        .checked_sub(NEMESIS_EPOCH)
        .and_then(|s| u32::try_from(s).ok())
        .ok_or_else(|| OperationError::Validation(format!("time {unix_ms} outside the nem epoch")))
}

fn unix_millis(nemesis_seconds: u32) -> u64 {
    (u64::from(nemesis_seconds) + NEMESIS_EPOCH) * 1000
}

fn to_u64(value: u128, what: &str) -> Result<u64, OperationError> {
    u64::try_from(value).map_err(|_| OperationError::Validation(format!("{what} out of range")))
}

#[derive(Debug, Deserialize)]
struct TransactionMetaPair {
    #[serde(default)]
    meta: Option<RecordMeta>,
    transaction: RecordTransaction,
}

#[derive(Debug, Deserialize)]
struct RecordMeta {
    #[serde(default)]
    height: Option<u64>,
    #[serde(default)]
    hash: Option<HashData>,
}

#[derive(Debug, Deserialize)]
struct HashData {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordTransaction {
    #[serde(rename = "type")]
    transaction_type: u32,
    version: i64,
    time_stamp: u32,
    signer: String,
    fee: u64,
    deadline: u32,
    #[serde(default)]
    recipient: Option<String>,
    #[serde(default)]
    amount: u64,
    #[serde(default)]
    message: Option<RecordMessage>,
}

#[derive(Debug, Deserialize)]
struct RecordMessage {
    #[serde(default)]
    payload: Option<String>,
    #[serde(rename = "type")]
    message_type: Option<u32>,
}

impl RecordTransaction {
    fn into_chain(self) -> Result<TransferTransaction, OperationError> {
        if self.transaction_type != chain::TRANSFER_TYPE {
            return Err(chain_nem::error::NemError::UnsupportedTransactionType(
                self.transaction_type,
            )
            .into());
        }
        let network = NetworkType::from_byte(((self.version as u32) >> 24) as u8)?;
        let recipient = self
            .recipient
            .as_deref()
            .ok_or_else(|| OperationError::Validation("transfer record without recipient".into()))?;
        let message = match self.message {
            Some(RecordMessage {
                payload: Some(payload),
                message_type,
            }) if !payload.is_empty() => Some(chain::Message {
                message_type: message_type.unwrap_or(PLAIN_MESSAGE_TYPE),
                payload: hex::decode(&payload)
                    .map_err(|e| OperationError::Validation(format!("invalid message hex: {e}")))?,
            }),
            _ => None,
        };
        Ok(TransferTransaction {
            network,
            timestamp: self.time_stamp,
            signer_public_key: chain_nem::keys::parse_public_key(&self.signer)?,
            fee: self.fee,
            deadline: self.deadline,
            recipient: Address::parse(recipient)?,
            amount: self.amount,
            message,
        })
    }
}
