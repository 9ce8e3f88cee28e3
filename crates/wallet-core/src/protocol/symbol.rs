//! Symbol codec: binary catapult payloads and REST transaction records.

use chain_symbol::address::{Address, ENCODED_ADDRESS_SIZE};
use chain_symbol::keys::KeyPair;
use chain_symbol::message::{self, MessagePayload};
use chain_symbol::namespace;
use chain_symbol::network::NetworkType;
use chain_symbol::transaction::{
    self as chain, AggregateBody, EmbeddedTransaction, Mosaic, TransactionBody, TransferBody,
    COSIGNATURE_SIZE,
};
use chain_symbol::error::SymbolError;
use crypto_utils::encryption::{NONCE_SIZE, TAG_SIZE};
use serde::Deserialize;

use super::{
    check_signer_address, lookup_key, now_millis, resolve_signer_key, DecodeContext,
    EncodeContext, References, TransactionCodec, DEFAULT_DEADLINE_MS,
};
use crate::error::OperationError;
use crate::fee::FeeCalculator;
use crate::types::{
    Cosignature, Message, NetworkProperties, PrivateAccount, Protocol, SignedTransaction, Token,
    Transaction, TransactionKind, Wire, WireTransaction,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolCodec;

/// How message encryption is handled while building.
enum Sealing<'a> {
    Keys {
        sender: Option<&'a KeyPair>,
        recipient_public_key: Option<&'a str>,
    },
    /// Same-length filler, for size estimation only.
    Placeholder,
}

impl TransactionCodec for SymbolCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Symbol
    }

    fn to_wire(&self, tx: &Transaction, ctx: &EncodeContext<'_>) -> Result<Wire, OperationError> {
        if tx.kind == TransactionKind::HarvestReward {
            return Err(OperationError::unsupported(Protocol::Symbol, "encode harvest reward"));
        }
        let network = network_type(ctx.network)?;
        let signer_key = resolve_signer_key(tx, ctx.signer)?.ok_or_else(|| {
            OperationError::Validation("signer public key required to encode".into())
        })?;
        let signer_key = chain_symbol::keys::parse_key_hex(&signer_key)?;
        check_signer_address(tx, &Address::from_public_key(&signer_key, network).encode())?;

        let key_pair = ctx
            .signer
            .map(|signer| KeyPair::from_hex(signer.private_key()))
            .transpose()?;
        let max_fee = match &tx.fee {
            Some(fee) => to_u64(fee.absolute_amount()?, "fee")?,
            None => {
                let tiers = FeeCalculator::new(Protocol::Symbol).compute_fee_tiers(tx, ctx.network)?;
                to_u64(tiers.medium.token.absolute_amount()?, "fee")?
            }
        };
        let deadline = network_time(
            tx.deadline.unwrap_or_else(|| now_millis() + DEFAULT_DEADLINE_MS),
            ctx.network,
        )?;

        let sealing = Sealing::Keys {
            sender: key_pair.as_ref(),
            recipient_public_key: ctx.recipient_public_key,
        };
        let mut built = build(tx, network, signer_key, max_fee, deadline, &sealing)?;

        let Some(key_pair) = key_pair else {
            return Ok(Wire::Unsigned(built.serialize()));
        };
        let generation_hash = generation_hash(ctx.network)?;
        built.sign(&key_pair, &generation_hash);
        if let TransactionBody::Aggregate { body, .. } = &mut built.body {
            body.cosignatures = tx
                .cosignatures
                .iter()
                .map(to_chain_cosignature)
                .collect::<Result<_, _>>()?;
            body.cosignatures
                .sort_by(|a, b| a.signer_public_key.cmp(&b.signer_public_key));
        }
        tracing::debug!("signed symbol transaction of type {:#06x}", built.transaction_type());
        Ok(Wire::Signed(SignedTransaction {
            hash: hex::encode_upper(built.hash(&generation_hash)),
            wire_payload: built.serialize(),
        }))
    }

    fn from_wire(
        &self,
        wire: &WireTransaction,
        ctx: &DecodeContext,
    ) -> Result<Transaction, OperationError> {
        let (built, meta) = parse_wire(wire)?;
        let hash = match meta.hash {
            Some(hash) => Some(hash.to_ascii_uppercase()),
            None => ctx
                .network
                .generation_hash
                .as_ref()
                .map(|_| generation_hash(&ctx.network))
                .transpose()?
                .map(|g| hex::encode_upper(built.hash(&g))),
        };
        let mut tx = from_chain(&built, ctx, hash.as_deref())?;
        let epoch_ms = ctx.network.epoch_adjustment * 1000;
        tx.height = meta.height;
        tx.timestamp = meta.timestamp.map(|t| t + epoch_ms);
        if tx.aggregate_hash.is_none() {
            tx.aggregate_hash = meta.aggregate_hash.map(|h| h.to_ascii_uppercase());
        }
        Ok(tx)
    }

    fn references(&self, wire: &WireTransaction) -> Result<References, OperationError> {
        let (built, _) = parse_wire(wire)?;
        let mut refs = References::default();
        let mut visit = |body: &TransferBody| {
            if let Some(id) = body.recipient.namespace_id() {
                refs.merge(References {
                    tokens: Vec::new(),
                    aliases: vec![id_hex(id)],
                });
            }
            for mosaic in &body.mosaics {
                let id = id_hex(mosaic.id);
                let found = if namespace::is_namespace_id(mosaic.id) {
                    References {
                        tokens: Vec::new(),
                        aliases: vec![id],
                    }
                } else {
                    References {
                        tokens: vec![id],
                        aliases: Vec::new(),
                    }
                };
                refs.merge(found);
            }
        };
        match &built.body {
            TransactionBody::Transfer(body) => visit(body),
            TransactionBody::Aggregate { body, .. } => {
                for inner in &body.transactions {
                    visit(&inner.body);
                }
            }
        }
        Ok(refs)
    }

    fn cosign(
        &self,
        aggregate_hash: &str,
        signer: &PrivateAccount,
    ) -> Result<Cosignature, OperationError> {
        let hash = chain_symbol::keys::parse_key_hex(aggregate_hash)
            .map_err(|e| OperationError::Validation(format!("invalid aggregate hash: {e}")))?;
        let key_pair = KeyPair::from_hex(signer.private_key())?;
        let cosignature = chain::cosign(&key_pair, &hash);
        Ok(Cosignature {
            signer_public_key: hex::encode_upper(cosignature.signer_public_key),
            signature: hex::encode_upper(cosignature.signature),
        })
    }

    fn add_cosignatures(
        &self,
        payload: &[u8],
        cosignatures: &[Cosignature],
        network: &NetworkProperties,
    ) -> Result<SignedTransaction, OperationError> {
        let mut built = chain::Transaction::parse(payload)?;
        let chain_cosignatures = cosignatures
            .iter()
            .map(to_chain_cosignature)
            .collect::<Result<Vec<_>, _>>()?;
        built.add_cosignatures(&chain_cosignatures)?;
        let generation_hash = generation_hash(network)?;
        Ok(SignedTransaction {
            hash: hex::encode_upper(built.hash(&generation_hash)),
            wire_payload: built.serialize(),
        })
    }
}

/// Serialized size of `tx` once signed, including the cosignatures still
/// expected from inner signers.
pub(crate) fn estimated_size(
    tx: &Transaction,
    network: &NetworkProperties,
) -> Result<usize, OperationError> {
    let network_type = network_type(network)?;
    let signer_key = match tx.signer_public_key.as_deref() {
        Some(key) => chain_symbol::keys::parse_key_hex(key)?,
        None => [0u8; 32],
    };
    let built = build(tx, network_type, signer_key, 0, 0, &Sealing::Placeholder)?;
    Ok(built.size() + expected_cosignatures(tx) * COSIGNATURE_SIZE)
}

fn expected_cosignatures(tx: &Transaction) -> usize {
    if !tx.kind.is_aggregate() {
        return 0;
    }
    let signer = tx.signer_public_key.as_deref().map(str::to_ascii_uppercase);
    let mut cosigners: Vec<String> = tx
        .inner_transactions
        .iter()
        .filter_map(|inner| inner.signer_public_key.as_deref())
        .map(str::to_ascii_uppercase)
        .filter(|key| Some(key) != signer.as_ref())
        .filter(|key| {
            !tx.cosignatures
                .iter()
                .any(|c| c.signer_public_key.eq_ignore_ascii_case(key))
        })
        .collect();
    cosigners.sort_unstable();
    cosigners.dedup();
    cosigners.len()
}

fn build(
    tx: &Transaction,
    network: NetworkType,
    signer_key: [u8; 32],
    max_fee: u64,
    deadline: u64,
    sealing: &Sealing<'_>,
) -> Result<chain::Transaction, OperationError> {
    match tx.kind {
        TransactionKind::Transfer => {
            let body = transfer_body(tx, network, sealing)?;
            Ok(chain::Transaction::transfer(signer_key, network, max_fee, deadline, body))
        }
        TransactionKind::AggregateComplete | TransactionKind::AggregateBonded => {
            if tx.inner_transactions.is_empty() {
                return Err(OperationError::Validation(
                    "aggregate needs at least one inner transaction".into(),
                ));
            }
            let inner = tx
                .inner_transactions
                .iter()
                .map(|inner| embedded(inner, network, signer_key, sealing))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(chain::Transaction::aggregate(
                signer_key,
                network,
                max_fee,
                deadline,
                tx.kind == TransactionKind::AggregateBonded,
                inner,
            ))
        }
        TransactionKind::HarvestReward => {
            Err(OperationError::unsupported(Protocol::Symbol, "encode harvest reward"))
        }
    }
}

fn embedded(
    inner: &Transaction,
    network: NetworkType,
    outer_signer: [u8; 32],
    sealing: &Sealing<'_>,
) -> Result<EmbeddedTransaction, OperationError> {
    if inner.kind != TransactionKind::Transfer {
        return Err(OperationError::unsupported(
            Protocol::Symbol,
            "non-transfer inner transaction",
        ));
    }
    let signer_public_key = match inner.signer_public_key.as_deref() {
        Some(key) => chain_symbol::keys::parse_key_hex(key)?,
        None => outer_signer,
    };
    check_signer_address(
        inner,
        &Address::from_public_key(&signer_public_key, network).encode(),
    )?;
    // Inner messages are only sealed by the aggregate signer.
    let sealing = match sealing {
        Sealing::Keys {
            sender: Some(sender),
            recipient_public_key,
        } if sender.public_key() != signer_public_key => Sealing::Keys {
            sender: None,
            recipient_public_key: *recipient_public_key,
        },
        Sealing::Keys {
            sender,
            recipient_public_key,
        } => Sealing::Keys {
            sender: *sender,
            recipient_public_key: *recipient_public_key,
        },
        Sealing::Placeholder => Sealing::Placeholder,
    };
    Ok(EmbeddedTransaction {
        signer_public_key,
        network,
        body: transfer_body(inner, network, &sealing)?,
    })
}

fn transfer_body(
    tx: &Transaction,
    network: NetworkType,
    sealing: &Sealing<'_>,
) -> Result<TransferBody, OperationError> {
    let recipient = tx
        .recipient_address
        .as_deref()
        .ok_or_else(|| OperationError::Validation("transfer needs a recipient".into()))?;
    let mut mosaics = tx
        .tokens
        .iter()
        .map(|token| {
            Ok(Mosaic {
                id: mosaic_id(&token.id)?,
                amount: to_u64(token.absolute_amount()?, "token amount")?,
            })
        })
        .collect::<Result<Vec<_>, OperationError>>()?;
    mosaics.sort_by_key(|m| m.id);

    Ok(TransferBody {
        recipient: recipient_address(recipient, network)?,
        mosaics,
        message: message_bytes(tx.message.as_ref(), sealing)?,
    })
}

/// A 39-character address, otherwise a namespace name used as an alias.
fn recipient_address(recipient: &str, network: NetworkType) -> Result<Address, OperationError> {
    let cleaned = lookup_key(recipient);
    if cleaned.len() == ENCODED_ADDRESS_SIZE {
        let address = Address::parse(&cleaned)?;
        if address.network()? != network {
            return Err(OperationError::Validation(format!(
                "recipient {recipient} belongs to another network"
            )));
        }
        return Ok(address);
    }
    let namespace_id = namespace::namespace_id_from_name(&recipient.to_ascii_lowercase())?;
    Ok(Address::from_namespace_id(namespace_id, network))
}

/// 16 hex characters, otherwise a namespace name (e.g. `symbol.xym`).
fn mosaic_id(id: &str) -> Result<u64, OperationError> {
    if id.len() == 16 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        return u64::from_str_radix(id, 16)
            .map_err(|e| OperationError::Validation(format!("invalid token id {id}: {e}")));
    }
    Ok(namespace::namespace_id_from_name(&id.to_ascii_lowercase())?)
}

fn message_bytes(message: Option<&Message>, sealing: &Sealing<'_>) -> Result<Vec<u8>, OperationError> {
    let Some(message) = message else {
        return Ok(Vec::new());
    };
    if !message.encrypted {
        return Ok(MessagePayload::Plain(message.text.clone()).to_bytes());
    }
    match sealing {
        Sealing::Placeholder => Ok(vec![0u8; 1 + TAG_SIZE + NONCE_SIZE + message.text.len()]),
        Sealing::Keys {
            sender: Some(sender),
            recipient_public_key: Some(recipient),
        } => {
            let recipient = chain_symbol::keys::parse_key_hex(recipient)?;
            Ok(message::encrypt_message(&message.text, sender, &recipient)?)
        }
        Sealing::Keys { .. } => Err(OperationError::Validation(
            "encrypted message needs the signer key and the recipient public key".into(),
        )),
    }
}

fn from_chain(
    built: &chain::Transaction,
    ctx: &DecodeContext,
    hash: Option<&str>,
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
    let signer_public_key = hex::encode_upper(built.signer_public_key);
    let signer_address = Address::from_public_key(&built.signer_public_key, network).encode();
    let mut tx = Transaction {
        signer_public_key: Some(signer_public_key),
        signer_address,
        fee: Some(Token::from_absolute(&native, u128::from(built.max_fee))?),
        deadline: Some(built.deadline + ctx.network.epoch_adjustment * 1000),
        hash: hash.map(str::to_owned),
        ..Default::default()
    };

    match &built.body {
        TransactionBody::Transfer(body) => {
            tx.kind = TransactionKind::Transfer;
            decode_transfer_body(&mut tx, body, ctx)?;
        }
        TransactionBody::Aggregate { bonded, body } => {
            tx.kind = if *bonded {
                TransactionKind::AggregateBonded
            } else {
                TransactionKind::AggregateComplete
            };
            tx.inner_transactions = body
                .transactions
                .iter()
                .map(|inner| {
                    let mut decoded = Transaction {
                        kind: TransactionKind::Transfer,
                        signer_public_key: Some(hex::encode_upper(inner.signer_public_key)),
                        signer_address: Address::from_public_key(&inner.signer_public_key, network)
                            .encode(),
                        aggregate_hash: hash.map(str::to_owned),
                        ..Default::default()
                    };
                    decode_transfer_body(&mut decoded, &inner.body, ctx)?;
                    Ok(decoded)
                })
                .collect::<Result<_, OperationError>>()?;
            let mut cosignatures: Vec<Cosignature> = body
                .cosignatures
                .iter()
                .map(|c| Cosignature {
                    signer_public_key: hex::encode_upper(c.signer_public_key),
                    signature: hex::encode_upper(c.signature),
                })
                .collect();
            cosignatures.sort_by(|a, b| a.signer_public_key.cmp(&b.signer_public_key));
            tx.cosignatures = cosignatures;
        }
    }
    Ok(tx)
}

fn decode_transfer_body(
    tx: &mut Transaction,
    body: &TransferBody,
    ctx: &DecodeContext,
) -> Result<(), OperationError> {
    let recipient = match body.recipient.namespace_id() {
        Some(namespace_id) => ctx
            .resolve_address_alias(&id_hex(namespace_id))
            .map(str::to_owned)
            .ok_or_else(|| {
                OperationError::UnresolvedReference(format!(
                    "address alias {}",
                    id_hex(namespace_id)
                ))
            })?,
        None => body.recipient.encode(),
    };

    tx.tokens = body
        .mosaics
        .iter()
        .map(|mosaic| {
            let mut id = id_hex(mosaic.id);
            if namespace::is_namespace_id(mosaic.id) {
                id = ctx
                    .resolve_token_alias(&id)
                    .map(str::to_owned)
                    .ok_or_else(|| OperationError::UnresolvedReference(format!("token alias {id}")))?;
            }
            let info = ctx
                .token(&id)
                .ok_or_else(|| OperationError::UnresolvedReference(format!("token {id}")))?;
            Token::from_absolute(&info, u128::from(mosaic.amount))
        })
        .collect::<Result<_, _>>()?;

    tx.message = match MessagePayload::from_bytes(&body.message)? {
        None => None,
        Some(MessagePayload::Plain(text)) => Some(Message::plain(text)),
        Some(MessagePayload::Encrypted(sealed)) => Some(decrypt(tx, &recipient, &sealed, ctx)),
        Some(MessagePayload::Raw(bytes)) => Some(Message::plain(hex::encode_upper(bytes))),
    };
    tx.recipient_address = Some(recipient);
    Ok(())
}

/// Opens an encrypted message when the context holds a usable key pair,
/// otherwise keeps the sealed bytes as hex.
fn decrypt(tx: &Transaction, recipient: &str, sealed: &[u8], ctx: &DecodeContext) -> Message {
    let fallback = || Message::encrypted(hex::encode_upper(sealed));
    let Some(account) = ctx.decryption_key.as_ref() else {
        return fallback();
    };
    let signer = tx.signer_public_key.as_deref().unwrap_or_default();
    let counterparty = if account.public_key().eq_ignore_ascii_case(signer) {
        ctx.recipient_public_key(recipient)
    } else {
        Some(signer)
    };
    let opened = counterparty
        .ok_or_else(|| SymbolError::MessageError("no counterparty key".into()))
        .and_then(chain_symbol::keys::parse_key_hex)
        .and_then(|other| {
            let key_pair = KeyPair::from_hex(account.private_key())?;
            message::decrypt_message(sealed, &key_pair, &other)
        });
    match opened {
        Ok(text) => Message::encrypted(text),
        Err(e) => {
            tracing::debug!("message left sealed: {}", e);
            fallback()
        }
    }
}

#[derive(Debug, Default)]
struct Meta {
    height: Option<u64>,
    timestamp: Option<u64>,
    hash: Option<String>,
    aggregate_hash: Option<String>,
}

fn parse_wire(wire: &WireTransaction) -> Result<(chain::Transaction, Meta), OperationError> {
    match wire {
        WireTransaction::Payload(bytes) => Ok((chain::Transaction::parse(bytes)?, Meta::default())),
        WireTransaction::Dto(value) => {
            let info: TransactionInfoDto = serde_json::from_value(value.clone())
                .map_err(|e| OperationError::Validation(format!("invalid transaction record: {e}")))?;
            let meta = info.meta.unwrap_or_default();
            let meta = Meta {
                height: meta.height.as_deref().map(parse_u64).transpose()?,
                timestamp: meta.timestamp.as_deref().map(parse_u64).transpose()?,
                hash: meta.hash,
                aggregate_hash: meta.aggregate_hash,
            };
            Ok((info.transaction.into_chain()?, meta))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionInfoDto {
    transaction: TransactionDto,
    #[serde(default)]
    meta: Option<MetaDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaDto {
    height: Option<String>,
    hash: Option<String>,
    timestamp: Option<String>,
    aggregate_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionDto {
    #[serde(default)]
    signature: Option<String>,
    signer_public_key: String,
    network: u8,
    #[serde(rename = "type")]
    transaction_type: u16,
    #[serde(default)]
    max_fee: Option<String>,
    #[serde(default)]
    deadline: Option<String>,
    #[serde(default)]
    recipient_address: Option<String>,
    #[serde(default)]
    mosaics: Vec<MosaicDto>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    transactions: Vec<EmbeddedInfoDto>,
    #[serde(default)]
    cosignatures: Vec<CosignatureDto>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedInfoDto {
    transaction: TransactionDto,
}

#[derive(Debug, Deserialize)]
struct MosaicDto {
    id: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CosignatureDto {
    signer_public_key: String,
    signature: String,
}

impl TransactionDto {
    fn into_chain(self) -> Result<chain::Transaction, OperationError> {
        let network = NetworkType::from_byte(self.network)?;
        let signer_public_key = chain_symbol::keys::parse_key_hex(&self.signer_public_key)?;
        let max_fee = self.max_fee.as_deref().map(parse_u64).transpose()?.unwrap_or(0);
        let deadline = self.deadline.as_deref().map(parse_u64).transpose()?.unwrap_or(0);
        let signature = match self.signature.as_deref() {
            Some(signature) => parse_signature(signature)?,
            None => [0u8; 64],
        };

        let body = match self.transaction_type {
            chain::TRANSFER_TYPE => TransactionBody::Transfer(self.transfer_body()?),
            chain::AGGREGATE_COMPLETE_TYPE | chain::AGGREGATE_BONDED_TYPE => {
                let bonded = self.transaction_type == chain::AGGREGATE_BONDED_TYPE;
                let transactions = self
                    .transactions
                    .into_iter()
                    .map(|inner| {
                        let inner = inner.transaction;
                        if inner.transaction_type != chain::TRANSFER_TYPE {
                            return Err(SymbolError::UnsupportedTransactionType(
                                inner.transaction_type,
                            )
                            .into());
                        }
                        Ok(EmbeddedTransaction {
                            signer_public_key: chain_symbol::keys::parse_key_hex(
                                &inner.signer_public_key,
                            )?,
                            network: NetworkType::from_byte(inner.network)?,
                            body: inner.transfer_body()?,
                        })
                    })
                    .collect::<Result<Vec<_>, OperationError>>()?;
                let cosignatures = self
                    .cosignatures
                    .iter()
                    .map(|c| {
                        to_chain_cosignature(&Cosignature {
                            signer_public_key: c.signer_public_key.clone(),
                            signature: c.signature.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                TransactionBody::Aggregate {
                    bonded,
                    body: AggregateBody {
                        transactions_hash: chain::merkle_transactions_hash(&transactions),
                        transactions,
                        cosignatures,
                    },
                }
            }
            other => return Err(SymbolError::UnsupportedTransactionType(other).into()),
        };

        Ok(chain::Transaction {
            signature,
            signer_public_key,
            network,
            max_fee,
            deadline,
            body,
        })
    }

    fn transfer_body(&self) -> Result<TransferBody, OperationError> {
        let recipient = self
            .recipient_address
            .as_deref()
            .ok_or_else(|| OperationError::Validation("transfer record without recipient".into()))?;
        let recipient = if recipient.len() == 48 {
            Address::from_hex(recipient)?
        } else {
            Address::parse(recipient)?
        };
        let mosaics = self
            .mosaics
            .iter()
            .map(|m| {
                Ok(Mosaic {
                    id: u64::from_str_radix(&m.id, 16).map_err(|e| {
                        OperationError::Validation(format!("invalid mosaic id {}: {e}", m.id))
                    })?,
                    amount: parse_u64(&m.amount)?,
                })
            })
            .collect::<Result<Vec<_>, OperationError>>()?;
        let message = match self.message.as_deref() {
            Some(hex_message) => hex::decode(hex_message)
                .map_err(|e| OperationError::Validation(format!("invalid message hex: {e}")))?,
            None => Vec::new(),
        };
        Ok(TransferBody {
            recipient,
            mosaics,
            message,
        })
    }
}

fn to_chain_cosignature(cosignature: &Cosignature) -> Result<chain::Cosignature, OperationError> {
    Ok(chain::Cosignature {
        version: 0,
        signer_public_key: chain_symbol::keys::parse_key_hex(&cosignature.signer_public_key)?,
        signature: parse_signature(&cosignature.signature)?,
    })
}

fn parse_signature(signature: &str) -> Result<[u8; 64], OperationError> {
    let bytes = hex::decode(signature)
        .map_err(|e| OperationError::Validation(format!("invalid signature hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| OperationError::Validation("signature must be 64 bytes".into()))
}

fn parse_u64(value: &str) -> Result<u64, OperationError> {
    value
        .parse()
        .map_err(|e| OperationError::Validation(format!("invalid integer '{value}': {e}")))
}

fn to_u64(value: u128, what: &str) -> Result<u64, OperationError> {
    u64::try_from(value).map_err(|_| OperationError::Validation(format!("{what} out of range")))
}

fn id_hex(id: u64) -> String {
    format!("{id:016X}")
}

pub(crate) fn network_type(network: &NetworkProperties) -> Result<NetworkType, OperationError> {
    NetworkType::from_identifier(&network.network_identifier).ok_or_else(|| {
        OperationError::Configuration(format!(
            "unknown symbol network '{}'",
            network.network_identifier
        ))
    })
}

fn generation_hash(network: &NetworkProperties) -> Result<[u8; 32], OperationError> {
    let raw = network.generation_hash.as_deref().ok_or_else(|| {
        OperationError::Configuration("generation hash missing from network properties".into())
    })?;
    chain_symbol::keys::parse_key_hex(raw)
        .map_err(|e| OperationError::Configuration(format!("invalid generation hash: {e}")))
}

/// Unix milliseconds to network-relative milliseconds.
fn network_time(unix_ms: u64, network: &NetworkProperties) -> Result<u64, OperationError> {
    unix_ms
        .checked_sub(network.epoch_adjustment * 1000)
        .ok_or_else(|| OperationError::Validation(format!("time {unix_ms} predates the network epoch")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deriver::AccountDeriver;
    use crate::error::ErrorKind;
    use crate::types::{FeeMultipliers, NativeCurrency, TokenInfo};
    use rust_decimal::Decimal;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const DEADLINE: u64 = 1_700_000_000_000;

    fn network() -> NetworkProperties {
        NetworkProperties {
            protocol: Protocol::Symbol,
            node_url: "http://localhost:3000".into(),
            network_identifier: "testnet".into(),
            network_type: 152,
            generation_hash: Some(
                "49D6E1CE276A85B70EAFE52349AACCA389302E7A9754BCF1221E79494FC665A4".into(),
            ),
            epoch_adjustment: 1_667_250_467,
            chain_height: 100,
            fee_multipliers: FeeMultipliers {
                min: 10,
                average: 100,
                highest: 1000,
            },
            base_fee_per_gas: None,
            native_currency: NativeCurrency {
                id: "72C0212E67A08BCE".into(),
                name: "symbol.xym".into(),
                divisibility: 6,
            },
        }
    }

    fn account(index: u32) -> PrivateAccount {
        AccountDeriver::new(Protocol::Symbol)
            .derive_account(MNEMONIC, index, "testnet", "test")
            .unwrap()
    }

    fn xym(amount: Decimal) -> Token {
        Token::new(&network().native_currency.token_info(), amount)
    }

    fn transfer(from: &PrivateAccount, to: &PrivateAccount, message: Option<Message>) -> Transaction {
        Transaction {
            kind: TransactionKind::Transfer,
            signer_public_key: Some(from.public_key().to_owned()),
            signer_address: from.address().to_owned(),
            recipient_address: Some(to.address().to_owned()),
            tokens: vec![xym(Decimal::new(15, 1))],
            fee: Some(xym(Decimal::new(1, 1))),
            deadline: Some(DEADLINE),
            message,
            ..Default::default()
        }
    }

    fn sign(tx: &Transaction, signer: &PrivateAccount) -> SignedTransaction {
        SymbolCodec.sign(tx, &network(), signer).unwrap()
    }

    #[test]
    fn transfer_round_trip() {
        let (alice, bob) = (account(0), account(1));
        let tx = transfer(&alice, &bob, Some(Message::plain("hello")));
        let signed = sign(&tx, &alice);
        assert_eq!(signed.hash.len(), 64);

        let decoded = SymbolCodec
            .from_wire(
                &WireTransaction::Payload(signed.wire_payload.clone()),
                &DecodeContext::new(network()),
            )
            .unwrap();
        assert_eq!(decoded.hash.as_deref(), Some(signed.hash.as_str()));
        assert_eq!(decoded.without_chain_metadata(), tx);
    }

    #[test]
    fn encrypted_message_round_trip() {
        let (alice, bob) = (account(0), account(1));
        let tx = transfer(&alice, &bob, Some(Message::encrypted("secret note")));
        let network = network();
        let ctx = EncodeContext::new(&network)
            .signed_by(&alice)
            .with_recipient_public_key(bob.public_key());
        let signed = SymbolCodec.sign_with(&tx, &ctx).unwrap();
        let wire = WireTransaction::Payload(signed.wire_payload);

        let mut as_recipient = DecodeContext::new(network.clone());
        as_recipient.decryption_key = Some(bob.clone());
        let decoded = SymbolCodec.from_wire(&wire, &as_recipient).unwrap();
        assert_eq!(decoded.without_chain_metadata(), tx);

        let mut as_sender = DecodeContext::new(network.clone());
        as_sender.decryption_key = Some(alice.clone());
        as_sender.add_recipient_public_key(bob.address(), bob.public_key());
        let decoded = SymbolCodec.from_wire(&wire, &as_sender).unwrap();
        assert_eq!(decoded.message, Some(Message::encrypted("secret note")));

        let sealed = SymbolCodec
            .from_wire(&wire, &DecodeContext::new(network))
            .unwrap()
            .message
            .unwrap();
        assert!(sealed.encrypted);
        assert_ne!(sealed.text, "secret note");
    }

    #[test]
    fn encrypted_message_without_recipient_key_fails() {
        let (alice, bob) = (account(0), account(1));
        let tx = transfer(&alice, &bob, Some(Message::encrypted("x")));
        let err = SymbolCodec.sign(&tx, &network(), &alice).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn aggregate_round_trip_with_cosignature() {
        let (alice, bob, carol) = (account(0), account(1), account(2));
        let network = network();
        let mut from_bob = transfer(&bob, &carol, None);
        from_bob.fee = None;
        from_bob.deadline = None;
        let mut from_alice = transfer(&alice, &carol, Some(Message::plain("split")));
        from_alice.fee = None;
        from_alice.deadline = None;

        let mut tx = Transaction {
            kind: TransactionKind::AggregateComplete,
            signer_public_key: Some(alice.public_key().to_owned()),
            signer_address: alice.address().to_owned(),
            fee: Some(xym(Decimal::new(5, 1))),
            deadline: Some(DEADLINE),
            inner_transactions: vec![from_alice, from_bob],
            ..Default::default()
        };
        let signed = SymbolCodec.sign(&tx, &network, &alice).unwrap();
        let cosignature = SymbolCodec.cosign(&signed.hash, &bob).unwrap();
        let cosigned = SymbolCodec
            .add_cosignatures(&signed.wire_payload, &[cosignature.clone()], &network)
            .unwrap();
        assert_eq!(cosigned.hash, signed.hash);
        assert_eq!(
            cosigned.wire_payload.len(),
            signed.wire_payload.len() + COSIGNATURE_SIZE
        );

        let decoded = SymbolCodec
            .from_wire(
                &WireTransaction::Payload(cosigned.wire_payload),
                &DecodeContext::new(network),
            )
            .unwrap();
        assert!(decoded
            .inner_transactions
            .iter()
            .all(|inner| inner.aggregate_hash.as_deref() == Some(signed.hash.as_str())));
        tx.cosignatures = vec![cosignature];
        assert_eq!(decoded.without_chain_metadata(), tx);
    }

    #[test]
    fn missing_fee_uses_medium_tier() {
        let (alice, bob) = (account(0), account(1));
        let mut tx = transfer(&alice, &bob, None);
        tx.fee = None;
        let size = estimated_size(&tx, &network()).unwrap();
        let signed = sign(&tx, &alice);
        assert_eq!(signed.wire_payload.len(), size);

        let decoded = SymbolCodec
            .from_wire(
                &WireTransaction::Payload(signed.wire_payload),
                &DecodeContext::new(network()),
            )
            .unwrap();
        let fee = decoded.fee.unwrap().absolute_amount().unwrap();
        assert_eq!(fee, size as u128 * 100);
    }

    #[test]
    fn aggregate_size_counts_missing_cosigners() {
        let (alice, bob) = (account(0), account(1));
        let inner = Transaction {
            fee: None,
            deadline: None,
            ..transfer(&bob, &alice, None)
        };
        let tx = Transaction {
            kind: TransactionKind::AggregateBonded,
            signer_public_key: Some(alice.public_key().to_owned()),
            signer_address: alice.address().to_owned(),
            inner_transactions: vec![inner],
            ..Default::default()
        };
        assert_eq!(expected_cosignatures(&tx), 1);
        let unsigned_size = match SymbolCodec
            .to_wire(
                &Transaction {
                    fee: Some(xym(Decimal::ONE)),
                    deadline: Some(DEADLINE),
                    ..tx.clone()
                },
                &EncodeContext::new(&network()),
            )
            .unwrap()
        {
            Wire::Unsigned(bytes) => bytes.len(),
            Wire::Signed(_) => panic!("no signer was supplied"),
        };
        assert_eq!(
            estimated_size(&tx, &network()).unwrap(),
            unsigned_size + COSIGNATURE_SIZE
        );
    }

    #[test]
    fn signer_address_mismatch_is_rejected() {
        let (alice, bob) = (account(0), account(1));
        let mut tx = transfer(&alice, &bob, None);
        tx.signer_address = bob.address().to_owned();
        let err = SymbolCodec.sign(&tx, &network(), &alice).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn harvest_reward_cannot_be_encoded() {
        let tx = Transaction {
            kind: TransactionKind::HarvestReward,
            ..Default::default()
        };
        let err = SymbolCodec
            .to_wire(&tx, &EncodeContext::new(&network()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn aliases_resolve_through_context() {
        let alice = account(0);
        let tx = Transaction {
            kind: TransactionKind::Transfer,
            signer_public_key: Some(alice.public_key().to_owned()),
            signer_address: alice.address().to_owned(),
            recipient_address: Some("alice".into()),
            tokens: vec![Token {
                id: "symbol.xym".into(),
                name: "symbol.xym".into(),
                amount: Decimal::ONE,
                divisibility: 6,
            }],
            fee: Some(xym(Decimal::ONE)),
            deadline: Some(DEADLINE),
            ..Default::default()
        };
        let signed = sign(&tx, &alice);
        let wire = WireTransaction::Payload(signed.wire_payload);

        let refs = SymbolCodec.references(&wire).unwrap();
        let recipient_alias = id_hex(namespace::namespace_id_from_name("alice").unwrap());
        let token_alias = id_hex(namespace::namespace_id_from_name("symbol.xym").unwrap());
        assert_eq!(refs.aliases, vec![recipient_alias.clone(), token_alias.clone()]);
        assert!(refs.tokens.is_empty());

        let err = SymbolCodec
            .from_wire(&wire, &DecodeContext::new(network()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);

        let bob = account(1);
        let mut ctx = DecodeContext::new(network());
        ctx.add_address_alias(&recipient_alias, bob.address());
        ctx.add_token_alias(&token_alias, "72C0212E67A08BCE");
        let decoded = SymbolCodec.from_wire(&wire, &ctx).unwrap();
        assert_eq!(decoded.recipient_address.as_deref(), Some(bob.address()));
        assert_eq!(decoded.tokens[0].name, "symbol.xym");
        assert_eq!(decoded.tokens[0].amount, Decimal::ONE);
    }

    #[test]
    fn unknown_token_is_unresolved() {
        let (alice, bob) = (account(0), account(1));
        let mut tx = transfer(&alice, &bob, None);
        tx.tokens = vec![Token {
            id: "3A8416DB2D53B6C8".into(),
            name: "custom".into(),
            amount: Decimal::new(25, 1),
            divisibility: 2,
        }];
        let wire = WireTransaction::Payload(sign(&tx, &alice).wire_payload);
        let err = SymbolCodec
            .from_wire(&wire, &DecodeContext::new(network()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);

        let mut ctx = DecodeContext::new(network());
        ctx.add_token(TokenInfo {
            id: "3A8416DB2D53B6C8".into(),
            name: "custom".into(),
            divisibility: 2,
        });
        let decoded = SymbolCodec.from_wire(&wire, &ctx).unwrap();
        assert_eq!(decoded.without_chain_metadata(), tx);
    }

    #[test]
    fn rest_record_decodes_with_meta() {
        let (alice, bob) = (account(0), account(1));
        let recipient = Address::parse(bob.address()).unwrap();
        let record = serde_json::json!({
            "meta": {
                "height": "1200",
                "hash": "aa".repeat(32),
                "timestamp": "5000"
            },
            "transaction": {
                "signerPublicKey": alice.public_key(),
                "network": 152,
                "type": 16724,
                "maxFee": "20000",
                "deadline": "7000",
                "recipientAddress": hex::encode_upper(recipient.0),
                "mosaics": [{"id": "72C0212E67A08BCE", "amount": "3000000"}],
                "message": "0068690a"
            }
        });
        let decoded = SymbolCodec
            .from_wire(&WireTransaction::Dto(record), &DecodeContext::new(network()))
            .unwrap();
        let epoch_ms = network().epoch_adjustment * 1000;
        assert_eq!(decoded.height, Some(1200));
        assert_eq!(decoded.timestamp, Some(5000 + epoch_ms));
        assert_eq!(decoded.deadline, Some(7000 + epoch_ms));
        assert_eq!(decoded.hash, Some("AA".repeat(32)));
        assert!(decoded.is_confirmed());
        assert_eq!(decoded.recipient_address.as_deref(), Some(bob.address()));
        assert_eq!(decoded.signer_address, alice.address());
        assert_eq!(decoded.tokens[0].amount, Decimal::from(3));
        assert_eq!(decoded.message, Some(Message::plain("hi\n")));
    }

    #[test]
    fn unsupported_record_type_is_reported() {
        let alice = account(0);
        let record = serde_json::json!({
            "transaction": {
                "signerPublicKey": alice.public_key(),
                "network": 152,
                "type": 16718
            }
        });
        let err = SymbolCodec
            .from_wire(&WireTransaction::Dto(record), &DecodeContext::new(network()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
