//! Ethereum codec: EIP-1559 raw transactions and explorer `txlist` records.

use chain_eth::address;
use chain_eth::chains;
use chain_eth::erc20;
use chain_eth::transaction::{self as chain, GasParams};
use serde::Deserialize;
use zeroize::Zeroize;

use super::{
    check_signer_address, resolve_signer_key, DecodeContext, EncodeContext, References,
    TransactionCodec,
};
use crate::deriver::{parse_private_key, strip_0x};
use crate::error::OperationError;
use crate::fee::FeeCalculator;
use crate::types::{
    Gas, Message, NetworkProperties, Protocol, SignedTransaction, Token, Transaction,
    TransactionKind, Wire, WireTransaction,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct EthereumCodec;

impl TransactionCodec for EthereumCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Ethereum
    }

    fn to_wire(&self, tx: &Transaction, ctx: &EncodeContext<'_>) -> Result<Wire, OperationError> {
        if tx.kind != TransactionKind::Transfer {
            return Err(OperationError::unsupported(
                Protocol::Ethereum,
                format!("{:?} transactions", tx.kind),
            ));
        }
        let chain_id = chain_id(ctx.network)?;
        if let Some(public_key) = resolve_signer_key(tx, ctx.signer)? {
            let bytes = hex::decode(strip_0x(&public_key))
                .map_err(|e| OperationError::Validation(format!("invalid public key: {e}")))?;
            check_signer_address(tx, &address::address_from_public_key(&bytes)?)?;
        }

        let memo = memo_bytes(tx.message.as_ref())?;
        let nonce = tx
            .nonce
            .ok_or_else(|| OperationError::Validation("ethereum transfer needs a nonce".into()))?;
        let gas = resolve_gas(tx, ctx.network)?;
        let gas = GasParams {
            gas_limit: gas.limit,
            max_fee_per_gas: gas.max_fee_per_gas,
            max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
        };

        let recipient = tx
            .recipient_address
            .as_deref()
            .ok_or_else(|| OperationError::Validation("transfer needs a recipient".into()))?;
        let token = single_token(tx)?;
        let amount = token.absolute_amount()?;
        let built = if is_native(&token.id, ctx.network) {
            chain::build_transfer(chain_id, nonce, recipient, amount, gas, &memo)?
        } else {
            chain::build_erc20_transfer(chain_id, nonce, &token.id, recipient, amount, gas, &memo)?
        };

        let Some(signer) = ctx.signer else {
            return Ok(Wire::Unsigned(chain::encode_unsigned_tx(&built)?));
        };
        let mut private_key = parse_private_key(Protocol::Ethereum, signer.private_key())?;
        let signed = chain::sign_transaction(&built, &private_key);
        private_key.zeroize();
        let signed = signed?;
        tracing::debug!(nonce, chain_id, "signed ethereum transaction");
        Ok(Wire::Signed(SignedTransaction {
            hash: signed.tx_hash_hex(),
            wire_payload: signed.raw_tx,
        }))
    }

    fn from_wire(
        &self,
        wire: &WireTransaction,
        ctx: &DecodeContext,
    ) -> Result<Transaction, OperationError> {
        match wire {
            WireTransaction::Payload(raw) => decode_raw(raw, ctx),
            WireTransaction::Dto(value) => {
                let record: ExplorerTransaction = serde_json::from_value(value.clone())
                    .map_err(|e| OperationError::Validation(format!("invalid explorer record: {e}")))?;
                record.into_canonical(ctx)
            }
        }
    }

    fn references(&self, wire: &WireTransaction) -> Result<References, OperationError> {
        let (to, data) = match wire {
            WireTransaction::Payload(raw) => {
                let decoded = chain::decode_signed_transaction(raw)?;
                (decoded.transaction.to, decoded.transaction.data)
            }
            WireTransaction::Dto(value) => {
                let record: ExplorerTransaction = serde_json::from_value(value.clone())
                    .map_err(|e| OperationError::Validation(format!("invalid explorer record: {e}")))?;
                (record.to, hex_data(&record.input)?)
            }
        };
        let mut refs = References::default();
        if erc20::decode_transfer(&data)?.is_some() {
            refs.tokens.push(address::checksum_address(&to)?);
        }
        Ok(refs)
    }
}

fn decode_raw(raw: &[u8], ctx: &DecodeContext) -> Result<Transaction, OperationError> {
    let decoded = chain::decode_signed_transaction(raw)?;
    let expected = chain_id(&ctx.network)?;
    if decoded.transaction.chain_id != expected {
        return Err(OperationError::Validation(format!(
            "transaction for chain {} decoded on chain {expected}",
            decoded.transaction.chain_id
        )));
    }
    let built = &decoded.transaction;
    let (recipient, token, memo) = transfer_parts(&built.to, built.value, &built.data, ctx)?;
    let native = ctx.network.native_currency.token_info();
    let fee = u128::from(built.gas_limit)
        .checked_mul(built.max_fee_per_gas)
        .ok_or_else(|| OperationError::Validation("fee overflows".into()))?;

    Ok(Transaction {
        kind: TransactionKind::Transfer,
        signer_public_key: Some(format!("0x{}", hex::encode(decoded.signer_public_key))),
        signer_address: decoded.signer,
        recipient_address: Some(recipient),
        tokens: vec![token],
        fee: Some(Token::from_absolute(&native, fee)?),
        hash: Some(format!("0x{}", hex::encode(decoded.tx_hash))),
        message: memo,
        nonce: Some(built.nonce),
        gas: Some(Gas {
            limit: built.gas_limit,
            max_fee_per_gas: built.max_fee_per_gas,
            max_priority_fee_per_gas: built.max_priority_fee_per_gas,
        }),
        ..Default::default()
    })
}

/// Splits a call into recipient, transferred token and memo. ERC-20
/// `transfer` calldata names the real recipient; the memo trails it.
fn transfer_parts(
    to: &str,
    value: u128,
    data: &[u8],
    ctx: &DecodeContext,
) -> Result<(String, Token, Option<Message>), OperationError> {
    if let Some(transfer) = erc20::decode_transfer(data)? {
        let contract = address::checksum_address(to)?;
        let info = ctx.token(&contract).ok_or_else(|| {
            OperationError::UnresolvedReference(format!("ERC-20 contract {contract}"))
        })?;
        return Ok((
            address::checksum_bytes(&transfer.to),
            Token::from_absolute(&info, transfer.amount)?,
            memo_message(&transfer.trailing),
        ));
    }
    let native = ctx.network.native_currency.token_info();
    Ok((
        address::checksum_address(to)?,
        Token::from_absolute(&native, value)?,
        memo_message(data),
    ))
}

fn gas_fee(gas: &Gas) -> Result<u128, OperationError> {
    u128::from(gas.limit)
        .checked_mul(gas.max_fee_per_gas)
        .ok_or_else(|| OperationError::Validation("fee overflows".into()))
}

/// Gas to sign with. An explicit `fee` must equal limit times max fee per
/// gas; without `gas` it selects the fee tier of that amount, and without
/// either the medium tier is used.
fn resolve_gas(tx: &Transaction, network: &NetworkProperties) -> Result<Gas, OperationError> {
    let fee = tx.fee.as_ref().map(Token::absolute_amount).transpose()?;
    if let Some(gas) = tx.gas {
        if let Some(fee) = fee {
            if fee != gas_fee(&gas)? {
                return Err(OperationError::Validation(
                    "fee does not match gas limit times max fee per gas".into(),
                ));
            }
        }
        return Ok(gas);
    }
    let tiers = FeeCalculator::new(Protocol::Ethereum).compute_fee_tiers(tx, network)?;
    let tier = match fee {
        None => &tiers.medium,
        Some(fee) => [&tiers.slow, &tiers.medium, &tiers.fast]
            .into_iter()
            .find(|tier| tier.token.absolute_amount().ok() == Some(fee))
            .ok_or_else(|| {
                OperationError::Validation("fee matches no fee tier, set gas explicitly".into())
            })?,
    };
    tier.gas
        .ok_or_else(|| OperationError::Validation("fee tier without gas".into()))
}

fn memo_bytes(message: Option<&Message>) -> Result<Vec<u8>, OperationError> {
    match message {
        None => Ok(Vec::new()),
        Some(message) if message.encrypted => Err(OperationError::unsupported(
            Protocol::Ethereum,
            "encrypted messages",
        )),
        Some(message) => Ok(message.text.as_bytes().to_vec()),
    }
}

fn memo_message(data: &[u8]) -> Option<Message> {
    if data.is_empty() {
        return None;
    }
    Some(match std::str::from_utf8(data) {
        Ok(text) => Message::plain(text),
        Err(_) => Message::plain(format!("0x{}", hex::encode(data))),
    })
}

fn single_token(tx: &Transaction) -> Result<&Token, OperationError> {
    match tx.tokens.as_slice() {
        [token] => Ok(token),
        tokens => Err(OperationError::Validation(format!(
            "ethereum transfers carry exactly one token, got {}",
            tokens.len()
        ))),
    }
}

pub(crate) fn is_native(token_id: &str, network: &NetworkProperties) -> bool {
    token_id.eq_ignore_ascii_case(&network.native_currency.id)
}

fn chain_id(network: &NetworkProperties) -> Result<u64, OperationError> {
    Ok(chains::network_by_chain_id(network.network_type)?.chain_id)
}

fn hex_data(input: &str) -> Result<Vec<u8>, OperationError> {
    hex::decode(strip_0x(input))
        .map_err(|e| OperationError::Validation(format!("invalid calldata hex: {e}")))
}

/// One entry of an Etherscan-compatible `account/txlist` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerTransaction {
    block_number: String,
    time_stamp: String,
    hash: String,
    nonce: String,
    from: String,
    to: String,
    value: String,
    gas: String,
    gas_price: String,
    gas_used: String,
    #[serde(default)]
    input: String,
}

impl ExplorerTransaction {
    fn into_canonical(self, ctx: &DecodeContext) -> Result<Transaction, OperationError> {
        let value = parse_decimal(&self.value)?;
        let gas_price = parse_decimal(&self.gas_price)?;
        let gas_used = parse_decimal(&self.gas_used)?;
        let data = hex_data(&self.input)?;
        let (recipient, token, memo) = transfer_parts(&self.to, value, &data, ctx)?;
        let native = ctx.network.native_currency.token_info();
        let fee = gas_used
            .checked_mul(gas_price)
            .ok_or_else(|| OperationError::Validation("fee overflows".into()))?;

        Ok(Transaction {
            kind: TransactionKind::Transfer,
            signer_address: address::checksum_address(&self.from)?,
            recipient_address: Some(recipient),
            tokens: vec![token],
            fee: Some(Token::from_absolute(&native, fee)?),
            timestamp: Some(parse_u64(&self.time_stamp)? * 1000),
            height: Some(parse_u64(&self.block_number)?),
            hash: Some(self.hash.to_ascii_lowercase()),
            message: memo,
            nonce: Some(parse_u64(&self.nonce)?),
            gas: Some(Gas {
                limit: parse_u64(&self.gas)?,
                max_fee_per_gas: gas_price,
                max_priority_fee_per_gas: 0,
            }),
            ..Default::default()
        })
    }
}

fn parse_decimal(value: &str) -> Result<u128, OperationError> {
    value
        .parse()
        .map_err(|e| OperationError::Validation(format!("invalid integer '{value}': {e}")))
}

fn parse_u64(value: &str) -> Result<u64, OperationError> {
    value
        .parse()
        .map_err(|e| OperationError::Validation(format!("invalid integer '{value}': {e}")))
}
