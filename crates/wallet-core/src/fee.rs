//! Fee tiers per protocol.
//!
//! - Symbol prices by serialized size times a network fee multiplier.
//! - Ethereum prices by gas: an estimated limit times base fee plus a
//!   priority tip taken from recent fee history.
//! - NEM follows a fixed schedule, so every tier is the same.

use chain_nem::fee::transfer_fee;

use crate::error::OperationError;
use crate::protocol::{ethereum, symbol};
use crate::types::{
    Gas, Message, NetworkProperties, Protocol, Token, Transaction, TransactionFee,
    TransactionFeeTiers,
};

/// Gas used by a plain value transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;
/// Gas assumed for an ERC-20 `transfer`.
pub const ERC20_TRANSFER_GAS: u64 = 65_000;
/// Calldata cost of a non-zero byte.
pub const GAS_PER_MEMO_BYTE: u64 = 16;

#[derive(Debug, Clone, Copy)]
pub struct FeeCalculator {
    protocol: Protocol,
}

impl FeeCalculator {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    /// Always returns `slow <= medium <= fast`.
    pub fn compute_fee_tiers(
        &self,
        tx: &Transaction,
        network: &NetworkProperties,
    ) -> Result<TransactionFeeTiers, OperationError> {
        match self.protocol {
            Protocol::Symbol => size_priced(tx, network),
            Protocol::Ethereum => gas_priced(tx, network),
            Protocol::Nem => schedule_priced(tx, network),
        }
    }
}

fn sorted_multipliers(network: &NetworkProperties) -> [u64; 3] {
    let m = &network.fee_multipliers;
    let mut tiers = [m.min, m.average, m.highest];
    tiers.sort_unstable();
    tiers
}

fn size_priced(
    tx: &Transaction,
    network: &NetworkProperties,
) -> Result<TransactionFeeTiers, OperationError> {
    let size = symbol::estimated_size(tx, network)? as u128;
    let native = network.native_currency.token_info();
    let [slow, medium, fast] = sorted_multipliers(network).map(|multiplier| {
        Token::from_absolute(&native, size * u128::from(multiplier)).map(|token| TransactionFee {
            token,
            gas: None,
        })
    });
    Ok(TransactionFeeTiers {
        slow: slow?,
        medium: medium?,
        fast: fast?,
    })
}

/// Fixed gas estimate; no node round trip.
pub fn estimate_gas_limit(tx: &Transaction, network: &NetworkProperties) -> u64 {
    let base = match tx.tokens.first() {
        Some(token) if !ethereum::is_native(&token.id, network) => ERC20_TRANSFER_GAS,
        _ => NATIVE_TRANSFER_GAS,
    };
    let memo_len = tx.message.as_ref().map_or(0, |m: &Message| m.text.len()) as u64;
    base + memo_len * GAS_PER_MEMO_BYTE
}

fn gas_priced(
    tx: &Transaction,
    network: &NetworkProperties,
) -> Result<TransactionFeeTiers, OperationError> {
    let base_fee = network.base_fee_per_gas.ok_or_else(|| {
        OperationError::Configuration("base fee missing from network properties".into())
    })?;
    let limit = estimate_gas_limit(tx, network);
    let native = network.native_currency.token_info();

    let [slow, medium, fast] = sorted_multipliers(network).map(|priority| {
        let gas = Gas {
            limit,
            max_fee_per_gas: u128::from(base_fee) + u128::from(priority),
            max_priority_fee_per_gas: u128::from(priority),
        };
        Token::from_absolute(&native, u128::from(limit) * gas.max_fee_per_gas).map(|token| {
            TransactionFee {
                token,
                gas: Some(gas),
            }
        })
    });
    Ok(TransactionFeeTiers {
        slow: slow?,
        medium: medium?,
        fast: fast?,
    })
}

fn schedule_priced(
    tx: &Transaction,
    network: &NetworkProperties,
) -> Result<TransactionFeeTiers, OperationError> {
    let amount = tx
        .tokens
        .iter()
        .map(Token::absolute_amount)
        .sum::<Result<u128, _>>()?;
    let amount = u64::try_from(amount)
        .map_err(|_| OperationError::Validation("amount out of range".into()))?;
    let message_len = tx.message.as_ref().map_or(0, |m| m.text.len());
    let fee = TransactionFee {
        token: Token::from_absolute(
            &network.native_currency.token_info(),
            u128::from(transfer_fee(amount, message_len)),
        )?,
        gas: None,
    };
    Ok(TransactionFeeTiers {
        slow: fee.clone(),
        medium: fee.clone(),
        fast: fee,
    })
}
