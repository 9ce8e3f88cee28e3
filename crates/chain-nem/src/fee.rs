//! NIS1 transfer fee schedule, in micro-XEM.

/// 0.05 XEM.
pub const FEE_UNIT: u64 = 50_000;

const MICRO_PER_XEM: u64 = 1_000_000;
const XEM_PER_FEE_UNIT: u64 = 10_000;
const MAX_AMOUNT_UNITS: u64 = 25;
const MESSAGE_BYTES_PER_UNIT: usize = 32;

/// One unit per 10 000 XEM transferred (at least 1, at most 25), plus one
/// unit per started 32 bytes of message payload.
pub fn transfer_fee(amount_micro_xem: u64, message_payload_len: usize) -> u64 {
    let xem = amount_micro_xem / MICRO_PER_XEM;
    let amount_units = (xem / XEM_PER_FEE_UNIT).clamp(1, MAX_AMOUNT_UNITS);
    amount_units * FEE_UNIT + message_fee(message_payload_len)
}

pub fn message_fee(message_payload_len: usize) -> u64 {
    if message_payload_len == 0 {
        return 0;
    }
    (message_payload_len / MESSAGE_BYTES_PER_UNIT + 1) as u64 * FEE_UNIT
}
