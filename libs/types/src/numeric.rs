//! Decimal helpers for prices
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Stored values keep full precision; rounding happens only when a value is
//! rendered for clients, using HALF_UP.

use rust_decimal::{Decimal, RoundingStrategy};

/// Largest scale rust_decimal can represent.
pub const MAX_DISPLAY_DP: u32 = 28;

/// Arithmetic mean of bid and ask.
///
/// Returns `None` if the sum overflows the decimal range.
pub fn mid_price(bid: Decimal, ask: Decimal) -> Option<Decimal> {
    bid.checked_add(ask)?.checked_div(Decimal::TWO)
}

/// Round to display precision, HALF_UP.
pub fn round_display(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}
