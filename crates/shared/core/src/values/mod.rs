use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

/// Asset amount - uses Decimal for precision
/// Future: could become a newtype with validation (non-negative)
pub type Amount = Decimal;

/// Basis points (1/100 of a percent)
pub type Bps = u32;

/// 10000 bps = 100%
pub const BPS_DENOMINATOR: Bps = 10_000;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Largest amount the vault accepts from a single strategy call.
/// Sums over every strategy and the pool, and their bps products, stay
/// inside `Decimal` range below this bound.
pub const MAX_REPORTED_AMOUNT: Amount = dec!(1_000_000_000_000_000_000_000);

/// `Some(amount)` if a strategy-reported amount is usable: non-negative and
/// at most [`MAX_REPORTED_AMOUNT`]
pub fn reported_amount(amount: Amount) -> Option<Amount> {
    (amount >= Decimal::ZERO && amount <= MAX_REPORTED_AMOUNT).then_some(amount)
}

/// `amount * bps / 10000`, dividing first if the product would overflow
pub fn apply_bps(amount: Amount, bps: Bps) -> Amount {
    let bps = Decimal::from(bps);
    let denominator = Decimal::from(BPS_DENOMINATOR);
    match amount.checked_mul(bps) {
        Some(product) => product / denominator,
        None => amount / denominator * bps,
    }
}

/// Share of `part` in `whole`, in basis points, rounded down.
///
/// Returns 0 for an empty (or negative) whole so an empty vault never divides by zero.
pub fn ratio_bps(part: Amount, whole: Amount) -> Bps {
    if whole <= Decimal::ZERO || part <= Decimal::ZERO {
        return 0;
    }
    let denominator = Decimal::from(BPS_DENOMINATOR);
    part.checked_mul(denominator)
        .and_then(|scaled| scaled.checked_div(whole))
        .or_else(|| part.checked_div(whole).and_then(|ratio| ratio.checked_mul(denominator)))
        .and_then(|bps| bps.floor().to_u32())
        .unwrap_or(Bps::MAX)
}
