use crate::error::PaymentError;
use alloy_primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::str::FromStr;

/// USDC's on-chain decimals.
const USDC_SCALE: Decimal = dec!(1_000_000);

/// Parses a decimal USD string and converts it to USDC base units
/// (`round(amountUSD * 1_000_000)`, banker's rounding / round-half-to-even,
/// matching how a ledger that must balance to the cent would round).
pub fn usd_to_units(amount_usd: &str) -> Result<U256, PaymentError> {
    let amount = Decimal::from_str(amount_usd.trim())
        .map_err(|_| PaymentError::InvalidAmount(format!("not a number: {amount_usd}")))?;
    decimal_to_units(amount)
}

pub fn decimal_to_units(amount: Decimal) -> Result<U256, PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }

    let scaled = (amount * USDC_SCALE).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    let units: i64 = scaled
        .to_i64()
        .ok_or_else(|| PaymentError::InvalidAmount(format!("amount out of range: {amount}")))?;
    Ok(U256::from(units as u64))
}

/// The outcome of checking an amount against the configured safety ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountCheck {
    Ok,
    /// Above the ceiling but within `ceiling * warning_band_multiplier`; the
    /// caller must have an explicit acknowledgment to proceed.
    Warning,
}

/// Checks `amount_usd` against `ceiling` and `ceiling * warning_band`.
/// Above the warning band is a hard `invalid-amount` failure.
pub fn check_ceiling(
    amount_usd: f64,
    ceiling: f64,
    warning_band_multiplier: f64,
) -> Result<AmountCheck, PaymentError> {
    if amount_usd <= ceiling {
        return Ok(AmountCheck::Ok);
    }
    if amount_usd <= ceiling * warning_band_multiplier {
        return Ok(AmountCheck::Warning);
    }
    Err(PaymentError::InvalidAmount(format!(
        "{amount_usd} exceeds the safety ceiling of {ceiling} (even with warning band)"
    )))
}
