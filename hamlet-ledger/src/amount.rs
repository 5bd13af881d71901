use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::{LedgerError, LedgerResult};

/// Reject negative amounts before any backend call.
pub fn validate_amount(amount: Decimal) -> LedgerResult<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must not be negative, got {amount}"
        )));
    }
    Ok(amount)
}

/// Convert a floating-point amount, rejecting NaN, infinities and negatives.
pub fn amount_from_f64(value: f64) -> LedgerResult<Decimal> {
    if !value.is_finite() {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must be finite, got {value}"
        )));
    }
    let amount = Decimal::from_f64(value).ok_or_else(|| {
        LedgerError::InvalidAmount(format!("amount {value} is out of range"))
    })?;
    validate_amount(amount)
}
