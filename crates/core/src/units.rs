//! Decimal string <-> base unit conversion at a token's precision.
//!
//! Bounds are configured as human-readable decimal strings ("100",
//! "0.5", "-1") and converted once at startup using the settlement
//! token's on-chain decimals. Conversion is alloy's `parse_units`; the
//! only addition is that digits beyond the token's precision are an
//! error instead of being silently truncated.

use alloy::primitives::utils::{self, ParseUnits};
use alloy::primitives::{I256, U256};
use thiserror::Error;

/// Error raised when a decimal string cannot be represented in base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,

    #[error("invalid decimal number {0:?}")]
    InvalidNumber(String),

    #[error("{found} fractional digits exceed the token's {decimals} decimals")]
    TooManyDecimals { decimals: u8, found: usize },

    #[error("negative amount {0:?} where an unsigned value is required")]
    Negative(String),

    #[error("cannot convert amount: {0}")]
    Conversion(String),
}

/// Reject malformed numbers and precision the token cannot hold.
///
/// Trailing zeros in the fraction carry no precision.
fn check_precision(amount: &str, decimals: u8) -> Result<(), UnitsError> {
    let invalid = || UnitsError::InvalidNumber(amount.to_string());

    let digits = amount.strip_prefix('-').unwrap_or(amount);
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let found = fraction.trim_end_matches('0').len();
    if found > decimals as usize {
        return Err(UnitsError::TooManyDecimals { decimals, found });
    }
    Ok(())
}

fn parse(amount: &str, decimals: u8) -> Result<ParseUnits, UnitsError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(UnitsError::Empty);
    }
    check_precision(amount, decimals)?;
    utils::parse_units(amount, decimals).map_err(|e| UnitsError::Conversion(e.to_string()))
}

/// Parse a non-negative decimal string at `decimals` precision.
///
/// `parse_units("100.5", 6) == 100_500_000`
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, UnitsError> {
    match parse(amount, decimals)? {
        ParseUnits::U256(value) => Ok(value),
        // "-0" is still zero.
        ParseUnits::I256(value) if value.is_zero() => Ok(U256::ZERO),
        ParseUnits::I256(value) if value.is_negative() => {
            Err(UnitsError::Negative(amount.trim().to_string()))
        }
        ParseUnits::I256(value) => Ok(value.unsigned_abs()),
    }
}

/// Parse a signed decimal string at `decimals` precision.
pub fn parse_signed_units(amount: &str, decimals: u8) -> Result<I256, UnitsError> {
    match parse(amount, decimals)? {
        ParseUnits::I256(value) => Ok(value),
        ParseUnits::U256(value) => I256::try_from(value)
            .map_err(|_| UnitsError::Conversion(format!("{value} does not fit in int256"))),
    }
}

/// Format base units as a decimal string, dropping trailing fractional zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    match utils::format_units(value, decimals) {
        Ok(formatted) if formatted.contains('.') => formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string(),
        Ok(formatted) => formatted,
        Err(_) => value.to_string(),
    }
}
