//! Token amount conversions
//!
//! On-chain amounts stay as `U256` in the token's own decimals. USD math is done
//! in `rust_decimal::Decimal`. Anything leaving the process (status snapshots,
//! trade logs) renders large integers as decimal strings.

use alloy::primitives::U256;
use eyre::{eyre, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a human amount ("0.01") into base units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let value = Decimal::from_str(amount.trim())
        .map_err(|e| eyre!("invalid amount '{}': {}", amount, e))?;
    decimal_to_units(value, decimals)
}

/// Scale a non-negative decimal into base units, truncating excess precision.
pub fn decimal_to_units(value: Decimal, decimals: u8) -> Result<U256> {
    if value.is_sign_negative() {
        return Err(eyre!("amount must not be negative: {}", value));
    }
    if decimals > 28 {
        return Err(eyre!("unsupported token decimals: {}", decimals));
    }
    let scale = Decimal::from_i128_with_scale(10i128.pow(decimals as u32), 0);
    let scaled = value
        .checked_mul(scale)
        .ok_or_else(|| eyre!("amount {} overflows {} decimals", value, decimals))?;
    let units = scaled
        .trunc()
        .to_u128()
        .ok_or_else(|| eyre!("amount {} does not fit in u128", value))?;
    Ok(U256::from(units))
}

/// Base units to a decimal. `None` when the value exceeds the 96-bit mantissa.
pub fn to_decimal(amount: U256, decimals: u8) -> Option<Decimal> {
    let raw = u128::try_from(amount).ok()?;
    signed_to_decimal(i128::try_from(raw).ok()?, decimals)
}

pub fn signed_to_decimal(amount: i128, decimals: u8) -> Option<Decimal> {
    Decimal::try_from_i128_with_scale(amount, decimals as u32)
        .ok()
        .map(|d| d.normalize())
}

/// `after - before` as a signed integer.
pub fn signed_delta(after: U256, before: U256) -> Option<i128> {
    if after >= before {
        i128::try_from(u128::try_from(after - before).ok()?).ok()
    } else {
        i128::try_from(u128::try_from(before - after).ok()?)
            .ok()
            .map(|v| -v)
    }
}

pub fn to_signed(amount: U256) -> Option<i128> {
    i128::try_from(u128::try_from(amount).ok()?).ok()
}

/// Human-readable amount for logs and console output.
pub fn format_units(amount: U256, decimals: u8) -> String {
    match to_decimal(amount, decimals) {
        Some(d) => d.to_string(),
        None => format!("{} (raw)", amount),
    }
}

/// Serde helpers that render big integers as decimal strings.
pub mod serde_dec {
    use alloy::primitives::U256;
    use serde::Serializer;

    pub fn u256<S: Serializer>(value: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn i128<S: Serializer>(value: &i128, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn opt_i128<S: Serializer>(value: &Option<i128>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.collect_str(v),
            None => s.serialize_none(),
        }
    }

    pub fn u128<S: Serializer>(value: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }
}
