//! Token/wei amount parsing for the command line.
//!
//! Two shapes are accepted: a plain decimal (`1000`) that fits in 64 bits,
//! and `<mantissa>e<exponent>` (`2e18`) meaning the mantissa followed by
//! `exponent` zeros. Anything else is rejected.

use alloy_primitives::U256;

use crate::error::{ChainError, ChainResult};

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an amount in decimal or `MeK` notation.
pub fn parse_exp(input: &str) -> ChainResult<U256> {
    let s = input.trim();
    let invalid = || ChainError::InvalidAmount(input.to_string());

    if all_digits(s) {
        let value: u64 = s.parse().map_err(|_| invalid())?;
        return Ok(U256::from(value));
    }

    let (mantissa, exponent) = s.split_once('e').ok_or_else(invalid)?;
    if !all_digits(mantissa) || !all_digits(exponent) {
        return Err(invalid());
    }

    let mantissa: u64 = mantissa.parse().map_err(|_| invalid())?;
    let exponent: u32 = exponent
        .parse()
        .map_err(|_| ChainError::ExponentParse(input.to_string()))?;

    U256::from(10u8)
        .checked_pow(U256::from(exponent))
        .and_then(|scale| U256::from(mantissa).checked_mul(scale))
        .ok_or_else(|| ChainError::ExponentParse(input.to_string()))
}
