//! Exact conversion between decimal amounts and base units.
//!
//! Amounts never pass through floating point: the decimal string is split at
//! the point and re-assembled as an integer string before parsing into `U256`.

use alloy::primitives::U256;

/// Parse a plain decimal string (e.g. "1.5") into base units.
///
/// `parse_units("0.1", 18)` → `100_000_000_000_000_000`.
///
/// Rejects signs, exponents, empty parts, more fractional digits than
/// `decimals`, and zero.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err("empty amount".to_string());
    }

    let (integer, fractional) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };

    if integer.is_empty() && fractional.is_empty() {
        return Err("no digits".to_string());
    }
    if !integer.bytes().all(|b| b.is_ascii_digit())
        || !fractional.bytes().all(|b| b.is_ascii_digit())
    {
        return Err("must be a plain positive decimal number".to_string());
    }

    let fractional = fractional.trim_end_matches('0');
    if fractional.len() > decimals as usize {
        return Err(format!(
            "too many decimal places: got {}, max {}",
            fractional.len(),
            decimals
        ));
    }

    let padded = format!("{fractional:0<width$}", width = decimals as usize);
    let combined = format!("{integer}{padded}");
    let combined = combined.trim_start_matches('0');
    if combined.is_empty() {
        return Err("amount must be greater than zero".to_string());
    }

    U256::from_str_radix(combined, 10).map_err(|e| format!("out of range: {e}"))
}

/// Render base units as a decimal string with `decimals` places.
///
/// Trailing zeros are trimmed but at least one fractional digit is kept.
pub fn format_units(value: U256, decimals: u8) -> String {
    let s = value.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return s;
    }

    let (integer, fractional) = if s.len() <= decimals {
        ("0".to_string(), format!("{s:0>width$}", width = decimals))
    } else {
        let split = s.len() - decimals;
        (s[..split].to_string(), s[split..].to_string())
    };

    let fractional = fractional.trim_end_matches('0');
    if fractional.is_empty() {
        format!("{integer}.0")
    } else {
        format!("{integer}.{fractional}")
    }
}
