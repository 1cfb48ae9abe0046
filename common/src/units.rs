//! Conversions between wei amounts, as returned by block explorers, and ether
//! amounts used in the charted series.
//!
//! Explorers return values as arbitrary precision decimal strings. The integer
//! part of the ether amount is recovered from the digits directly, so it never
//! goes through a lossy float multiplication.

use alloy::primitives::utils::parse_units;

use crate::Error;

/// Number of decimals between wei and ether.
pub const ETHER_DECIMALS: usize = 18;

/// Decodes a wei digit string into ether.
///
/// The digits are split into a whole part (all but the last 18 digits, or `0`
/// when shorter) and a fractional part (the last 18 digits, left padded with
/// zeros) which are then parsed together as one decimal number.
pub fn wei_to_ether(wei: &str) -> crate::Result<f64> {
    let wei = wei.trim();
    if wei.is_empty() || !wei.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidWeiValue(wei.to_string()));
    }

    let (whole, fraction) = wei.split_at(wei.len().saturating_sub(ETHER_DECIMALS));
    let whole = if whole.is_empty() { "0" } else { whole };
    let decimal = format!("{whole}.{fraction:0>18}");

    match decimal.parse::<f64>() {
        Ok(ether) => Ok(ether),
        Err(e) => Err(Error::EtherParseFailed(decimal, e)),
    }
}

/// Encodes an ether amount as a wei digit string.
///
/// Goes through the shortest decimal form of the float, so `0.1` is exactly
/// `100000000000000000` wei. Digits past the 18th decimal are truncated.
pub fn ether_to_wei(ether: f64) -> crate::Result<String> {
    if !ether.is_finite() || ether < 0.0 {
        return Err(Error::InvalidEtherValue(ether));
    }

    let decimal = ether.to_string();
    match parse_units(&decimal, "ether") {
        Ok(wei) => Ok(wei.get_absolute().to_string()),
        Err(e) => Err(Error::WeiEncodeFailed(decimal, e)),
    }
}

/// Rounds to a fixed number of decimals, used for the totals shown next to a chart.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
