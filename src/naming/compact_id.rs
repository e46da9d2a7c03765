//! Time-ordered compact identifiers used for generated disk and snapshot
//! names.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use super::NamingError;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TIME_DIGITS: u32 = 7;
const RANDOM_DIGITS: u32 = 5;

/// Generates a 12-character lowercase base36 identifier: seven digits of
/// Unix seconds followed by five random digits.
///
/// # Errors
///
/// Returns [`NamingError::CompactId`] when the system clock is before the
/// Unix epoch or beyond the seven-digit range.
pub fn compact_id() -> Result<String, NamingError> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| NamingError::CompactId(err.to_string()))?
        .as_secs();
    let entropy = Uuid::new_v4().as_u128();
    compact_id_at(seconds, u64::try_from(entropy >> 64).unwrap_or(u64::MAX))
}

/// Builds a compact identifier from an explicit timestamp and entropy source.
///
/// # Errors
///
/// Returns [`NamingError::CompactId`] when `seconds` does not fit in seven
/// base36 digits.
pub fn compact_id_at(seconds: u64, entropy: u64) -> Result<String, NamingError> {
    let time_limit = 36_u64.pow(TIME_DIGITS);
    if seconds >= time_limit {
        return Err(NamingError::CompactId(format!(
            "timestamp {seconds} exceeds {TIME_DIGITS} base36 digits"
        )));
    }
    let random = entropy.rem_euclid(36_u64.pow(RANDOM_DIGITS));
    let mut out = base36(seconds, TIME_DIGITS);
    out.push_str(&base36(random, RANDOM_DIGITS));
    Ok(out)
}

fn base36(mut value: u64, width: u32) -> String {
    let mut digits = Vec::with_capacity(usize::try_from(width).unwrap_or_default());
    for _ in 0..width {
        let digit = usize::try_from(value.rem_euclid(36)).unwrap_or_default();
        digits.push(char::from(ALPHABET.get(digit).copied().unwrap_or(b'0')));
        value = value.div_euclid(36);
    }
    digits.iter().rev().collect()
}
