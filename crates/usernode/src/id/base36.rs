//! Lowercase base-36 codec for 64-bit identifiers.
//!
//! `u64::MAX` needs 13 digits, so encoding fits a stack buffer.

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_DIGITS: usize = 13;

/// Encodes `value` without leading zeros (`0` encodes as `"0"`).
pub fn encode(mut value: u64) -> String {
    let mut buf = [0_u8; MAX_DIGITS];
    let mut pos = MAX_DIGITS;
    loop {
        pos -= 1;
        buf[pos] = ALPHABET[(value % 36) as usize];
        value /= 36;
        if value == 0 {
            break;
        }
    }
    buf[pos..].iter().map(|&b| b as char).collect()
}

/// Decodes a base-36 string, accepting either letter case.
///
/// Returns `None` on an empty string, a foreign character, or overflow.
pub fn decode(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    s.chars().try_fold(0_u64, |acc, c| {
        let digit = c.to_digit(36)?;
        acc.checked_mul(36)?.checked_add(u64::from(digit))
    })
}
