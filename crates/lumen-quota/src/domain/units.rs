//! Storage unit conversions. A GB is 2^30 bytes throughout.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Bytes in one GB.
pub const BYTES_PER_GB: u64 = 1 << 30;

/// Converts bytes to fractional GB.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB as f64
}

/// Converts whole GB to bytes.
#[must_use]
pub const fn gb_to_bytes(gb: u32) -> u64 {
    gb as u64 * BYTES_PER_GB
}

/// Converts a decimal GB amount to whole bytes, truncating any fraction of
/// a byte. Returns `None` for negative or unrepresentable amounts.
#[must_use]
pub fn decimal_gb_to_bytes(gb: Decimal) -> Option<u64> {
    if gb.is_sign_negative() {
        return None;
    }
    gb.checked_mul(Decimal::from(BYTES_PER_GB))?.trunc().to_u64()
}

/// Smallest whole number of GB that covers `bytes`.
#[must_use]
pub const fn whole_gb_ceil(bytes: u64) -> u64 {
    bytes.div_ceil(BYTES_PER_GB)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_bytes_to_gb_is_binary() {
        assert!((bytes_to_gb(BYTES_PER_GB) - 1.0).abs() < f64::EPSILON);
        assert!((bytes_to_gb(3 * BYTES_PER_GB / 2) - 1.5).abs() < f64::EPSILON);
        assert!((bytes_to_gb(0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gb_to_bytes() {
        assert_eq!(gb_to_bytes(10), 10_737_418_240);
    }

    #[test]
    fn test_decimal_gb_to_bytes_truncates() {
        assert_eq!(
            decimal_gb_to_bytes(Decimal::from_str("2.5").unwrap()),
            Some(5 * BYTES_PER_GB / 2)
        );
        assert_eq!(decimal_gb_to_bytes(Decimal::from_str("-1").unwrap()), None);
    }

    #[test]
    fn test_whole_gb_ceil_rounds_partial_gb_up() {
        assert_eq!(whole_gb_ceil(0), 0);
        assert_eq!(whole_gb_ceil(1), 1);
        assert_eq!(whole_gb_ceil(2 * BYTES_PER_GB), 2);
        assert_eq!(whole_gb_ceil(2 * BYTES_PER_GB + 1), 3);
    }
}
