//! Money helpers
//!
//! All monetary amounts are `rust_decimal::Decimal` values normalized to
//! two decimal places. Comparisons use an absolute tolerance of 0.01.

use rust_decimal::Decimal;

/// Absolute tolerance for money equality checks (one cent)
pub fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Normalize an amount to two decimal places
pub fn round(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Whether two amounts are equal within the money tolerance
pub fn approx_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= tolerance()
}

/// Whether an amount is negative
pub fn is_negative(amount: Decimal) -> bool {
    amount < Decimal::ZERO
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn round_to_two_places() {
        assert_eq!(round(dec("31.985")), dec("31.98"));
        assert_eq!(round(dec("5.005")), dec("5.00"));
        assert_eq!(round(dec("10")), dec("10"));
    }

    #[test]
    fn approx_eq_within_one_cent() {
        assert!(approx_eq(dec("36.98"), dec("36.98")));
        assert!(approx_eq(dec("36.98"), dec("36.99")));
        assert!(approx_eq(dec("36.98"), dec("36.97")));
        assert!(!approx_eq(dec("36.98"), dec("37.00")));
    }

    #[test]
    fn negative_detection() {
        assert!(is_negative(dec("-0.01")));
        assert!(!is_negative(Decimal::ZERO));
        assert!(!is_negative(dec("1.50")));
    }
}
