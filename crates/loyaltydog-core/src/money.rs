//! # Money Module
//!
//! Provides the `Money` type for order totals that feed the points
//! calculation.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Order total $2.50 at ratio 1:1, "round" mode:                         │
//! │    2.5 must round to 3 points. A float total of 2.4999999999 would     │
//! │    silently award 2.                                                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    250 cents × 1 / (100 × 1) = 250/100 → exact half → 3 points         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use loyaltydog_core::money::Money;
//!
//! let total: Money = "105.50".parse().unwrap();
//! assert_eq!(total.cents(), 10550);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds can produce negative order totals
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use loyaltydog_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses a decimal amount as the host platform reports order totals
/// (`"105"`, `"105.5"`, `"105.50"`, `"-3.10"`).
///
/// Digits beyond the second decimal place are rounded half away from zero.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (major_str, minor_str) = match unsigned.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (unsigned, ""),
        };

        if major_str.is_empty() && minor_str.is_empty() {
            return Err(invalid("empty amount"));
        }
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(major_str) || !all_digits(minor_str) {
            return Err(invalid("must be a decimal number"));
        }

        let major: i64 = if major_str.is_empty() {
            0
        } else {
            major_str.parse().map_err(|_| invalid("amount too large"))?
        };

        let digits: Vec<u32> = minor_str.chars().filter_map(|c| c.to_digit(10)).collect();
        let tenths = digits.first().copied().unwrap_or(0) as i64;
        let hundredths = digits.get(1).copied().unwrap_or(0) as i64;
        let round_up = digits.get(2).is_some_and(|d| *d >= 5);

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
            .ok_or_else(|| invalid("amount too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_negative_amounts_keep_sign_on_whole_value() {
        let refund: Money = "-5.50".parse().unwrap();
        assert_eq!(refund.cents(), -550);
        assert_eq!(refund.to_string(), "-5.50");
    }

    #[test]
    fn test_parse_order_totals() {
        assert_eq!("105".parse::<Money>().unwrap().cents(), 10500);
        assert_eq!("105.5".parse::<Money>().unwrap().cents(), 10550);
        assert_eq!("105.50".parse::<Money>().unwrap().cents(), 10550);
        assert_eq!(".75".parse::<Money>().unwrap().cents(), 75);
        assert_eq!("-3.10".parse::<Money>().unwrap().cents(), -310);
        assert_eq!(" 2.50 ".parse::<Money>().unwrap().cents(), 250);
    }

    #[test]
    fn test_parse_rounds_extra_precision() {
        assert_eq!("1.005".parse::<Money>().unwrap().cents(), 101);
        assert_eq!("1.004".parse::<Money>().unwrap().cents(), 100);
        assert_eq!("-1.005".parse::<Money>().unwrap().cents(), -101);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("1,50".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }
}
