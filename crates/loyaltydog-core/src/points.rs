//! # Points Calculation
//!
//! Converts a purchase amount into loyalty points using the merchant's
//! `points:monetary_value` ratio.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ratio "P:M", amount A                                                  │
//! │                                                                         │
//! │    points = round_mode( A × P / M )                                     │
//! │                                                                         │
//! │  Evaluated exactly: A is integer cents, P and M are parsed as decimal   │
//! │  fractions, so the division happens once on i128 integers.              │
//! │                                                                         │
//! │    cents × P.units × M.scale                                            │
//! │    ─────────────────────────────                                        │
//! │    100 × P.scale × M.units                                              │
//! │                                                                         │
//! │  P empty or zero → 0 points, whatever M is.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding
//! | mode    | 2.5 | -2.5 |
//! |---------|-----|------|
//! | `round` | 3   | -3   |
//! | `floor` | 2   | -3   |
//! | `ceil`  | 3   | -2   |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

/// Maximum digits accepted after the decimal point on either ratio side.
const MAX_FRACTION_DIGITS: usize = 9;

// =============================================================================
// Rounding Mode
// =============================================================================

/// How fractional points are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    /// Half away from zero.
    #[default]
    Round,
    Floor,
    Ceil,
}

impl RoundingMode {
    /// Lenient parse used for stored settings: anything unrecognised rounds.
    pub fn from_setting(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    fn apply(self, numerator: i128, denominator: i128) -> i128 {
        match self {
            RoundingMode::Floor => numerator.div_euclid(denominator),
            RoundingMode::Ceil => -((-numerator).div_euclid(denominator)),
            RoundingMode::Round => {
                let magnitude = numerator.unsigned_abs();
                let divisor = denominator.unsigned_abs();
                let (quotient, remainder) = (magnitude / divisor, magnitude % divisor);
                let rounded = (quotient + u128::from(remainder >= divisor - remainder)) as i128;
                if numerator < 0 {
                    -rounded
                } else {
                    rounded
                }
            }
        }
    }
}

impl FromStr for RoundingMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round" => Ok(RoundingMode::Round),
            "floor" => Ok(RoundingMode::Floor),
            "ceil" => Ok(RoundingMode::Ceil),
            _ => Err(ValidationError::NotAllowed {
                field: "earn_points_rounding".to_string(),
                allowed: vec!["round".into(), "floor".into(), "ceil".into()],
            }),
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingMode::Round => write!(f, "round"),
            RoundingMode::Floor => write!(f, "floor"),
            RoundingMode::Ceil => write!(f, "ceil"),
        }
    }
}

// =============================================================================
// Ratio
// =============================================================================

/// Non-negative decimal held as `units / scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fraction {
    units: i128,
    scale: i128,
}

impl Fraction {
    const ZERO: Fraction = Fraction { units: 0, scale: 1 };

    fn parse(raw: &str) -> Option<Fraction> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if fraction.len() > MAX_FRACTION_DIGITS {
            return None;
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }

        let digits = format!("{whole}{fraction}");
        let units: i128 = digits.parse().ok()?;
        let scale = 10_i128.pow(fraction.len() as u32);
        Some(Fraction { units, scale })
    }

    fn is_zero(&self) -> bool {
        self.units == 0
    }
}

/// A parsed `points:monetary_value` ratio.
///
/// ## Example
/// ```rust
/// use loyaltydog_core::points::PointsRatio;
///
/// let ratio = PointsRatio::parse("1:1").unwrap();
/// assert!(!ratio.awards_nothing());
///
/// // Zero points on the left means "earn nothing", whatever follows.
/// assert!(PointsRatio::parse("0:").unwrap().awards_nothing());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsRatio {
    points: Fraction,
    monetary: Fraction,
}

impl PointsRatio {
    pub fn parse(ratio: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidRatio {
            ratio: ratio.to_string(),
            reason: reason.to_string(),
        };

        let (points_raw, monetary_raw) = match ratio.split_once(':') {
            Some(parts) => parts,
            None => (ratio, ""),
        };

        if points_raw.trim().is_empty() {
            return Ok(PointsRatio::nothing());
        }
        let points = Fraction::parse(points_raw)
            .ok_or_else(|| invalid("points must be a non-negative decimal"))?;
        if points.is_zero() {
            return Ok(PointsRatio::nothing());
        }

        let monetary = Fraction::parse(monetary_raw)
            .ok_or_else(|| invalid("monetary value must be a non-negative decimal"))?;
        if monetary.is_zero() {
            return Err(invalid("monetary value must not be zero"));
        }

        Ok(PointsRatio { points, monetary })
    }

    fn nothing() -> Self {
        PointsRatio {
            points: Fraction::ZERO,
            monetary: Fraction { units: 1, scale: 1 },
        }
    }

    /// True when this ratio earns no points for any amount.
    pub fn awards_nothing(&self) -> bool {
        self.points.is_zero()
    }

    /// Applies the ratio to `amount` and resolves the fraction with `rounding`.
    pub fn points_for(&self, amount: Money, rounding: RoundingMode) -> CoreResult<i64> {
        if self.awards_nothing() {
            return Ok(0);
        }

        let overflow = || CoreError::PointsOverflow {
            amount_cents: amount.cents(),
        };

        let numerator = i128::from(amount.cents())
            .checked_mul(self.points.units)
            .and_then(|n| n.checked_mul(self.monetary.scale))
            .ok_or_else(overflow)?;
        let denominator = 100_i128
            .checked_mul(self.points.scale)
            .and_then(|d| d.checked_mul(self.monetary.units))
            .ok_or_else(overflow)?;

        let points = rounding.apply(numerator, denominator);
        i64::try_from(points).map_err(|_| overflow())
    }
}

// =============================================================================
// Post Processing
// =============================================================================

/// Adjusts the computed points before they are awarded.
///
/// Closures `Fn(i64, Money) -> i64` implement this directly.
pub trait PointsPostProcessor: Send + Sync {
    fn process(&self, points: i64, amount: Money) -> i64;
}

impl<F> PointsPostProcessor for F
where
    F: Fn(i64, Money) -> i64 + Send + Sync,
{
    fn process(&self, points: i64, amount: Money) -> i64 {
        self(points, amount)
    }
}

/// Passes points through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdjustment;

impl PointsPostProcessor for NoAdjustment {
    fn process(&self, points: i64, _amount: Money) -> i64 {
        points
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Points calculator bound to the merchant's settings.
///
/// The ratio is kept as entered and parsed on every calculation, so a ratio
/// saved through the settings screen takes effect without rebuilding.
#[derive(Clone)]
pub struct PointsCalculator {
    ratio: String,
    rounding: RoundingMode,
    post_processor: Arc<dyn PointsPostProcessor>,
}

impl PointsCalculator {
    pub fn new(ratio: impl Into<String>, rounding: RoundingMode) -> Self {
        PointsCalculator {
            ratio: ratio.into(),
            rounding,
            post_processor: Arc::new(NoAdjustment),
        }
    }

    pub fn with_post_processor(mut self, processor: Arc<dyn PointsPostProcessor>) -> Self {
        self.post_processor = processor;
        self
    }

    pub fn ratio(&self) -> &str {
        &self.ratio
    }

    pub fn rounding(&self) -> RoundingMode {
        self.rounding
    }

    /// Points earned for `amount`, or 0 when the ratio cannot be used.
    pub fn calculate_points(&self, amount: Money) -> i64 {
        self.try_calculate_points(amount).unwrap_or(0)
    }

    /// Like [`calculate_points`](Self::calculate_points) but reports why a
    /// ratio was rejected.
    pub fn try_calculate_points(&self, amount: Money) -> CoreResult<i64> {
        let ratio = PointsRatio::parse(&self.ratio)?;
        let points = ratio.points_for(amount, self.rounding)?;
        Ok(self.post_processor.process(points, amount))
    }
}

impl fmt::Debug for PointsCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointsCalculator")
            .field("ratio", &self.ratio)
            .field("rounding", &self.rounding)
            .finish_non_exhaustive()
    }
}

impl Default for PointsCalculator {
    fn default() -> Self {
        PointsCalculator::new("1:1", RoundingMode::Round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(ratio: &str, rounding: RoundingMode, amount: &str) -> i64 {
        PointsCalculator::new(ratio, rounding).calculate_points(amount.parse().unwrap())
    }

    #[test]
    fn test_one_to_one() {
        assert_eq!(points("1:1", RoundingMode::Round, "10"), 10);
    }

    #[test]
    fn test_two_to_one_ceil() {
        assert_eq!(points("2:1", RoundingMode::Ceil, "10"), 20);
    }

    #[test]
    fn test_zero_points_awards_nothing() {
        assert_eq!(points("0:1", RoundingMode::Round, "10"), 0);
        assert_eq!(points(":5", RoundingMode::Round, "10"), 0);
        assert_eq!(points("0:0", RoundingMode::Round, "10"), 0);
        assert_eq!(points("", RoundingMode::Round, "10"), 0);
    }

    #[test]
    fn test_half_amounts_per_mode() {
        assert_eq!(points("1:1", RoundingMode::Round, "2.5"), 3);
        assert_eq!(points("1:1", RoundingMode::Floor, "2.5"), 2);
        assert_eq!(points("1:1", RoundingMode::Ceil, "2.5"), 3);
    }

    #[test]
    fn test_negative_amounts() {
        assert_eq!(points("1:1", RoundingMode::Round, "-2.5"), -3);
        assert_eq!(points("1:1", RoundingMode::Floor, "-2.5"), -3);
        assert_eq!(points("1:1", RoundingMode::Ceil, "-2.5"), -2);
    }

    #[test]
    fn test_decimal_ratio_is_exact() {
        // 0.1 points per 0.3 currency on 0.9 → exactly 0.3 → rounds to 0.
        assert_eq!(points("0.1:0.3", RoundingMode::Round, "0.9"), 0);
        // 1 point per 10 spent.
        assert_eq!(points("1:10", RoundingMode::Floor, "99.99"), 9);
        assert_eq!(points("1:10", RoundingMode::Ceil, "90.01"), 10);
        assert_eq!(points("1.5:1", RoundingMode::Round, "3"), 5);
    }

    #[test]
    fn test_invalid_ratios() {
        let calc = PointsCalculator::new("1:0", RoundingMode::Round);
        assert!(matches!(
            calc.try_calculate_points(Money::from_cents(100)),
            Err(CoreError::InvalidRatio { .. })
        ));
        assert_eq!(calc.calculate_points(Money::from_cents(100)), 0);

        assert!(PointsRatio::parse("abc:1").is_err());
        assert!(PointsRatio::parse("1").is_err());
        assert!(PointsRatio::parse("1:-2").is_err());
        assert!(PointsRatio::parse("1:0.0000000001").is_err());
    }

    #[test]
    fn test_overflow_is_reported() {
        let calc = PointsCalculator::new("999999999:0.000000001", RoundingMode::Round);
        assert!(matches!(
            calc.try_calculate_points(Money::from_cents(i64::MAX)),
            Err(CoreError::PointsOverflow { .. })
        ));
    }

    #[test]
    fn test_post_processor_closure() {
        let calc = PointsCalculator::new("1:1", RoundingMode::Round)
            .with_post_processor(Arc::new(|points: i64, _amount: Money| points * 2));
        assert_eq!(calc.calculate_points(Money::from_cents(1000)), 20);
    }

    #[test]
    fn test_rounding_mode_parsing() {
        assert_eq!("ceil".parse::<RoundingMode>().unwrap(), RoundingMode::Ceil);
        assert_eq!("FLOOR".parse::<RoundingMode>().unwrap(), RoundingMode::Floor);
        assert!(matches!(
            "up".parse::<RoundingMode>(),
            Err(ValidationError::NotAllowed { ref field, .. }) if field == "earn_points_rounding"
        ));
        assert_eq!(RoundingMode::from_setting("up"), RoundingMode::Round);
        assert_eq!(RoundingMode::Ceil.to_string(), "ceil");
    }
}
