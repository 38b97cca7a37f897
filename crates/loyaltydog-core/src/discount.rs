//! # Discounts and Redemption Codes
//!
//! Turns a customer's active offer into a one-off cart coupon.
//!
//! ## Redemption Code Format
//! ```text
//! loyalty_dog_redemption_42_2024_03_05_02_07_7
//! └──────── prefix ──────┘│  └──── stamp ───┘ │
//!                      user id               offer id
//!
//! stamp = %Y_%m_%d_%I_%M  (12-hour clock, zero padded, no AM/PM marker)
//! ```
//! The stamp has minute resolution, so two codes generated for the same
//! user and offer within one minute are identical.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::types::{Offer, OfferId, OfferType, UserId};

/// Every redemption code starts with this.
pub const REDEMPTION_PREFIX: &str = "loyalty_dog_redemption_";

/// Cart label shown instead of the raw redemption code.
pub const COUPON_LABEL: &str = "Loyalty Reward";

/// Replaces the host's "coupon applied" message for redemption codes.
pub const REDEEMED_MESSAGE: &str = "Redeemed Successfully";

const STAMP_FORMAT: &str = "%Y_%m_%d_%I_%M";
const STAMP_PARTS: usize = 5;

// =============================================================================
// Amounts
// =============================================================================

/// Converts a fractional rate into percentage points (`0.15` → `15`),
/// hiding the binary float noise of the multiplication.
pub fn percentage_points(value: f64) -> f64 {
    (value * 100.0 * 1e9).round() / 1e9
}

/// Amount the host coupon should carry for `offer`.
///
/// Percent offers become percentage points, fixed offers pass their value
/// through. Offers without a value discount nothing.
///
/// ## Example
/// ```rust
/// use loyaltydog_core::discount::discount_amount_for_redeeming_offer;
/// use loyaltydog_core::{Offer, OfferType};
///
/// let mut offer = Offer::new("7", OfferType::Percent);
/// offer.value = Some(0.1);
/// assert_eq!(discount_amount_for_redeeming_offer(&offer), 10.0);
/// ```
pub fn discount_amount_for_redeeming_offer(offer: &Offer) -> f64 {
    match offer.value {
        Some(value) if value != 0.0 => match offer.offer_type {
            OfferType::Percent => percentage_points(value),
            OfferType::FixedCart => value,
        },
        _ => 0.0,
    }
}

// =============================================================================
// Discount Code
// =============================================================================

/// A parsed redemption code.
///
/// The stamp is kept verbatim: without an AM/PM marker it cannot be turned
/// back into a single point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscountCode {
    pub user_id: UserId,
    pub stamp: String,
    pub offer_id: OfferId,
}

impl DiscountCode {
    /// Builds the code for `user_id` redeeming `offer_id` at `now`.
    pub fn new(offer_id: OfferId, user_id: UserId, now: NaiveDateTime) -> Self {
        DiscountCode {
            user_id,
            stamp: now.format(STAMP_FORMAT).to_string(),
            offer_id,
        }
    }

    /// Parses a code previously produced by [`generate_discount_code`].
    pub fn parse(code: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidDiscountCode(code.to_string());

        let rest = code.strip_prefix(REDEMPTION_PREFIX).ok_or_else(invalid)?;
        let mut parts = rest.splitn(STAMP_PARTS + 2, '_');

        let user_id = parts
            .next()
            .and_then(|id| id.parse::<UserId>().ok())
            .ok_or_else(invalid)?;

        let stamp_parts: Vec<&str> = parts.by_ref().take(STAMP_PARTS).collect();
        let stamp_ok = stamp_parts.len() == STAMP_PARTS
            && stamp_parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if !stamp_ok {
            return Err(invalid());
        }

        let offer_id = parts.next().filter(|id| !id.is_empty()).ok_or_else(invalid)?;

        Ok(DiscountCode {
            user_id,
            stamp: stamp_parts.join("_"),
            offer_id: OfferId::new(offer_id),
        })
    }

    /// True when this code redeems exactly `offer_id`.
    pub fn redeems(&self, offer_id: &OfferId) -> bool {
        &self.offer_id == offer_id
    }
}

impl fmt::Display for DiscountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}_{}_{}",
            REDEMPTION_PREFIX, self.user_id, self.stamp, self.offer_id
        )
    }
}

impl FromStr for DiscountCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiscountCode::parse(s)
    }
}

/// Generates the redemption code for `offer` and `user_id` at `now`
/// (local shop time).
pub fn generate_discount_code(offer: &Offer, user_id: UserId, now: NaiveDateTime) -> String {
    DiscountCode::new(offer.id.clone(), user_id, now).to_string()
}

/// True when `code` was produced by this integration.
pub fn is_redemption_code(code: &str) -> bool {
    code.contains(REDEMPTION_PREFIX)
}

/// True when `code` is a redemption code for exactly `offer_id`.
pub fn code_redeems_offer(code: &str, offer_id: &OfferId) -> bool {
    DiscountCode::parse(code).is_ok_and(|parsed| parsed.redeems(offer_id))
}

/// Reorders applied coupons so redemption codes apply after every other
/// coupon, keeping the relative order within each group.
pub fn order_redemption_codes_last(codes: Vec<String>) -> Vec<String> {
    let (mut others, redemptions): (Vec<String>, Vec<String>) =
        codes.into_iter().partition(|code| !is_redemption_code(code));
    others.extend(redemptions);
    others
}

// =============================================================================
// Coupon Data
// =============================================================================

/// Virtual coupon definition handed to the host cart for a redemption code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponData {
    #[serde(rename = "type")]
    pub discount_type: OfferType,
    pub amount: f64,
    pub individual_use: bool,
    pub usage_limit: u32,
    pub usage_count: u32,
    pub apply_before_tax: bool,
    pub free_shipping: bool,
    pub exclude_sale_items: bool,
}

impl CouponData {
    pub fn for_offer(offer: &Offer) -> Self {
        CouponData {
            discount_type: offer.offer_type,
            amount: discount_amount_for_redeeming_offer(offer),
            individual_use: false,
            usage_limit: 1,
            usage_count: 0,
            apply_before_tax: true,
            free_shipping: false,
            exclude_sale_items: false,
        }
    }
}
