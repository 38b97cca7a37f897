//! # Offer Messages
//!
//! Literal token substitution used for every customer-facing offer string:
//! friendly names, the "active offer" notice and the redeem prompt.
//!
//! ## Tokens
//! ```text
//! ┌───────────────────────────┬──────────────────────┬────────────────────┐
//! │ Token                     │ percent offer        │ fixed_cart offer   │
//! ├───────────────────────────┼──────────────────────┼────────────────────┤
//! │ {friendlyName}            │ offer.friendlyName   │ offer.friendlyName │
//! │ {friendlyNameToBeAdded}   │ offer.friendlyName…  │ offer.friendlyName…│
//! │ {name}                    │ offer.name           │ offer.name         │
//! │ {value}                   │ value × 100          │ value              │
//! │ {currency}                │ "%"                  │ offer.currency     │
//! └───────────────────────────┴──────────────────────┴────────────────────┘
//! ```
//! A token whose offer field is missing stays in the output verbatim.

use crate::discount::percentage_points;
use crate::types::{Offer, OfferType};

/// Default notice shown while the cart is empty.
pub const DEFAULT_AVAILABLE_OFFER_MESSAGE: &str =
    "<strong>Active Loyalty Offer:</strong> {friendlyNameToBeAdded}.<br />You can add some products to redeem this offer.";

/// Default prompt shown above the cart next to the REDEEM button.
pub const DEFAULT_REDEEM_OFFER_MESSAGE: &str = "<strong>Loyalty Reward:</strong> {friendlyNameToBeAdded}";

const FREE_TEMPLATE: &str = "{name} (FREE)";
const FRIENDLY_TEMPLATE: &str = "{name} ({value}{currency})";
const TO_BE_ADDED_TEMPLATE: &str = "{name} (-{value}{currency})";

/// Renders `template` for `offer`.
///
/// ## Example
/// ```rust
/// use loyaltydog_core::message::get_offer_message;
/// use loyaltydog_core::{Offer, OfferType};
///
/// let mut offer = Offer::new("7", OfferType::FixedCart);
/// offer.name = Some("Save".into());
/// offer.value = Some(5.0);
/// offer.currency = Some("USD".into());
///
/// assert_eq!(get_offer_message("{name} (-{value}{currency})", &offer), "Save (-5USD)");
/// ```
pub fn get_offer_message(template: &str, offer: &Offer) -> String {
    if template.is_empty() {
        return String::new();
    }

    let mut message = template.to_string();

    if let Some(friendly) = &offer.friendly_name {
        message = message.replace("{friendlyName}", friendly);
    }
    if let Some(friendly) = &offer.friendly_name_to_be_added {
        message = message.replace("{friendlyNameToBeAdded}", friendly);
    }
    if let Some(name) = &offer.name {
        message = message.replace("{name}", name);
    }

    match offer.offer_type {
        OfferType::Percent => {
            if let Some(value) = offer.value {
                message = message.replace("{value}", &format_number(percentage_points(value)));
            }
            message = message.replace("{currency}", "%");
        }
        OfferType::FixedCart => {
            if let Some(value) = offer.value {
                message = message.replace("{value}", &format_number(value));
            }
            if let Some(currency) = &offer.currency {
                message = message.replace("{currency}", currency);
            }
        }
    }

    message
}

/// Derives `(friendlyName, friendlyNameToBeAdded)` for a freshly decoded offer.
pub fn friendly_names(offer: &Offer) -> (String, String) {
    if offer.is_free() {
        let free = get_offer_message(FREE_TEMPLATE, offer);
        (free.clone(), free)
    } else {
        (
            get_offer_message(FRIENDLY_TEMPLATE, offer),
            get_offer_message(TO_BE_ADDED_TEMPLATE, offer),
        )
    }
}

/// Formats a number the way shoppers expect to read it: whole numbers
/// without a decimal point, everything else in its shortest exact form.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// =============================================================================
// Formatter Seam
// =============================================================================

/// Renders offer templates. Inject a custom implementation to localise or
/// post-process customer-facing messages.
pub trait OfferMessageFormatter: Send + Sync {
    fn format(&self, template: &str, offer: &Offer) -> String;
}

/// Plain token substitution via [`get_offer_message`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateFormatter;

impl OfferMessageFormatter for TemplateFormatter {
    fn format(&self, template: &str, offer: &Offer) -> String {
        get_offer_message(template, offer)
    }
}
