//! # Domain Types
//!
//! Records exchanged with the upstream LoyaltyDog API.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────┐   │
//! │  │    Customer     │   │        Card         │   │      Offer      │   │
//! │  │  ─────────────  │   │  ─────────────────  │   │  ─────────────  │   │
//! │  │  id (u64)       │   │  coupon             │   │  id             │   │
//! │  │  email          │──►│   .primaryFields    │──►│  type           │   │
//! │  │  currentOfferId │   │   .secondaryFields  │   │  name / value   │   │
//! │  │  customFields   │   │  (keyed CardFields) │   │  friendly names │   │
//! │  └─────────────────┘   └─────────────────────┘   └─────────────────┘   │
//! │                                                                         │
//! │  The upstream never sends an Offer directly: it sends a "pass card"    │
//! │  which is scanned for the `primary` and `$maxValue` fields.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::message;

/// Upstream numeric customer identifier.
pub type CustomerId = u64;

/// Host platform user identifier (0 means guest).
pub type UserId = u64;

/// Card field key holding the offer name.
pub const PRIMARY_FIELD_KEY: &str = "primary";

/// Card field key holding the offer value.
pub const MAX_VALUE_FIELD_KEY: &str = "$maxValue";

/// Number style marking a percentage offer.
pub const PERCENT_NUMBER_STYLE: &str = "PKNumberStylePercent";

/// Custom field consulted before pushing a message to a customer.
pub const GDPR_FIELD: &str = "GDPR";

/// Custom field that carries the pushed message.
pub const CURRENT_MESSAGE_FIELD: &str = "currentMessage";

// =============================================================================
// Offer Id
// =============================================================================

/// Identifier of an upstream offer.
///
/// The API is inconsistent about sending ids as numbers or strings, so the
/// id is kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OfferId(String);

impl OfferId {
    pub fn new(id: impl Into<String>) -> Self {
        OfferId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OfferId {
    fn from(id: &str) -> Self {
        OfferId::new(id)
    }
}

impl From<u64> for OfferId {
    fn from(id: u64) -> Self {
        OfferId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for OfferId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(OfferId(s)),
            Value::Number(n) => Ok(OfferId(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected offer id as string or number, got {other}"
            ))),
        }
    }
}

/// `currentOfferId` arrives as a number, a string, `null`, or the literal
/// string `"null"`. The last two both mean "no active offer".
fn deserialize_current_offer<'de, D>(deserializer: D) -> Result<Option<OfferId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() || s == "null" => Ok(None),
        Some(Value::String(s)) => Ok(Some(OfferId(s))),
        Some(Value::Number(n)) => Ok(Some(OfferId(n.to_string()))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unexpected currentOfferId {other}"
        ))),
    }
}

fn deserialize_customer_id<'de, D>(deserializer: D) -> Result<CustomerId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid customer id {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid customer id '{s}'"))),
        other => Err(serde::de::Error::custom(format!(
            "expected customer id, got {other}"
        ))),
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Free-form custom fields attached to a customer by the merchant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomFields(BTreeMap<String, Value>);

impl CustomFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the field as text; numbers and booleans are stringified,
    /// null and missing fields are `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }
}

fn deserialize_custom_fields<'de, D>(deserializer: D) -> Result<CustomFields, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<CustomFields>::deserialize(deserializer)?.unwrap_or_default())
}

/// A loyalty program member as returned by the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Upstream numeric identifier.
    #[serde(deserialize_with = "deserialize_customer_id")]
    pub id: CustomerId,

    /// Email used to match the host platform user.
    #[serde(default)]
    pub email: String,

    /// The single offer the customer may currently redeem.
    #[serde(default, deserialize_with = "deserialize_current_offer")]
    pub current_offer_id: Option<OfferId>,

    /// Merchant-defined fields (`GDPR`, `currentMessage`, ...).
    #[serde(default, deserialize_with = "deserialize_custom_fields")]
    pub custom_fields: CustomFields,

    /// Anything else the API sends (points balance, names, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Customer {
    /// Returns the active offer id, if any.
    pub fn active_offer(&self) -> Option<&OfferId> {
        self.current_offer_id.as_ref()
    }

    /// Whether a broadcast message may be pushed to this customer.
    ///
    /// Sends when custom fields are empty, when `GDPR` is missing or empty,
    /// or when `GDPR` is exactly `"No"`. Customers who never answered the
    /// GDPR question therefore receive messages.
    pub fn accepts_push_messages(&self) -> bool {
        if self.custom_fields.is_empty() {
            return true;
        }
        match self.custom_fields.get_str(GDPR_FIELD) {
            None => true,
            Some(gdpr) => gdpr.is_empty() || gdpr == "No",
        }
    }
}

// =============================================================================
// Offer Card (raw upstream shape)
// =============================================================================

/// One keyed entry in a pass card field array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardField {
    pub key: String,

    #[serde(default)]
    pub value: Value,

    #[serde(default)]
    pub currency_code: Option<String>,

    #[serde(default)]
    pub number_style: Option<String>,
}

/// The `coupon` section of a pass card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCoupon {
    #[serde(default)]
    pub primary_fields: Vec<CardField>,

    #[serde(default)]
    pub secondary_fields: Vec<CardField>,
}

/// Pass card returned by `GET /offers/{id}/card`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub coupon: CardCoupon,
}

impl Card {
    /// First primary field keyed `primary`.
    pub fn primary_field(&self) -> Option<&CardField> {
        self.coupon
            .primary_fields
            .iter()
            .find(|f| f.key == PRIMARY_FIELD_KEY)
    }

    /// First secondary field keyed `$maxValue`.
    pub fn max_value_field(&self) -> Option<&CardField> {
        self.coupon
            .secondary_fields
            .iter()
            .find(|f| f.key == MAX_VALUE_FIELD_KEY)
    }
}

// =============================================================================
// Offer
// =============================================================================

/// How an offer discounts the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    /// Value is a fraction (0.1 = 10%).
    Percent,
    /// Value is a fixed amount off the cart.
    #[default]
    FixedCart,
}

impl OfferType {
    /// Maps a card number style to an offer type. Anything other than
    /// `PKNumberStylePercent` is a fixed amount.
    pub fn from_number_style(style: Option<&str>) -> Self {
        match style {
            Some(PERCENT_NUMBER_STYLE) => OfferType::Percent,
            _ => OfferType::FixedCart,
        }
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferType::Percent => write!(f, "percent"),
            OfferType::FixedCart => write!(f, "fixed_cart"),
        }
    }
}

/// A redeemable reward, decoded from its pass card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: OfferId,

    #[serde(rename = "type", default)]
    pub offer_type: OfferType,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub value: Option<f64>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub friendly_name: Option<String>,

    #[serde(default)]
    pub friendly_name_to_be_added: Option<String>,
}

impl Offer {
    /// Builds an offer with no derived fields.
    pub fn new(id: impl Into<OfferId>, offer_type: OfferType) -> Self {
        Offer {
            id: id.into(),
            offer_type,
            name: None,
            value: None,
            currency: None,
            friendly_name: None,
            friendly_name_to_be_added: None,
        }
    }

    /// Decodes an offer from its pass card and derives the friendly names.
    ///
    /// ## Decoding Rules
    /// ```text
    /// coupon.primaryFields[key == "primary"].value        → name
    /// coupon.secondaryFields[key == "$maxValue"].value    → value
    ///                                   .currencyCode     → currency
    ///                                   .numberStyle      → type
    /// ```
    pub fn from_card(id: OfferId, card: &Card) -> Self {
        let mut offer = Offer::new(id, OfferType::FixedCart);

        if let Some(field) = card.primary_field() {
            offer.name = value_as_text(&field.value);
        }

        if let Some(field) = card.max_value_field() {
            offer.value = value_as_number(&field.value);
            offer.currency = field.currency_code.clone();
            offer.offer_type = OfferType::from_number_style(field.number_style.as_deref());
        }

        let (friendly, to_be_added) = message::friendly_names(&offer);
        offer.friendly_name = Some(friendly);
        offer.friendly_name_to_be_added = Some(to_be_added);
        offer
    }

    /// True when the offer carries no discount value (a free item offer).
    pub fn is_free(&self) -> bool {
        self.value.map_or(true, |v| v == 0.0)
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card(number_style: &str, value: Value) -> Card {
        serde_json::from_value(json!({
            "coupon": {
                "primaryFields": [
                    {"key": "header", "value": "ignored"},
                    {"key": "primary", "value": "Save"}
                ],
                "secondaryFields": [
                    {"key": "expires", "value": "2024-12-31"},
                    {
                        "key": "$maxValue",
                        "value": value,
                        "currencyCode": "USD",
                        "numberStyle": number_style
                    }
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_customer_decoding() {
        let customer: Customer = serde_json::from_value(json!({
            "id": 12,
            "email": "jane@example.com",
            "currentOfferId": 7,
            "customFields": {"GDPR": "Yes"},
            "points": 140
        }))
        .unwrap();

        assert_eq!(customer.id, 12);
        assert_eq!(customer.active_offer(), Some(&OfferId::new("7")));
        assert_eq!(customer.custom_fields.get_str("GDPR").as_deref(), Some("Yes"));
        assert_eq!(customer.extra.get("points"), Some(&json!(140)));
    }

    #[test]
    fn test_null_offer_variants() {
        for raw in [json!(null), json!("null"), json!("")] {
            let customer: Customer = serde_json::from_value(json!({
                "id": "3",
                "email": "a@b.c",
                "currentOfferId": raw,
                "customFields": null
            }))
            .unwrap();
            assert_eq!(customer.active_offer(), None);
            assert!(customer.custom_fields.is_empty());
        }
    }

    #[test]
    fn test_push_consent_rule() {
        let mut customer: Customer =
            serde_json::from_value(json!({"id": 1, "email": "a@b.c"})).unwrap();
        assert!(customer.accepts_push_messages());

        customer.custom_fields.insert("favourite", "tea");
        assert!(customer.accepts_push_messages());

        customer.custom_fields.insert(GDPR_FIELD, "No");
        assert!(customer.accepts_push_messages());

        customer.custom_fields.insert(GDPR_FIELD, "");
        assert!(customer.accepts_push_messages());

        customer.custom_fields.insert(GDPR_FIELD, "Yes");
        assert!(!customer.accepts_push_messages());
    }

    #[test]
    fn test_offer_from_percent_card() {
        let offer = Offer::from_card(OfferId::new("7"), &card("PKNumberStylePercent", json!(0.15)));

        assert_eq!(offer.offer_type, OfferType::Percent);
        assert_eq!(offer.name.as_deref(), Some("Save"));
        assert_eq!(offer.value, Some(0.15));
        assert_eq!(offer.friendly_name.as_deref(), Some("Save (15%)"));
        assert_eq!(offer.friendly_name_to_be_added.as_deref(), Some("Save (-15%)"));
    }

    #[test]
    fn test_offer_from_decimal_card() {
        let offer = Offer::from_card(OfferId::new("8"), &card("PKNumberStyleDecimal", json!("5")));

        assert_eq!(offer.offer_type, OfferType::FixedCart);
        assert_eq!(offer.value, Some(5.0));
        assert_eq!(offer.currency.as_deref(), Some("USD"));
        assert_eq!(offer.friendly_name_to_be_added.as_deref(), Some("Save (-5USD)"));
    }

    #[test]
    fn test_offer_without_value_is_free() {
        let offer = Offer::from_card(OfferId::new("9"), &card("PKNumberStyleDecimal", json!(0)));

        assert!(offer.is_free());
        assert_eq!(offer.friendly_name.as_deref(), Some("Save (FREE)"));
        assert_eq!(offer.friendly_name_to_be_added.as_deref(), Some("Save (FREE)"));
    }

    #[test]
    fn test_offer_from_empty_card() {
        let offer = Offer::from_card(OfferId::new("10"), &Card::default());

        assert_eq!(offer.offer_type, OfferType::FixedCart);
        assert_eq!(offer.name, None);
        // Missing name leaves the token in place.
        assert_eq!(offer.friendly_name.as_deref(), Some("{name} (FREE)"));
    }

    #[test]
    fn test_offer_serde_uses_type_key() {
        let offer = Offer::new("7", OfferType::Percent);
        let value = serde_json::to_value(&offer).unwrap();
        assert_eq!(value["type"], json!("percent"));
        assert_eq!(value["id"], json!("7"));
    }
}
