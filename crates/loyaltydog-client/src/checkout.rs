//! # Checkout Redemption Flow
//!
//! Cart-side half of a redemption: the shopper presses REDEEM, a one-off
//! coupon is generated for their active offer and applied to the cart. The
//! upstream redeem call happens later, when the order earns points.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart empty        available_offer_message   "Active Loyalty Offer..."  │
//! │       │                                                                 │
//! │  cart has items    redeem_offer_message      prompt + REDEEM form       │
//! │       │                                                                 │
//! │  REDEEM pressed    redeem                    offer → session,           │
//! │       │                                      code  → cart               │
//! │       ▼                                                                 │
//! │  cart totals       coupon_data               CouponData for the code    │
//! │                    coupon_label              "Loyalty Reward"           │
//! │                    points_last               redemption codes last      │
//! │       │                                                                 │
//! │  coupon removed    discount_removed          clears the session offer   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Between the offer check and the order there is no lock: a customer who
//! redeems the same offer in two carts gets it applied twice on the shop
//! side, and the second upstream redeem fails and is logged.

use std::sync::Arc;
use tracing::debug;

use loyaltydog_core::discount::{
    generate_discount_code, is_redemption_code, order_redemption_codes_last, CouponData,
    COUPON_LABEL, REDEEMED_MESSAGE,
};
use loyaltydog_core::{Offer, UserId};

use crate::host::{Cart, CheckoutSession};
use crate::manager::LoyaltyManager;

/// Default target of the REDEEM form.
pub const DEFAULT_CART_URL: &str = "/cart/";

/// Result of pressing REDEEM.
#[derive(Debug, Clone, PartialEq)]
pub enum RedeemOutcome {
    /// The session's code is already on the cart.
    AlreadyApplied,
    /// The shopper has no offer to redeem.
    NoOffer,
    Applied { code: String, offer: Offer },
    /// The cart refused the generated code.
    Rejected { code: String },
}

pub struct CheckoutFlow {
    manager: Arc<LoyaltyManager>,
    cart_url: String,
}

impl CheckoutFlow {
    pub fn new(manager: Arc<LoyaltyManager>) -> Self {
        CheckoutFlow {
            manager,
            cart_url: DEFAULT_CART_URL.to_string(),
        }
    }

    pub fn with_cart_url(mut self, cart_url: impl Into<String>) -> Self {
        self.cart_url = cart_url.into();
        self
    }

    /// Applies the shopper's active offer to the cart.
    pub async fn redeem(
        &self,
        user_id: UserId,
        cart: &mut dyn Cart,
        session: &mut dyn CheckoutSession,
    ) -> RedeemOutcome {
        if already_applied(cart, session) {
            return RedeemOutcome::AlreadyApplied;
        }

        let Some(offer) = self.manager.check_offer_available(user_id).await else {
            return RedeemOutcome::NoOffer;
        };

        let code = generate_discount_code(&offer, user_id, self.manager.host().now());
        debug!(user_id, code = %code, "Generated redemption code");
        session.store_redemption(code.clone(), offer.clone());

        if cart.add_discount(&code) {
            RedeemOutcome::Applied { code, offer }
        } else {
            RedeemOutcome::Rejected { code }
        }
    }

    /// Notice for a shopper with an offer and an empty cart.
    pub async fn available_offer_message(&self, user_id: UserId, cart: &dyn Cart) -> Option<String> {
        if !self.manager.host().coupons_enabled() || !cart.is_empty() {
            return None;
        }

        let template = &self.manager.messages().available_offer;
        if template.is_empty() {
            return None;
        }

        let offer = self.manager.check_offer_available(user_id).await?;
        Some(self.manager.offer_message(template, &offer))
    }

    /// Redeem prompt with its REDEEM button, until the code is on the cart.
    pub async fn redeem_offer_message(
        &self,
        user_id: UserId,
        cart: &dyn Cart,
        session: &dyn CheckoutSession,
    ) -> Option<String> {
        if !self.manager.host().coupons_enabled() || already_applied(cart, session) {
            return None;
        }

        let template = &self.manager.messages().redeem_offer;
        if template.is_empty() {
            return None;
        }

        let offer = self.manager.check_offer_available(user_id).await?;
        let message = self.manager.offer_message(template, &offer);

        Some(format!(
            "<div class=\"woocommerce-info loyalty-dog-redeem-offer-message\">{message}\
             <form class=\"loyalty-dog-redeem-offer\" action=\"{}\" method=\"post\" style=\"display:inline\">\
             <input type=\"submit\" class=\"button\" name=\"loyalty-dog-redeem-offer\" value=\"REDEEM\" />\
             </form></div>",
            self.cart_url
        ))
    }
}

fn already_applied(cart: &dyn Cart, session: &dyn CheckoutSession) -> bool {
    session
        .redeem_code()
        .is_some_and(|code| cart.has_discount(code))
}

// =============================================================================
// Cart Hooks
// =============================================================================

/// Virtual coupon for `code` when it is this session's redemption code.
pub fn coupon_data(code: &str, session: &dyn CheckoutSession) -> Option<CouponData> {
    let session_code = session.redeem_code()?;
    if !code.eq_ignore_ascii_case(session_code) {
        return None;
    }
    session.redeem_offer().map(CouponData::for_offer)
}

/// Cart label for a coupon.
pub fn coupon_label<'a>(code: &str, label: &'a str) -> &'a str {
    if is_redemption_code(code) {
        COUPON_LABEL
    } else {
        label
    }
}

/// Discount column text: the offer's friendly name instead of an amount.
pub fn discount_amount_html(code: &str, html: &str, session: &dyn CheckoutSession) -> String {
    if !is_redemption_code(code) {
        return html.to_string();
    }
    session
        .redeem_offer()
        .and_then(|offer| offer.friendly_name_to_be_added.clone())
        .unwrap_or_else(|| html.to_string())
}

/// "Coupon applied" notice.
pub fn discount_applied_message(code: &str, message: &str, session: &dyn CheckoutSession) -> String {
    match session.redeem_code() {
        Some(session_code) if code.eq_ignore_ascii_case(session_code) => REDEEMED_MESSAGE.to_string(),
        _ => message.to_string(),
    }
}

/// Forgets the redeemed offer once its code leaves the cart.
pub fn discount_removed(code: &str, session: &mut dyn CheckoutSession) {
    if is_redemption_code(code) {
        debug!(code, "Redemption code removed from cart");
        session.clear_redemption();
    }
}

/// Applied coupons with redemption codes moved to the end.
pub fn points_last(cart: &dyn Cart) -> Vec<String> {
    order_redemption_codes_last(cart.applied_coupons())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{InMemoryCart, InMemoryHost, InMemorySession};
    use crate::test_support::{card_json, customer_json, manager_with};
    use crate::transport::{HttpRequest, HttpResponse, MockTransport};
    use chrono::NaiveDate;
    use loyaltydog_core::OfferType;
    use mockall::predicate::function;

    const CODE: &str = "loyalty_dog_redemption_3_2024_03_05_02_07_7";

    fn offer_transport() -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.contains("customers?email=")))
            .returning(|_| HttpResponse::new(200, format!("[{}]", customer_json(12, "jane@example.com", Some(7)))));
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.ends_with("/customers/12")))
            .returning(|_| HttpResponse::new(200, customer_json(12, "jane@example.com", Some(7))));
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.ends_with("/offers/7/card")))
            .returning(|_| HttpResponse::new(200, card_json("PKNumberStylePercent", 0.15)));
        transport
    }

    fn host() -> InMemoryHost {
        let now = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 0)
            .unwrap();
        InMemoryHost::new().with_user(3, "jane@example.com").with_clock(now)
    }

    fn flow(transport: MockTransport, host: InMemoryHost) -> CheckoutFlow {
        CheckoutFlow::new(Arc::new(manager_with(transport, host)))
    }

    fn percent_offer() -> Offer {
        let mut offer = Offer::new("7", OfferType::Percent);
        offer.value = Some(0.15);
        offer.friendly_name_to_be_added = Some("Save (-15%)".into());
        offer
    }

    #[tokio::test]
    async fn test_redeem_applies_code_once() {
        let flow = flow(offer_transport(), host());
        let mut cart = InMemoryCart::with_items(1);
        let mut session = InMemorySession::new();

        let outcome = flow.redeem(3, &mut cart, &mut session).await;
        match outcome {
            RedeemOutcome::Applied { code, offer } => {
                assert_eq!(code, CODE);
                assert_eq!(offer.id.as_str(), "7");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(cart.has_discount(CODE));
        assert_eq!(session.redeem_code(), Some(CODE));

        assert_eq!(
            flow.redeem(3, &mut cart, &mut session).await,
            RedeemOutcome::AlreadyApplied
        );
    }

    #[tokio::test]
    async fn test_redeem_without_customer() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();
        let flow = flow(transport, InMemoryHost::new());

        let mut cart = InMemoryCart::with_items(1);
        let mut session = InMemorySession::new();
        assert_eq!(flow.redeem(0, &mut cart, &mut session).await, RedeemOutcome::NoOffer);
        assert!(session.redeem_offer().is_none());
    }

    #[tokio::test]
    async fn test_available_offer_message_only_for_empty_cart() {
        let flow = flow(offer_transport(), host());

        let message = flow
            .available_offer_message(3, &InMemoryCart::new())
            .await
            .unwrap();
        assert_eq!(
            message,
            "<strong>Active Loyalty Offer:</strong> Save (-15%).<br />You can add some products to redeem this offer."
        );

        assert!(flow
            .available_offer_message(3, &InMemoryCart::with_items(2))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_messages_hidden_when_coupons_disabled() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();
        let flow = flow(transport, host().without_coupons());

        assert!(flow.available_offer_message(3, &InMemoryCart::new()).await.is_none());
        assert!(flow
            .redeem_offer_message(3, &InMemoryCart::with_items(1), &InMemorySession::new())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_redeem_offer_message_wraps_form_until_applied() {
        let flow = flow(offer_transport(), host()).with_cart_url("https://shop.test/cart/");
        let mut cart = InMemoryCart::with_items(1);
        let mut session = InMemorySession::new();

        let message = flow.redeem_offer_message(3, &cart, &session).await.unwrap();
        assert!(message.starts_with(
            "<div class=\"woocommerce-info loyalty-dog-redeem-offer-message\"><strong>Loyalty Reward:</strong> Save (-15%)<form"
        ));
        assert!(message.contains("action=\"https://shop.test/cart/\""));
        assert!(message.contains("value=\"REDEEM\""));
        assert!(message.ends_with("</form></div>"));

        flow.redeem(3, &mut cart, &mut session).await;
        assert!(flow.redeem_offer_message(3, &cart, &session).await.is_none());
    }

    #[test]
    fn test_coupon_data_only_for_session_code() {
        let mut session = InMemorySession::new();
        assert!(coupon_data(CODE, &session).is_none());

        session.store_redemption(CODE.into(), percent_offer());
        let data = coupon_data(&CODE.to_uppercase(), &session).unwrap();
        assert_eq!(data.discount_type, OfferType::Percent);
        assert_eq!(data.amount, 15.0);
        assert_eq!(data.usage_limit, 1);

        assert!(coupon_data("summer10", &session).is_none());
    }

    #[test]
    fn test_cart_display_hooks() {
        let mut session = InMemorySession::new();
        session.store_redemption(CODE.into(), percent_offer());

        assert_eq!(coupon_label(CODE, "Coupon: x"), "Loyalty Reward");
        assert_eq!(coupon_label("summer10", "Coupon: summer10"), "Coupon: summer10");
        assert_eq!(discount_amount_html(CODE, "-$5.00", &session), "Save (-15%)");
        assert_eq!(discount_amount_html("summer10", "-$5.00", &session), "-$5.00");
        assert_eq!(
            discount_applied_message(CODE, "Coupon code applied successfully.", &session),
            "Redeemed Successfully"
        );
        assert_eq!(
            discount_applied_message("summer10", "Coupon code applied successfully.", &session),
            "Coupon code applied successfully."
        );
    }

    #[test]
    fn test_removing_redemption_code_clears_session() {
        let mut session = InMemorySession::new();
        session.store_redemption(CODE.into(), percent_offer());

        discount_removed("summer10", &mut session);
        assert!(session.redeem_offer().is_some());

        discount_removed(CODE, &mut session);
        assert!(session.redeem_offer().is_none());
    }

    #[test]
    fn test_points_last_ordering() {
        let mut cart = InMemoryCart::with_items(1);
        cart.add_discount(CODE);
        cart.add_discount("summer10");
        assert_eq!(points_last(&cart), vec!["summer10".to_string(), CODE.to_string()]);
    }
}
