//! # Loyalty Manager
//!
//! Joins host users to loyalty customers and performs the award / redeem
//! operations the event adapters and checkout flow share.
//!
//! ```text
//! host user id ──► HostPlatform::user_email ──► LoyaltyApi::get_customer_details
//!                                                        │
//!                        ┌───────────────────────────────┼──────────────────┐
//!                        ▼                               ▼                  ▼
//!               update_loyalty_points            redeem_offer     check_offer_available
//!               (skips 0 points)                 (202 expected)   (active offer → card)
//! ```

use std::sync::Arc;
use tracing::debug;

use loyaltydog_core::message::OfferMessageFormatter;
use loyaltydog_core::points::PointsCalculator;
use loyaltydog_core::{Customer, Money, Offer, UserId};

use crate::api::LoyaltyApi;
use crate::config::MessageSettings;
use crate::host::HostPlatform;

pub struct LoyaltyManager {
    api: Arc<LoyaltyApi>,
    host: Arc<dyn HostPlatform>,
    calculator: PointsCalculator,
    formatter: Arc<dyn OfferMessageFormatter>,
    messages: MessageSettings,
}

impl LoyaltyManager {
    pub fn new(
        api: Arc<LoyaltyApi>,
        host: Arc<dyn HostPlatform>,
        calculator: PointsCalculator,
        formatter: Arc<dyn OfferMessageFormatter>,
        messages: MessageSettings,
    ) -> Self {
        LoyaltyManager {
            api,
            host,
            calculator,
            formatter,
            messages,
        }
    }

    pub fn api(&self) -> &LoyaltyApi {
        &self.api
    }

    pub fn host(&self) -> &dyn HostPlatform {
        self.host.as_ref()
    }

    pub fn messages(&self) -> &MessageSettings {
        &self.messages
    }

    /// Points earned for a purchase of `amount`.
    pub fn calculate_points(&self, amount: Money) -> i64 {
        self.calculator.calculate_points(amount)
    }

    /// Renders a customer-facing template for `offer`.
    pub fn offer_message(&self, template: &str, offer: &Offer) -> String {
        self.formatter.format(template, offer)
    }

    /// Loyalty customer matching the host user's email.
    pub async fn get_loyalty_customer(&self, user_id: UserId) -> Option<Customer> {
        if user_id == 0 {
            debug!("No logged in user");
            return None;
        }

        let Some(email) = self.host.user_email(user_id).await else {
            debug!(user_id, "Unknown host user");
            return None;
        };

        self.api.get_customer_details(&email).await
    }

    async fn resolve(&self, user_id: UserId, customer: Option<Customer>) -> Option<Customer> {
        match customer {
            Some(customer) => Some(customer),
            None => self.get_loyalty_customer(user_id).await,
        }
    }

    /// Adds `points` to the customer, resolved from `user_id` unless given.
    ///
    /// Zero points is never sent upstream.
    pub async fn update_loyalty_points(
        &self,
        points: i64,
        user_id: UserId,
        customer: Option<Customer>,
    ) -> bool {
        if points == 0 {
            debug!(user_id, "No points to award");
            return false;
        }

        let Some(customer) = self.resolve(user_id, customer).await else {
            return false;
        };

        self.api.update_points(customer.id, points).await
    }

    /// Redeems the customer's current offer.
    pub async fn redeem_offer(&self, user_id: UserId, customer: Option<Customer>) -> bool {
        let Some(customer) = self.resolve(user_id, customer).await else {
            return false;
        };

        let redeemed = self.api.redeem_offer(customer.id).await;
        if redeemed {
            // The active offer changed upstream.
            self.api.forget_customer(&customer).await;
        }
        redeemed
    }

    /// The offer `user_id` may redeem right now, if any.
    pub async fn check_offer_available(&self, user_id: UserId) -> Option<Offer> {
        let customer = self.get_loyalty_customer(user_id).await?;

        let Some(offer_id) = customer.active_offer() else {
            debug!(customer_id = customer.id, "Customer has no active offer");
            return None;
        };

        self.api.get_offer_details(offer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;
    use crate::test_support::{card_json, customer_json, manager_with};
    use crate::transport::{HttpMethod, HttpRequest, HttpResponse, MockTransport};
    use mockall::predicate::function;

    #[tokio::test]
    async fn test_zero_points_never_reach_the_api() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();

        let manager = manager_with(transport, InMemoryHost::new().with_user(3, "jane@example.com"));
        assert!(!manager.update_loyalty_points(0, 3, None).await);
    }

    #[tokio::test]
    async fn test_guest_and_unknown_users_have_no_customer() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();

        let manager = manager_with(transport, InMemoryHost::new());
        assert!(manager.get_loyalty_customer(0).await.is_none());
        assert!(manager.get_loyalty_customer(5).await.is_none());
        assert!(!manager.redeem_offer(5, None).await);
    }

    #[tokio::test]
    async fn test_award_points_resolves_customer_by_email() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.contains("customers?email=jane%40example.com")))
            .times(1)
            .returning(|_| HttpResponse::new(200, format!("[{}]", customer_json(12, "jane@example.com", None))));
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.method == HttpMethod::Get && req.url.ends_with("/customers/12")))
            .times(1)
            .returning(|_| HttpResponse::new(200, customer_json(12, "jane@example.com", None)));
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.ends_with("/customers/12/points/add")))
            .times(1)
            .returning(|_| HttpResponse::new(200, "{}"));

        let manager = manager_with(transport, InMemoryHost::new().with_user(3, "Jane@Example.com"));
        assert!(manager.update_loyalty_points(25, 3, None).await);
    }

    #[tokio::test]
    async fn test_check_offer_available() {
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
            .times(1)
            .returning(|_| HttpResponse::new(200, card_json("PKNumberStylePercent", 0.15)));

        let manager = manager_with(transport, InMemoryHost::new().with_user(3, "jane@example.com"));
        let offer = manager.check_offer_available(3).await.unwrap();
        assert_eq!(offer.id.as_str(), "7");
        assert_eq!(
            manager.offer_message("{friendlyNameToBeAdded}", &offer),
            "Save (-15%)"
        );
    }

    #[tokio::test]
    async fn test_no_active_offer() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.contains("customers?email=")))
            .returning(|_| HttpResponse::new(200, format!("[{}]", customer_json(12, "jane@example.com", None))));
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.ends_with("/customers/12")))
            .returning(|_| HttpResponse::new(200, customer_json(12, "jane@example.com", None)));

        let manager = manager_with(transport, InMemoryHost::new().with_user(3, "jane@example.com"));
        assert!(manager.check_offer_available(3).await.is_none());
    }

    #[test]
    fn test_points_use_configured_ratio() {
        let manager = manager_with(MockTransport::new(), InMemoryHost::new());
        assert_eq!(manager.calculate_points(Money::from_cents(1000)), 10);
    }
}
