//! # Event Adapters
//!
//! Thin handlers for the host lifecycle events that earn or spend loyalty.
//!
//! ## Events
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  order status → earn_when     award points for the order total;         │
//! │                               redeem the active offer when the order    │
//! │                               used its redemption code                  │
//! │  review posted (approved)     award write_review_points for the first   │
//! │  review approved later        review by a user on a product             │
//! │  account created              award account_signup_points               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers never fail: anything missing is logged and the event skipped.

use std::sync::Arc;
use tracing::{debug, error, info};

use loyaltydog_core::discount::code_redeems_offer;
use loyaltydog_core::UserId;

use crate::config::{EarnWhen, PointsSettings};
use crate::host::{OrderId, ReviewComment};
use crate::manager::LoyaltyManager;

// =============================================================================
// Review Policy
// =============================================================================

/// Which review event is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTrigger {
    Posted,
    Approved,
}

/// Decides whether a product review earns points.
pub trait ReviewAwardPolicy: Send + Sync {
    /// `review_count` is the number of comments the author has on the
    /// product, the current one included.
    fn should_award(&self, comment: &ReviewComment, review_count: usize, trigger: ReviewTrigger) -> bool;
}

/// Awards only the first review a user places on a product.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstReviewOnly;

impl ReviewAwardPolicy for FirstReviewOnly {
    fn should_award(&self, _comment: &ReviewComment, review_count: usize, _trigger: ReviewTrigger) -> bool {
        review_count <= 1
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// What an order event did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderOutcome {
    pub points: i64,
    pub awarded: bool,
    pub redeemed: bool,
}

pub struct LoyaltyActions {
    manager: Arc<LoyaltyManager>,
    earn_when: EarnWhen,
    account_signup_points: i64,
    write_review_points: i64,
    review_policy: Arc<dyn ReviewAwardPolicy>,
}

impl LoyaltyActions {
    pub fn new(manager: Arc<LoyaltyManager>, points: &PointsSettings) -> Self {
        LoyaltyActions {
            manager,
            earn_when: points.earn_when,
            account_signup_points: points.account_signup_points,
            write_review_points: points.write_review_points,
            review_policy: Arc::new(FirstReviewOnly),
        }
    }

    pub fn with_review_policy(mut self, policy: Arc<dyn ReviewAwardPolicy>) -> Self {
        self.review_policy = policy;
        self
    }

    pub fn earn_when(&self) -> EarnWhen {
        self.earn_when
    }

    /// Dispatches to [`Self::order_completed`] when `status` is the
    /// configured trigger status.
    pub async fn order_status_changed(&self, order_id: OrderId, status: &str) -> OrderOutcome {
        let status = status.strip_prefix("wc-").unwrap_or(status);
        if status != self.earn_when.as_status() {
            debug!(order_id, status, trigger = %self.earn_when, "Order status does not earn points");
            return OrderOutcome::default();
        }
        self.order_completed(order_id).await
    }

    /// Awards points for a completed order and settles its redemption.
    pub async fn order_completed(&self, order_id: OrderId) -> OrderOutcome {
        debug!(order_id, "Order received");
        let mut outcome = OrderOutcome::default();

        let Some(order) = self.manager.host().order(order_id).await else {
            error!(order_id, "Failure to get order details");
            return outcome;
        };

        if order.customer_id == 0 {
            debug!(order_id, "Ordered by guest, rejected");
            return outcome;
        }

        let Some(customer) = self.manager.get_loyalty_customer(order.customer_id).await else {
            return outcome;
        };

        outcome.points = self.manager.calculate_points(order.total);
        outcome.awarded = self
            .manager
            .update_loyalty_points(outcome.points, 0, Some(customer.clone()))
            .await;
        if outcome.awarded {
            info!(order_id, customer_id = customer.id, points = outcome.points, "Awarded points for order");
        }

        if let Some(offer_id) = customer.active_offer() {
            let used_redemption = order
                .coupon_codes
                .iter()
                .any(|code| code_redeems_offer(code, offer_id));

            if used_redemption {
                outcome.redeemed = self.manager.redeem_offer(0, Some(customer.clone())).await;
                if outcome.redeemed {
                    info!(order_id, customer_id = customer.id, offer_id = %offer_id, "Redeemed offer for order");
                }
            }
        }

        outcome
    }

    /// A comment was posted by the logged-in `current_user`.
    pub async fn review_posted(&self, comment: &ReviewComment, approved: bool, current_user: UserId) -> bool {
        if current_user == 0 || !approved {
            return false;
        }
        self.award_review(comment, current_user, ReviewTrigger::Posted).await
    }

    /// A held comment was approved by a moderator.
    pub async fn review_approved(&self, comment: &ReviewComment) -> bool {
        if comment.user_id == 0 {
            return false;
        }
        self.award_review(comment, comment.user_id, ReviewTrigger::Approved).await
    }

    async fn award_review(&self, comment: &ReviewComment, user_id: UserId, trigger: ReviewTrigger) -> bool {
        let host = self.manager.host();
        if self.write_review_points == 0 || !host.is_product(comment.post_id).await {
            return false;
        }

        let review_count = host.review_count(user_id, comment.post_id).await;
        if !self.review_policy.should_award(comment, review_count, trigger) {
            debug!(user_id, post_id = comment.post_id, review_count, "Review does not earn points");
            return false;
        }

        debug!(user_id, points = self.write_review_points, "Add points for product review");
        self.manager
            .update_loyalty_points(self.write_review_points, user_id, None)
            .await
    }

    /// A new host account was registered.
    pub async fn account_created(&self, user_id: UserId) -> bool {
        if self.account_signup_points == 0 {
            return false;
        }

        debug!(user_id, points = self.account_signup_points, "Add points for new signup");
        self.manager
            .update_loyalty_points(self.account_signup_points, user_id, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{InMemoryHost, OrderSnapshot};
    use crate::test_support::{count_errors, customer_json, manager_with, ErrorCounter};
    use crate::transport::{HttpMethod, HttpRequest, HttpResponse, MockTransport};
    use loyaltydog_core::Money;
    use mockall::predicate::function;
    use serde_json::json;

    const CODE_FOR_7: &str = "loyalty_dog_redemption_3_2024_03_05_02_07_7";
    const CODE_FOR_77: &str = "loyalty_dog_redemption_3_2024_03_05_02_07_77";

    fn settings() -> PointsSettings {
        PointsSettings {
            account_signup_points: 50,
            write_review_points: 20,
            ..PointsSettings::default()
        }
    }

    fn expect_customer(transport: &mut MockTransport, offer: Option<u64>) {
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.contains("customers?email=")))
            .returning(move |_| HttpResponse::new(200, format!("[{}]", customer_json(12, "jane@example.com", offer))));
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.method == HttpMethod::Get && req.url.ends_with("/customers/12")))
            .returning(move |_| HttpResponse::new(200, customer_json(12, "jane@example.com", offer)));
    }

    fn expect_points(transport: &mut MockTransport, points: i64, times: usize) {
        transport
            .expect_send()
            .with(function(move |req: &HttpRequest| {
                req.url.ends_with("/customers/12/points/add") && req.payload == Some(json!({ "points": points }))
            }))
            .times(times)
            .returning(|_| HttpResponse::new(200, "{}"));
    }

    fn order(coupons: &[&str]) -> OrderSnapshot {
        OrderSnapshot {
            id: 100,
            customer_id: 3,
            total: Money::from_cents(2550),
            coupon_codes: coupons.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn actions(transport: MockTransport, host: InMemoryHost) -> LoyaltyActions {
        LoyaltyActions::new(Arc::new(manager_with(transport, host)), &settings())
    }

    #[tokio::test]
    async fn test_order_awards_points_and_redeems_matching_code() {
        let mut transport = MockTransport::new();
        expect_customer(&mut transport, Some(7));
        expect_points(&mut transport, 26, 1);
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.ends_with("/customers/12/offers/current/redeem")))
            .times(1)
            .returning(|_| HttpResponse::new(202, ""));

        let host = InMemoryHost::new()
            .with_user(3, "jane@example.com")
            .with_order(order(&["summer10", CODE_FOR_7]));

        let outcome = actions(transport, host).order_completed(100).await;
        assert_eq!(
            outcome,
            OrderOutcome {
                points: 26,
                awarded: true,
                redeemed: true
            }
        );
    }

    #[tokio::test]
    async fn test_code_for_another_offer_is_not_redeemed() {
        let mut transport = MockTransport::new();
        expect_customer(&mut transport, Some(7));
        expect_points(&mut transport, 26, 1);

        let host = InMemoryHost::new()
            .with_user(3, "jane@example.com")
            .with_order(order(&[CODE_FOR_77]));

        let outcome = actions(transport, host).order_completed(100).await;
        assert!(outcome.awarded);
        assert!(!outcome.redeemed);
    }

    #[tokio::test]
    async fn test_guest_order_is_skipped() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();

        let host = InMemoryHost::new().with_order(OrderSnapshot {
            customer_id: 0,
            ..order(&[])
        });
        assert_eq!(actions(transport, host).order_completed(100).await, OrderOutcome::default());
    }

    #[tokio::test]
    async fn test_missing_order_logs_one_error() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();
        let actions = actions(transport, InMemoryHost::new());

        let (counter, _guard) = ErrorCounter::install();
        assert_eq!(actions.order_completed(404).await, OrderOutcome::default());
        assert_eq!(count_errors(&counter), 1);
    }

    #[tokio::test]
    async fn test_only_trigger_status_earns() {
        let mut transport = MockTransport::new();
        expect_customer(&mut transport, None);
        expect_points(&mut transport, 26, 1);

        let host = InMemoryHost::new()
            .with_user(3, "jane@example.com")
            .with_order(order(&[]));
        let actions = actions(transport, host);

        assert!(!actions.order_status_changed(100, "completed").await.awarded);
        assert!(actions.order_status_changed(100, "wc-processing").await.awarded);
    }

    #[tokio::test]
    async fn test_first_product_review_earns_once() {
        let mut transport = MockTransport::new();
        expect_customer(&mut transport, None);
        expect_points(&mut transport, 20, 1);

        let host = InMemoryHost::new().with_user(3, "jane@example.com").with_product(11);
        host.add_review(3, 11);
        let actions = actions(transport, host);
        let comment = ReviewComment {
            comment_id: 1,
            post_id: 11,
            user_id: 3,
        };

        assert!(!actions.review_posted(&comment, false, 3).await);
        assert!(!actions.review_posted(&comment, true, 0).await);
        assert!(actions.review_posted(&comment, true, 3).await);

        // Comments on anything but a product never earn.
        let blog_comment = ReviewComment { post_id: 12, ..comment };
        assert!(!actions.review_approved(&blog_comment).await);
    }

    #[tokio::test]
    async fn test_second_review_earns_nothing() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();

        let host = InMemoryHost::new().with_user(3, "jane@example.com").with_product(11);
        host.add_review(3, 11);
        host.add_review(3, 11);
        let comment = ReviewComment {
            comment_id: 2,
            post_id: 11,
            user_id: 3,
        };

        let actions = actions(transport, host);
        assert!(!actions.review_approved(&comment).await);
        assert!(!actions.review_posted(&comment, true, 3).await);
    }

    #[tokio::test]
    async fn test_review_policy_can_veto() {
        struct Never;
        impl ReviewAwardPolicy for Never {
            fn should_award(&self, _: &ReviewComment, _: usize, _: ReviewTrigger) -> bool {
                false
            }
        }

        let mut transport = MockTransport::new();
        transport.expect_send().never();

        let host = InMemoryHost::new().with_user(3, "jane@example.com").with_product(11);
        host.add_review(3, 11);
        let actions = actions(transport, host).with_review_policy(Arc::new(Never));

        let comment = ReviewComment {
            comment_id: 1,
            post_id: 11,
            user_id: 3,
        };
        assert!(!actions.review_approved(&comment).await);
    }

    #[tokio::test]
    async fn test_account_signup_points() {
        let mut transport = MockTransport::new();
        expect_customer(&mut transport, None);
        expect_points(&mut transport, 50, 1);

        let host = InMemoryHost::new().with_user(3, "jane@example.com");
        assert!(actions(transport, host).account_created(3).await);
    }

    #[tokio::test]
    async fn test_unset_signup_points_do_nothing() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();

        let manager = manager_with(transport, InMemoryHost::new().with_user(3, "jane@example.com"));
        let actions = LoyaltyActions::new(Arc::new(manager), &PointsSettings::default());
        assert!(!actions.account_created(3).await);
    }
}
