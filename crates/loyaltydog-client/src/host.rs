//! # Host Platform Collaborators
//!
//! What the integration needs from the e-commerce platform it runs inside.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HostPlatform      users, orders, reviews, shop clock (shared)          │
//! │  CheckoutSession   per-shopper redemption state (request scoped)        │
//! │  Cart              applied coupons of the current cart (request scoped) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! In-memory implementations back the tests and the admin CLI.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use loyaltydog_core::{Money, Offer, UserId};

/// Host order identifier.
pub type OrderId = u64;

/// Host post (product page) identifier.
pub type PostId = u64;

/// The parts of a placed order the integration reads.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub id: OrderId,
    /// Purchasing user, 0 for guest checkout.
    pub customer_id: UserId,
    pub total: Money,
    pub coupon_codes: Vec<String>,
}

/// A freshly posted or approved comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewComment {
    pub comment_id: u64,
    pub post_id: PostId,
    /// Author, 0 for anonymous comments.
    pub user_id: UserId,
}

// =============================================================================
// Traits
// =============================================================================

/// Read access to the host platform.
#[async_trait]
pub trait HostPlatform: Send + Sync {
    async fn user_email(&self, user_id: UserId) -> Option<String>;

    async fn order(&self, order_id: OrderId) -> Option<OrderSnapshot>;

    /// Whether the post is a product (as opposed to a blog post or page).
    async fn is_product(&self, post_id: PostId) -> bool;

    /// Number of comments `user_id` has placed on `post_id`, this one included.
    async fn review_count(&self, user_id: UserId, post_id: PostId) -> usize;

    /// Whether the shop accepts coupons at all.
    fn coupons_enabled(&self) -> bool {
        true
    }

    /// Current shop-local wall clock time.
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Redemption state stored in the shopper's session.
pub trait CheckoutSession: Send + Sync {
    fn redeem_offer(&self) -> Option<&Offer>;

    fn redeem_code(&self) -> Option<&str>;

    fn store_redemption(&mut self, code: String, offer: Offer);

    fn clear_redemption(&mut self);
}

/// The shopper's cart.
pub trait Cart: Send + Sync {
    fn is_empty(&self) -> bool;

    fn applied_coupons(&self) -> Vec<String>;

    fn has_discount(&self, code: &str) -> bool {
        self.applied_coupons()
            .iter()
            .any(|applied| applied.eq_ignore_ascii_case(code))
    }

    /// Applies `code`; false when the cart rejected it.
    fn add_discount(&mut self, code: &str) -> bool;
}

// =============================================================================
// In-Memory Implementations
// =============================================================================

#[derive(Debug, Default)]
struct HostState {
    emails: HashMap<UserId, String>,
    orders: HashMap<OrderId, OrderSnapshot>,
    products: HashSet<PostId>,
    reviews: HashMap<(UserId, PostId), usize>,
}

/// Host backed by maps, with an optional frozen clock.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: RwLock<HostState>,
    coupons_disabled: bool,
    clock: Option<NaiveDateTime>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: UserId, email: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.emails.insert(user_id, email.into());
        }
        self
    }

    pub fn with_order(self, order: OrderSnapshot) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.orders.insert(order.id, order);
        }
        self
    }

    pub fn with_product(self, post_id: PostId) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.products.insert(post_id);
        }
        self
    }

    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn without_coupons(mut self) -> Self {
        self.coupons_disabled = true;
        self
    }

    /// Records one more comment by `user_id` on `post_id`.
    pub fn add_review(&self, user_id: UserId, post_id: PostId) {
        if let Ok(mut state) = self.state.write() {
            *state.reviews.entry((user_id, post_id)).or_default() += 1;
        }
    }
}

#[async_trait]
impl HostPlatform for InMemoryHost {
    async fn user_email(&self, user_id: UserId) -> Option<String> {
        self.state.read().ok()?.emails.get(&user_id).cloned()
    }

    async fn order(&self, order_id: OrderId) -> Option<OrderSnapshot> {
        self.state.read().ok()?.orders.get(&order_id).cloned()
    }

    async fn is_product(&self, post_id: PostId) -> bool {
        self.state
            .read()
            .map(|state| state.products.contains(&post_id))
            .unwrap_or(false)
    }

    async fn review_count(&self, user_id: UserId, post_id: PostId) -> usize {
        self.state
            .read()
            .map(|state| state.reviews.get(&(user_id, post_id)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn coupons_enabled(&self) -> bool {
        !self.coupons_disabled
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.unwrap_or_else(|| Local::now().naive_local())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySession {
    redemption: Option<(String, Offer)>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckoutSession for InMemorySession {
    fn redeem_offer(&self) -> Option<&Offer> {
        self.redemption.as_ref().map(|(_, offer)| offer)
    }

    fn redeem_code(&self) -> Option<&str> {
        self.redemption.as_ref().map(|(code, _)| code.as_str())
    }

    fn store_redemption(&mut self, code: String, offer: Offer) {
        self.redemption = Some((code, offer));
    }

    fn clear_redemption(&mut self) {
        self.redemption = None;
    }
}

/// Cart with a line-item count and a coupon list. Codes are stored
/// lower-cased, the way shop carts normalise them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCart {
    pub items: usize,
    coupons: Vec<String>,
}

impl InMemoryCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: usize) -> Self {
        InMemoryCart {
            items,
            coupons: Vec::new(),
        }
    }

    pub fn remove_discount(&mut self, code: &str) {
        self.coupons.retain(|applied| !applied.eq_ignore_ascii_case(code));
    }
}

impl Cart for InMemoryCart {
    fn is_empty(&self) -> bool {
        self.items == 0
    }

    fn applied_coupons(&self) -> Vec<String> {
        self.coupons.clone()
    }

    fn add_discount(&mut self, code: &str) -> bool {
        if code.is_empty() || self.has_discount(code) {
            return false;
        }
        self.coupons.push(code.to_lowercase());
        true
    }
}
