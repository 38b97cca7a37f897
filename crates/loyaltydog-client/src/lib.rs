//! # loyaltydog-client: LoyaltyDog API Client and Shop Integration
//!
//! This crate connects a shop to a LoyaltyDog loyalty program: it talks to
//! the LoyaltyDog REST API, caches what it reads, and turns shop events
//! (orders, reviews, signups, the REDEEM button) into point awards and
//! offer redemptions.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Integration Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 AppContext (built once from config)              │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ LoyaltyActions │  │  CheckoutFlow  │  │  AdminNotices          │    │
//! │  │                │  │                │  │                        │    │
//! │  │ order, review, │  │ REDEEM button, │  │ setup warnings,        │    │
//! │  │ signup events  │  │ cart coupons   │  │ settings errors        │    │
//! │  └───────┬────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │          └─────────┬─────────┘                                         │
//! │                    ▼                                                    │
//! │  ┌────────────────────────────────┐   ┌──────────────────────────┐     │
//! │  │ LoyaltyManager                 │──►│ HostPlatform (users,     │     │
//! │  │ user → customer, award, redeem │   │ orders, reviews, clock)  │     │
//! │  └───────────────┬────────────────┘   └──────────────────────────┘     │
//! │                  ▼                                                      │
//! │  ┌────────────────────────────────┐   ┌──────────────────────────┐     │
//! │  │ LoyaltyApi                     │──►│ CacheStore (memory or    │     │
//! │  │ try_* typed, plain → Option    │   │ redis, TTL per entry)    │     │
//! │  └───────────────┬────────────────┘   └──────────────────────────┘     │
//! │                  ▼                                                      │
//! │  ┌────────────────────────────────┐                                     │
//! │  │ Transport (RestClient/reqwest) │  30 s timeout, TLS verified,        │
//! │  │                                │  no retries                         │
//! │  └────────────────────────────────┘                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Upstream
//! - [`transport`] - HTTP requests and the `Transport` seam
//! - [`api`] - Every LoyaltyDog API operation
//! - [`cache`] - Cache stores and keys
//!
//! ### Shop Integration
//! - [`host`] - What the shop platform provides
//! - [`manager`] - Customer lookup, awards and redemption
//! - [`actions`] - Order, review and signup handlers
//! - [`checkout`] - Cart-side redemption
//! - [`notices`] - Admin notices and settings sanitising
//!
//! ### Ambient
//! - [`config`] - TOML/env configuration
//! - [`context`] - Component wiring
//! - [`error`] - Client error types
//! - [`telemetry`] - Tracing setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use loyaltydog_client::{AppContext, LoyaltyConfig};
//!
//! let config = LoyaltyConfig::load(None)?;
//! loyaltydog_client::telemetry::init_tracing(&config.api);
//!
//! let context = AppContext::from_config(config, Arc::new(my_shop)).await?;
//!
//! // An order moved to "processing"
//! let outcome = context.actions.order_status_changed(order_id, "processing").await;
//! println!("Awarded {} points", outcome.points);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod actions;
pub mod api;
pub mod cache;
pub mod checkout;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod manager;
pub mod notices;
pub mod telemetry;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use actions::{FirstReviewOnly, LoyaltyActions, OrderOutcome, ReviewAwardPolicy, ReviewTrigger};
pub use api::{ApiCaches, LoyaltyApi};
pub use cache::{CacheStore, CustomerKey, MemoryCache, OfferKey};
pub use checkout::{CheckoutFlow, RedeemOutcome};
pub use config::{ApiSettings, CacheSettings, EarnWhen, LoyaltyConfig, MessageSettings, PointsSettings};
pub use context::{AppContext, AppContextBuilder};
pub use error::{ClientError, ClientResult};
pub use host::{Cart, CheckoutSession, HostPlatform, OrderSnapshot, ReviewComment};
pub use manager::LoyaltyManager;
pub use notices::{AdminNotices, Notice, NoticeKind};
pub use transport::{HttpRequest, HttpResponse, RestClient, Transport};

#[cfg(feature = "redis-cache")]
pub use cache::RedisCache;

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;
    use tracing::subscriber::DefaultGuard;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use loyaltydog_core::message::TemplateFormatter;

    use crate::api::{ApiCaches, LoyaltyApi};
    use crate::config::{CacheSettings, LoyaltyConfig, MessageSettings};
    use crate::host::InMemoryHost;
    use crate::manager::LoyaltyManager;
    use crate::transport::MockTransport;

    pub fn test_config() -> LoyaltyConfig {
        let mut config = LoyaltyConfig::default();
        config.api.program_id = "program-1".into();
        config.api.api_key = "secret-key".into();
        config
    }

    pub fn api_with(transport: MockTransport) -> LoyaltyApi {
        let config = test_config();
        LoyaltyApi::new(
            &config.api,
            ApiCaches::in_memory(&CacheSettings::default()),
            Arc::new(transport),
        )
    }

    pub fn manager_with(transport: MockTransport, host: InMemoryHost) -> LoyaltyManager {
        LoyaltyManager::new(
            Arc::new(api_with(transport)),
            Arc::new(host),
            test_config().points.calculator(),
            Arc::new(TemplateFormatter),
            MessageSettings::default(),
        )
    }

    pub fn customer_json(id: u64, email: &str, offer: Option<u64>) -> String {
        json!({
            "id": id,
            "email": email,
            "currentOfferId": offer,
            "customFields": {}
        })
        .to_string()
    }

    pub fn card_json(number_style: &str, value: f64) -> String {
        json!({
            "coupon": {
                "primaryFields": [{"key": "primary", "value": "Save"}],
                "secondaryFields": [{
                    "key": "$maxValue",
                    "value": value,
                    "currencyCode": "USD",
                    "numberStyle": number_style
                }]
            }
        })
        .to_string()
    }

    /// Counts error-level events on the current thread.
    pub struct ErrorCounter(Arc<AtomicUsize>);

    impl ErrorCounter {
        pub fn install() -> (Arc<AtomicUsize>, DefaultGuard) {
            let counter = Arc::new(AtomicUsize::new(0));
            let subscriber = tracing_subscriber::registry().with(ErrorCounter(counter.clone()));
            let guard = tracing::subscriber::set_default(subscriber);
            (counter, guard)
        }
    }

    impl<S: Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub fn count_errors(counter: &Arc<AtomicUsize>) -> usize {
        counter.load(Ordering::SeqCst)
    }
}
