//! # Application Context
//!
//! Builds every long-lived component once, from configuration, and hands
//! them out as `Arc`s. Nothing in the crate reaches for a global.
//!
//! ```text
//! LoyaltyConfig ──► RestClient ─┐
//!               ──► ApiCaches ──┼──► LoyaltyApi ──► LoyaltyManager ──┬──► LoyaltyActions
//!               ──► calculator ─┘         ▲          ▲               └──► CheckoutFlow
//!                   formatter ────────────┼──────────┘
//!                   HostPlatform ─────────┘
//! ```

use std::sync::Arc;
use tracing::info;

use loyaltydog_core::message::{OfferMessageFormatter, TemplateFormatter};
use loyaltydog_core::points::PointsPostProcessor;

use crate::actions::{LoyaltyActions, ReviewAwardPolicy};
use crate::api::{ApiCaches, LoyaltyApi};
use crate::checkout::CheckoutFlow;
use crate::config::{CacheSettings, LoyaltyConfig};
use crate::error::ClientResult;
use crate::host::HostPlatform;
use crate::manager::LoyaltyManager;
use crate::notices::AdminNotices;
use crate::transport::{RestClient, Transport};

/// The wired-up integration.
pub struct AppContext {
    pub config: LoyaltyConfig,
    pub api: Arc<LoyaltyApi>,
    pub manager: Arc<LoyaltyManager>,
    pub actions: Arc<LoyaltyActions>,
    pub checkout: Arc<CheckoutFlow>,
    pub notices: Arc<AdminNotices>,
}

impl AppContext {
    /// Production wiring: reqwest transport and the configured cache store.
    pub async fn from_config(config: LoyaltyConfig, host: Arc<dyn HostPlatform>) -> ClientResult<Self> {
        AppContext::builder(config).build(host).await
    }

    pub fn builder(config: LoyaltyConfig) -> AppContextBuilder {
        AppContextBuilder {
            config,
            transport: None,
            caches: None,
            post_processor: None,
            formatter: Arc::new(TemplateFormatter),
            review_policy: None,
        }
    }
}

/// Overrides for the seams the host may customise.
pub struct AppContextBuilder {
    config: LoyaltyConfig,
    transport: Option<Arc<dyn Transport>>,
    caches: Option<ApiCaches>,
    post_processor: Option<Arc<dyn PointsPostProcessor>>,
    formatter: Arc<dyn OfferMessageFormatter>,
    review_policy: Option<Arc<dyn ReviewAwardPolicy>>,
}

impl AppContextBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn caches(mut self, caches: ApiCaches) -> Self {
        self.caches = Some(caches);
        self
    }

    /// Adjusts calculated purchase points.
    pub fn post_processor(mut self, processor: Arc<dyn PointsPostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    pub fn formatter(mut self, formatter: Arc<dyn OfferMessageFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn review_policy(mut self, policy: Arc<dyn ReviewAwardPolicy>) -> Self {
        self.review_policy = Some(policy);
        self
    }

    pub async fn build(self, host: Arc<dyn HostPlatform>) -> ClientResult<AppContext> {
        let config = self.config;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(RestClient::new(&config.api)?),
        };

        let caches = match self.caches {
            Some(caches) => caches,
            None => build_caches(&config.cache, &config.api.program_id).await?,
        };

        let api = Arc::new(LoyaltyApi::new(&config.api, caches, transport));

        let mut calculator = config.points.calculator();
        if let Some(processor) = self.post_processor {
            calculator = calculator.with_post_processor(processor);
        }

        let manager = Arc::new(LoyaltyManager::new(
            api.clone(),
            host,
            calculator,
            self.formatter,
            config.messages.clone(),
        ));

        let mut actions = LoyaltyActions::new(manager.clone(), &config.points);
        if let Some(policy) = self.review_policy {
            actions = actions.with_review_policy(policy);
        }

        info!(
            program_id = %config.api.program_id,
            earn_when = %config.points.earn_when,
            ratio = %config.points.ratio,
            "LoyaltyDog integration ready"
        );

        Ok(AppContext {
            api,
            checkout: Arc::new(CheckoutFlow::new(manager.clone())),
            actions: Arc::new(actions),
            manager,
            notices: Arc::new(AdminNotices::new()),
            config,
        })
    }
}

#[cfg(feature = "redis-cache")]
async fn build_caches(settings: &CacheSettings, program_id: &str) -> ClientResult<ApiCaches> {
    use crate::cache::RedisCache;

    let Some(redis_url) = settings.redis_url.as_deref() else {
        return Ok(ApiCaches::in_memory(settings));
    };

    let namespace = format!("loyaltydog:{program_id}");
    let customers = RedisCache::connect(redis_url, namespace.clone()).await?;
    Ok(ApiCaches {
        email_lookups: Arc::new(RedisCache::with_connection(customers.connection(), format!("{namespace}:lookup"))),
        offers: Arc::new(RedisCache::with_connection(customers.connection(), namespace)),
        customers: Arc::new(customers),
        customer_ttl: settings.customer_ttl(),
        offer_ttl: settings.offer_ttl(),
    })
}

#[cfg(not(feature = "redis-cache"))]
async fn build_caches(settings: &CacheSettings, _program_id: &str) -> ClientResult<ApiCaches> {
    if settings.redis_url.is_some() {
        tracing::warn!("redis_url is set but the redis-cache feature is disabled, using the in-process cache");
    }
    Ok(ApiCaches::in_memory(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{InMemoryHost, OrderSnapshot};
    use crate::test_support::{customer_json, test_config};
    use crate::transport::{HttpRequest, HttpResponse, MockTransport};
    use loyaltydog_core::Money;
    use mockall::predicate::function;
    use serde_json::json;

    #[tokio::test]
    async fn test_from_config_uses_verified_tls_transport() {
        let context = AppContext::from_config(test_config(), Arc::new(InMemoryHost::new()))
            .await
            .unwrap();
        assert_eq!(context.api.program_id(), "program-1");
        assert!(context.notices.drain().is_empty());
    }

    #[tokio::test]
    async fn test_post_processor_reaches_order_awards() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.contains("customers?email=")))
            .returning(|_| HttpResponse::new(200, format!("[{}]", customer_json(12, "jane@example.com", None))));
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| req.url.ends_with("/customers/12")))
            .returning(|_| HttpResponse::new(200, customer_json(12, "jane@example.com", None)));
        transport
            .expect_send()
            .with(function(|req: &HttpRequest| {
                req.url.ends_with("/points/add") && req.payload == Some(json!({"points": 20}))
            }))
            .times(1)
            .returning(|_| HttpResponse::new(200, "{}"));

        let host = InMemoryHost::new()
            .with_user(3, "jane@example.com")
            .with_order(OrderSnapshot {
                id: 1,
                customer_id: 3,
                total: Money::from_cents(1000),
                coupon_codes: vec![],
            });

        let double = |points: i64, _amount: Money| points * 2;
        let context = AppContext::builder(test_config())
            .transport(Arc::new(transport))
            .post_processor(Arc::new(double))
            .build(Arc::new(host))
            .await
            .unwrap();

        let outcome = context.actions.order_completed(1).await;
        assert_eq!(outcome.points, 20);
        assert!(outcome.awarded);
    }
}
