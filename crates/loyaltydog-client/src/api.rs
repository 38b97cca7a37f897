//! # LoyaltyDog API Client
//!
//! Every upstream operation the integration performs.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {api_url}/loyalty/programs/{program_id}/...                            │
//! │                                                                         │
//! │  GET  customers?email={email}                 200  find by email        │
//! │  GET  customers/{id}                          200  customer details     │
//! │  GET  customers                               200  all customers        │
//! │  PUT  customers/{id}                          200  custom fields        │
//! │  GET  offers/{id}/card                        200  offer pass card      │
//! │  POST customers/{id}/points/add  {points}     200  award points         │
//! │  POST customers/{id}/offers/current/redeem    202  redeem active offer  │
//! │                                                                         │
//! │  Header: Authorization: {api_key}  (raw, no scheme)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Faces
//! Each operation exists twice:
//! - `try_*` returns [`ClientResult`] and never logs at error level
//! - the plain method returns `Option` / `bool` and logs exactly one
//!   `error!` event when the operation fails
//!
//! Callers in event handlers use the plain form: a failed upstream call is
//! skipped, never fatal.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use loyaltydog_core::validation::{is_email, normalize_email};
use loyaltydog_core::{Card, Customer, CustomerId, Offer, OfferId, CURRENT_MESSAGE_FIELD};

use crate::cache::{CacheStore, CustomerKey, MemoryCache, OfferKey};
use crate::config::{mask_secret, ApiSettings, CacheSettings};
use crate::error::{ClientError, ClientResult};
use crate::transport::{HttpRequest, Transport};

// =============================================================================
// Caches
// =============================================================================

/// The three stores the API client reads through.
#[derive(Clone)]
pub struct ApiCaches {
    pub customers: Arc<dyn CacheStore<CustomerKey, Customer>>,
    pub email_lookups: Arc<dyn CacheStore<String, Customer>>,
    pub offers: Arc<dyn CacheStore<OfferKey, Offer>>,
    pub customer_ttl: Duration,
    pub offer_ttl: Duration,
}

impl ApiCaches {
    /// Process-local stores with the configured TTLs.
    pub fn in_memory(settings: &CacheSettings) -> Self {
        ApiCaches {
            customers: Arc::new(MemoryCache::new()),
            email_lookups: Arc::new(MemoryCache::new()),
            offers: Arc::new(MemoryCache::new()),
            customer_ttl: settings.customer_ttl(),
            offer_ttl: settings.offer_ttl(),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for one loyalty program.
pub struct LoyaltyApi {
    transport: Arc<dyn Transport>,
    caches: ApiCaches,
    api_url: String,
    program_id: String,
    api_key: String,
    timeout: Duration,
}

impl LoyaltyApi {
    pub fn new(settings: &ApiSettings, caches: ApiCaches, transport: Arc<dyn Transport>) -> Self {
        debug!(
            api_url = %settings.url,
            program_id = %settings.program_id,
            api_key = %mask_secret(&settings.api_key),
            "LoyaltyDog API client configured"
        );

        LoyaltyApi {
            transport,
            caches,
            api_url: settings.url.trim_end_matches('/').to_string(),
            program_id: settings.program_id.clone(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout(),
        }
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/loyalty/programs/{}/{}",
            self.api_url, self.program_id, path
        )
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        request
            .header("Authorization", self.api_key.as_str())
            .with_timeout(self.timeout)
    }

    async fn call(&self, request: HttpRequest, expected: u16) -> ClientResult<String> {
        let response = self.transport.send(self.authorize(request)).await;
        debug!(
            status = response.status,
            elapsed_ms = response.elapsed.as_millis() as u64,
            "LoyaltyDog API responded"
        );
        response.expect_status(expected)
    }

    // =========================================================================
    // Cache helpers (cache failures only degrade to an API call)
    // =========================================================================

    async fn cached_customer(&self, key: &CustomerKey) -> Option<Customer> {
        match self.caches.customers.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "Customer cache read failed");
                None
            }
        }
    }

    async fn remember_customer(&self, customer: &Customer) {
        let ttl = self.caches.customer_ttl;
        let mut keys = vec![CustomerKey::id(customer.id)];
        if !customer.email.is_empty() {
            keys.push(CustomerKey::email(&customer.email));
        }
        for key in keys {
            if let Err(e) = self.caches.customers.set(key, customer.clone(), ttl).await {
                warn!(error = %e, customer_id = customer.id, "Customer cache write failed");
            }
        }
    }

    /// Drops every cached copy of `customer`.
    pub async fn forget_customer(&self, customer: &Customer) {
        let mut keys = vec![CustomerKey::id(customer.id)];
        if !customer.email.is_empty() {
            keys.push(CustomerKey::email(&customer.email));
        }
        for key in &keys {
            if let Err(e) = self.caches.customers.remove(key).await {
                warn!(error = %e, customer_id = customer.id, "Customer cache removal failed");
            }
        }
        if !customer.email.is_empty() {
            let email = normalize_email(&customer.email);
            if let Err(e) = self.caches.email_lookups.remove(&email).await {
                warn!(error = %e, customer_id = customer.id, "Email lookup cache removal failed");
            }
        }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Looks a customer up by email. The match is case-insensitive.
    pub async fn try_find_customer_by_email(&self, email: &str) -> ClientResult<Customer> {
        let email = normalize_email(email);
        debug!(email = %email, "Find customer by email");

        if email.is_empty() {
            return Err(ClientError::NotFound("empty email".into()));
        }

        match self.caches.email_lookups.get(&email).await {
            Ok(Some(customer)) => {
                debug!(customer_id = customer.id, "Got customer from cache");
                return Ok(customer);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Email lookup cache read failed"),
        }

        let encoded: String = url::form_urlencoded::byte_serialize(email.as_bytes()).collect();
        let body = self
            .call(
                HttpRequest::get(self.endpoint(&format!("customers?email={encoded}"))),
                200,
            )
            .await?;

        let customers: Vec<Customer> = serde_json::from_str(&body)?;
        let customer = customers
            .into_iter()
            .find(|c| normalize_email(&c.email) == email)
            .ok_or_else(|| ClientError::NotFound(format!("customer with email {email}")))?;

        debug!(customer_id = customer.id, "Got customer");
        if let Err(e) = self
            .caches
            .email_lookups
            .set(email, customer.clone(), self.caches.customer_ttl)
            .await
        {
            warn!(error = %e, "Email lookup cache write failed");
        }

        Ok(customer)
    }

    pub async fn find_customer_by_email(&self, email: &str) -> Option<Customer> {
        match self.try_find_customer_by_email(email).await {
            Ok(customer) => Some(customer),
            Err(e) => {
                error!(email = %email, error = %e, "Failure to find customer by email");
                None
            }
        }
    }

    /// Customer details by email or numeric id.
    pub async fn try_get_customer_details(&self, email_or_id: &str) -> ClientResult<Customer> {
        let lookup = email_or_id.trim().to_lowercase();
        debug!(lookup = %lookup, "Start get customer details");

        if lookup.is_empty() {
            return Err(ClientError::NotFound("empty customer reference".into()));
        }

        let key = if is_email(&lookup) {
            CustomerKey::email(&lookup)
        } else {
            let id = lookup
                .parse::<CustomerId>()
                .map_err(|_| ClientError::NotFound(format!("invalid customer id '{lookup}'")))?;
            CustomerKey::id(id)
        };

        if let Some(customer) = self.cached_customer(&key).await {
            debug!(customer_id = customer.id, "Got customer details from cache");
            return Ok(customer);
        }

        let customer_id = match key {
            CustomerKey::Email(email) => self.try_find_customer_by_email(&email).await?.id,
            CustomerKey::Id(id) => id,
        };

        self.try_get_customer_details_by_id(customer_id).await
    }

    pub async fn get_customer_details(&self, email_or_id: &str) -> Option<Customer> {
        match self.try_get_customer_details(email_or_id).await {
            Ok(customer) => Some(customer),
            Err(e) => {
                error!(lookup = %email_or_id, error = %e, "Failure to get customer details");
                None
            }
        }
    }

    /// Fetches a customer by id and refreshes both cache entries.
    pub async fn try_get_customer_details_by_id(&self, customer_id: CustomerId) -> ClientResult<Customer> {
        debug!(customer_id, "Start get customer details by id");

        if customer_id == 0 {
            return Err(ClientError::NotFound("empty customer id".into()));
        }

        let body = self
            .call(
                HttpRequest::get(self.endpoint(&format!("customers/{customer_id}"))),
                200,
            )
            .await?;
        let customer: Customer = serde_json::from_str(&body)?;

        debug!(customer_id = customer.id, "Got customer");
        self.remember_customer(&customer).await;
        Ok(customer)
    }

    pub async fn get_customer_details_by_id(&self, customer_id: CustomerId) -> Option<Customer> {
        match self.try_get_customer_details_by_id(customer_id).await {
            Ok(customer) => Some(customer),
            Err(e) => {
                error!(customer_id, error = %e, "Failure to get customer details by id");
                None
            }
        }
    }

    pub async fn try_get_all_customers(&self) -> ClientResult<Vec<Customer>> {
        debug!(program_id = %self.program_id, "Start get all customers");

        let body = self.call(HttpRequest::get(self.endpoint("customers")), 200).await?;
        let customers: Vec<Customer> = serde_json::from_str(&body)?;

        debug!(count = customers.len(), "Got customers");
        Ok(customers)
    }

    pub async fn get_all_customers(&self) -> Option<Vec<Customer>> {
        match self.try_get_all_customers().await {
            Ok(customers) => Some(customers),
            Err(e) => {
                error!(error = %e, "Failure to get all customers");
                None
            }
        }
    }

    /// Writes customer fields and re-caches the returned record.
    pub async fn try_update_custom_details(
        &self,
        customer_id: CustomerId,
        details: &Map<String, Value>,
    ) -> ClientResult<Customer> {
        debug!(customer_id, "Start update customer details");

        if customer_id == 0 || details.is_empty() {
            return Err(ClientError::NotFound("empty customer id or details".into()));
        }

        let body = self
            .call(
                HttpRequest::put(
                    self.endpoint(&format!("customers/{customer_id}")),
                    Value::Object(details.clone()),
                ),
                200,
            )
            .await?;
        let customer: Customer = serde_json::from_str(&body)?;

        self.remember_customer(&customer).await;
        Ok(customer)
    }

    pub async fn update_custom_details(
        &self,
        customer_id: CustomerId,
        details: &Map<String, Value>,
    ) -> Option<Customer> {
        match self.try_update_custom_details(customer_id, details).await {
            Ok(customer) => Some(customer),
            Err(e) => {
                error!(customer_id, error = %e, "Failure to update customer details");
                None
            }
        }
    }

    // =========================================================================
    // Offers
    // =========================================================================

    /// Offer details decoded from the offer's pass card.
    pub async fn try_get_offer_details(&self, offer_id: &OfferId) -> ClientResult<Offer> {
        debug!(program_id = %self.program_id, offer_id = %offer_id, "Start get offer details");

        let key = OfferKey::new(self.program_id.clone(), offer_id.clone());
        match self.caches.offers.get(&key).await {
            Ok(Some(offer)) => {
                debug!(offer_id = %offer_id, "Got offer from cache");
                return Ok(offer);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Offer cache read failed"),
        }

        let body = self
            .call(
                HttpRequest::get(self.endpoint(&format!("offers/{offer_id}/card"))),
                200,
            )
            .await?;
        let card: Card = serde_json::from_str(&body)?;
        let offer = Offer::from_card(offer_id.clone(), &card);

        debug!(offer = ?offer, "Got offer");
        if let Err(e) = self
            .caches
            .offers
            .set(key, offer.clone(), self.caches.offer_ttl)
            .await
        {
            warn!(error = %e, "Offer cache write failed");
        }

        Ok(offer)
    }

    pub async fn get_offer_details(&self, offer_id: &OfferId) -> Option<Offer> {
        match self.try_get_offer_details(offer_id).await {
            Ok(offer) => Some(offer),
            Err(e) => {
                error!(offer_id = %offer_id, error = %e, "Failure to get offer details");
                None
            }
        }
    }

    // =========================================================================
    // Points & Redemption
    // =========================================================================

    pub async fn try_update_points(&self, customer_id: CustomerId, points: i64) -> ClientResult<()> {
        debug!(program_id = %self.program_id, customer_id, points, "Start update points");

        let body = self
            .call(
                HttpRequest::post(
                    self.endpoint(&format!("customers/{customer_id}/points/add")),
                    json!({ "points": points }),
                ),
                200,
            )
            .await?;

        debug!(response = %body, "Update points successful");
        Ok(())
    }

    pub async fn update_points(&self, customer_id: CustomerId, points: i64) -> bool {
        match self.try_update_points(customer_id, points).await {
            Ok(()) => true,
            Err(e) => {
                error!(customer_id, points, error = %e, "Failure to update points");
                false
            }
        }
    }

    /// Redeems the customer's current offer. The API answers 202.
    pub async fn try_redeem_offer(&self, customer_id: CustomerId) -> ClientResult<()> {
        debug!(program_id = %self.program_id, customer_id, "Start redeem offer");

        let body = self
            .call(
                HttpRequest::post(
                    self.endpoint(&format!("customers/{customer_id}/offers/current/redeem")),
                    json!({}),
                ),
                202,
            )
            .await?;

        debug!(response = %body, "Redeem successful");
        Ok(())
    }

    pub async fn redeem_offer(&self, customer_id: CustomerId) -> bool {
        match self.try_redeem_offer(customer_id).await {
            Ok(()) => true,
            Err(e) => {
                error!(customer_id, error = %e, "Failure to redeem offer");
                false
            }
        }
    }

    // =========================================================================
    // Push Notifications
    // =========================================================================

    /// Sets `currentMessage` on every customer who accepts pushed messages.
    ///
    /// Returns true when the program has customers at all; individual
    /// failures are logged and skipped.
    pub async fn push_notifications(&self, message: &str) -> bool {
        debug!(program_id = %self.program_id, message = %message, "Start push notifications");

        if message.is_empty() {
            return false;
        }

        let customers = match self.get_all_customers().await {
            Some(customers) if !customers.is_empty() => customers,
            _ => return false,
        };

        let mut details = Map::new();
        details.insert(CURRENT_MESSAGE_FIELD.to_string(), Value::String(message.to_string()));

        for summary in customers {
            let customer = match self.try_get_customer_details(&summary.id.to_string()).await {
                Ok(customer) => customer,
                Err(e) => {
                    error!(customer_id = summary.id, error = %e, "Failure to load customer for push notification");
                    continue;
                }
            };

            if !customer.accepts_push_messages() {
                debug!(customer_id = customer.id, "Customer opted out of push notifications");
                continue;
            }

            if let Err(e) = self.try_update_custom_details(customer.id, &details).await {
                error!(customer_id = customer.id, error = %e, "Failure to send push notification");
            }
        }

        true
    }
}
