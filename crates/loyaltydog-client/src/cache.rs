//! # Cache Stores
//!
//! Short-lived caching of upstream records so a single page view does not
//! hit the API once per hook.
//!
//! ## What Is Cached
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cache             Key                         Value      TTL           │
//! │  ───────────────   ─────────────────────────   ────────   ──────        │
//! │  customer details  CustomerKey::Email(lower)   Customer   30 s          │
//! │                    CustomerKey::Id(id)                                  │
//! │  email lookup      normalised email            Customer   30 s          │
//! │  offer details     OfferKey(program, offer)    Offer      3600 s        │
//! │                                                                         │
//! │  Entries expire; nothing is evicted for size. Concurrent writers may    │
//! │  race, the last write wins.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two stores implement [`CacheStore`]: [`MemoryCache`] (per process,
//! default) and `RedisCache` (feature `redis-cache`, shared between
//! workers).

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use loyaltydog_core::validation::normalize_email;
use loyaltydog_core::{CustomerId, OfferId};

use crate::error::ClientResult;

// =============================================================================
// Keys
// =============================================================================

/// Flat string form of a key, used by external stores.
pub trait CacheKey {
    fn cache_key(&self) -> String;
}

impl CacheKey for String {
    fn cache_key(&self) -> String {
        self.clone()
    }
}

/// Customer details are cached under both the email and the upstream id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CustomerKey {
    Email(String),
    Id(CustomerId),
}

impl CustomerKey {
    /// Email key, normalised so differently-cased inputs share an entry.
    pub fn email(email: &str) -> Self {
        CustomerKey::Email(normalize_email(email))
    }

    pub fn id(id: CustomerId) -> Self {
        CustomerKey::Id(id)
    }
}

impl CacheKey for CustomerKey {
    fn cache_key(&self) -> String {
        match self {
            CustomerKey::Email(email) => format!("customer:email:{email}"),
            CustomerKey::Id(id) => format!("customer:id:{id}"),
        }
    }
}

/// Offers are scoped by program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OfferKey {
    pub program_id: String,
    pub offer_id: OfferId,
}

impl OfferKey {
    pub fn new(program_id: impl Into<String>, offer_id: OfferId) -> Self {
        OfferKey {
            program_id: program_id.into(),
            offer_id,
        }
    }
}

impl CacheKey for OfferKey {
    fn cache_key(&self) -> String {
        format!("offer:{}:{}", self.program_id, self.offer_id)
    }
}

// =============================================================================
// Store Trait
// =============================================================================

/// Typed key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Returns the live entry for `key`, if any.
    async fn get(&self, key: &K) -> ClientResult<Option<V>>;

    /// Stores `value` for `ttl`, replacing any previous entry.
    async fn set(&self, key: K, value: V, ttl: Duration) -> ClientResult<()>;

    async fn remove(&self, key: &K) -> ClientResult<()>;
}

// =============================================================================
// In-Memory Store
// =============================================================================

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Process-local store. Uses the tokio clock, so tests can pause and
/// advance time to exercise expiry.
pub struct MemoryCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        MemoryCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries, expired ones included until next access.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for MemoryCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache").finish_non_exhaustive()
    }
}

#[async_trait]
impl<K, V> CacheStore<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> ClientResult<Option<V>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: K, value: V, ttl: Duration) -> ClientResult<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key, Entry { value, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &K) -> ClientResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// Redis Store
// =============================================================================

#[cfg(feature = "redis-cache")]
pub use redis_store::RedisCache;

#[cfg(feature = "redis-cache")]
mod redis_store {
    use super::*;
    use redis::aio::ConnectionManager;
    use redis::AsyncCommands;
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use std::marker::PhantomData;
    use tracing::info;

    /// Shared store; values are JSON, expiry is Redis' own `SETEX`.
    pub struct RedisCache<K, V> {
        conn: ConnectionManager,
        namespace: String,
        _marker: PhantomData<fn() -> (K, V)>,
    }

    impl<K, V> Clone for RedisCache<K, V> {
        fn clone(&self) -> Self {
            RedisCache {
                conn: self.conn.clone(),
                namespace: self.namespace.clone(),
                _marker: PhantomData,
            }
        }
    }

    impl<K, V> RedisCache<K, V> {
        pub async fn connect(redis_url: &str, namespace: impl Into<String>) -> ClientResult<Self> {
            let client = redis::Client::open(redis_url)?;
            let conn = ConnectionManager::new(client).await?;
            let namespace = namespace.into();
            info!(namespace = %namespace, "Connected to Redis cache");
            Ok(Self::with_connection(conn, namespace))
        }

        pub fn with_connection(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
            RedisCache {
                conn,
                namespace: namespace.into(),
                _marker: PhantomData,
            }
        }

        /// Handle to the shared connection, for building sibling stores.
        pub fn connection(&self) -> ConnectionManager {
            self.conn.clone()
        }

        fn redis_key(&self, key: &impl CacheKey) -> String {
            format!("{}:{}", self.namespace, key.cache_key())
        }
    }

    #[async_trait]
    impl<K, V> CacheStore<K, V> for RedisCache<K, V>
    where
        K: CacheKey + Send + Sync + 'static,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        async fn get(&self, key: &K) -> ClientResult<Option<V>> {
            let mut conn = self.conn.clone();
            let raw: Option<String> = conn.get(self.redis_key(key)).await?;
            match raw {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        }

        async fn set(&self, key: K, value: V, ttl: Duration) -> ClientResult<()> {
            let mut conn = self.conn.clone();
            let json = serde_json::to_string(&value)?;
            let seconds = ttl.as_secs().max(1);
            let _: () = conn.set_ex(self.redis_key(&key), json, seconds).await?;
            Ok(())
        }

        async fn remove(&self, key: &K) -> ClientResult<()> {
            let mut conn = self.conn.clone();
            let _: () = conn.del(self.redis_key(key)).await?;
            Ok(())
        }
    }
}
