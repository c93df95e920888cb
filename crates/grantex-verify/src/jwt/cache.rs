//! Caching decorator for key resolvers
//!
//! [`CachingKeyResolver`] wraps any [`KeyResolver`] and keeps the fetched
//! key-set document per URI:
//!
//! - **TTL**: a document is served until its TTL lapses, never afterwards.
//!   A failed fetch is reported as-is; no stale document is substituted.
//! - **Refresh on unknown `kid`**: when the token names a `kid` the cached set
//!   does not publish, the set is re-fetched before falling back to the first
//!   RSA key. Such refreshes are spaced by `min_refresh_interval`.
//! - **Single flight**: each URI has its own fetch lock, so concurrent
//!   misses produce one upstream request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::jwks::{KeyResolver, KeySet, RsaPublicKey, select_key};
use crate::config::CacheConfig;
use crate::error::KeyResolutionError;

#[derive(Debug, Clone)]
struct CachedKeySet {
    key_set: Arc<KeySet>,
    fetched_at: Instant,
}

impl CachedKeySet {
    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Cache state for one key-set URI
#[derive(Debug, Default)]
struct CacheSlot {
    entry: RwLock<Option<CachedKeySet>>,
    fetch_lock: Mutex<()>,
}

/// Why a slot needs a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refresh {
    /// Nothing cached, or the TTL lapsed
    Stale,
    /// The cached set does not publish the requested `kid`
    UnknownKid,
}

/// [`KeyResolver`] decorator that caches key sets per URI
///
/// # Example
///
/// ```rust
/// use grantex_verify::jwt::{CachingKeyResolver, JwksResolver};
/// use grantex_verify::{CacheConfig, GrantVerifier};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = CachingKeyResolver::with_config(JwksResolver::new()?, CacheConfig::default());
/// let verifier = GrantVerifier::with_resolver(resolver);
/// # let _ = verifier;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CachingKeyResolver<R> {
    inner: R,
    config: CacheConfig,
    slots: DashMap<String, Arc<CacheSlot>>,
}

impl<R: KeyResolver> CachingKeyResolver<R> {
    /// Wrap `inner` with the default TTL (10 minutes)
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, CacheConfig::default())
    }

    /// Wrap `inner` with custom cache settings
    pub fn with_config(inner: R, config: CacheConfig) -> Self {
        Self {
            inner,
            config,
            slots: DashMap::new(),
        }
    }

    /// The wrapped resolver
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Drop every cached key set
    pub fn clear(&self) {
        self.slots.clear();
        debug!("JWKS cache cleared");
    }

    /// Drop the cached key set for one URI
    pub fn invalidate(&self, jwks_uri: &str) {
        self.slots.remove(jwks_uri);
    }

    fn slot(&self, jwks_uri: &str) -> Arc<CacheSlot> {
        if let Some(slot) = self.slots.get(jwks_uri) {
            return Arc::clone(&slot);
        }
        Arc::clone(&self.slots.entry(jwks_uri.to_string()).or_default())
    }

    /// Serve `kid` from `cached`, or say why a fetch is needed
    fn lookup(
        &self,
        cached: Option<&CachedKeySet>,
        kid: Option<&str>,
    ) -> Result<Arc<KeySet>, Refresh> {
        let cached = cached.ok_or(Refresh::Stale)?;
        let age = cached.age();
        if age >= self.config.ttl {
            return Err(Refresh::Stale);
        }
        if let Some(kid) = kid
            && !cached.key_set.contains_kid(kid)
            && age >= self.config.min_refresh_interval
        {
            return Err(Refresh::UnknownKid);
        }
        Ok(Arc::clone(&cached.key_set))
    }

    async fn key_set(
        &self,
        jwks_uri: &str,
        kid: Option<&str>,
    ) -> Result<Arc<KeySet>, KeyResolutionError> {
        let slot = self.slot(jwks_uri);

        if let Ok(key_set) = self.lookup(slot.entry.read().await.as_ref(), kid) {
            debug!(jwks_uri = %jwks_uri, "Using cached JWKS");
            return Ok(key_set);
        }

        let _in_flight = slot.fetch_lock.lock().await;

        // Another task may have fetched while we waited for the lock
        match self.lookup(slot.entry.read().await.as_ref(), kid) {
            Ok(key_set) => return Ok(key_set),
            Err(reason) => debug!(jwks_uri = %jwks_uri, reason = ?reason, "Fetching JWKS"),
        }

        let key_set = Arc::new(self.inner.fetch_key_set(jwks_uri).await?);
        *slot.entry.write().await = Some(CachedKeySet {
            key_set: Arc::clone(&key_set),
            fetched_at: Instant::now(),
        });
        Ok(key_set)
    }
}

#[async_trait]
impl<R: KeyResolver> KeyResolver for CachingKeyResolver<R> {
    async fn fetch_key_set(&self, jwks_uri: &str) -> Result<KeySet, KeyResolutionError> {
        Ok(self.key_set(jwks_uri, None).await?.as_ref().clone())
    }

    async fn resolve(
        &self,
        jwks_uri: &str,
        kid: Option<&str>,
    ) -> Result<RsaPublicKey, KeyResolutionError> {
        let key_set = self.key_set(jwks_uri, kid).await?;
        RsaPublicKey::from_jwk(select_key(&key_set, kid)?)
    }
}
