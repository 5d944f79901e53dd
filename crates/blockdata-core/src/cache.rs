//! Fingerprint-keyed cache store using moka
//!
//! Entries are partitioned by [`CacheScope`] and carry their own
//! time-to-live; a TTL of `None` keeps the entry until it is evicted or
//! deleted.

use crate::collaborators::CacheStore;
use crate::error::ExtractResult;
use moka::sync::Cache;
use moka::Expiry;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Partition a cache entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// Shared by the whole deployment
    Global,
    /// Private to one site of a multi-tenant deployment
    Site(u64),
}

impl std::fmt::Display for CacheScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Site(id) => write!(f, "site:{id}"),
        }
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache (approximate)
    pub entry_count: u64,
}

#[derive(Debug, Clone)]
struct StoredPayload {
    value: Arc<Value>,
    ttl: Option<Duration>,
}

struct PayloadExpiry;

impl Expiry<(CacheScope, String), StoredPayload> for PayloadExpiry {
    fn expire_after_create(
        &self,
        _key: &(CacheScope, String),
        value: &StoredPayload,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &(CacheScope, String),
        value: &StoredPayload,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-process [`CacheStore`] backed by a bounded moka cache
#[derive(Clone)]
pub struct MokaCacheStore {
    inner: Cache<(CacheScope, String), StoredPayload>,
}

impl MokaCacheStore {
    /// Create store with max capacity
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PayloadExpiry)
                .build(),
        }
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for MokaCacheStore {
    /// Create store with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl std::fmt::Debug for MokaCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheStore")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

impl CacheStore for MokaCacheStore {
    fn get(&self, scope: CacheScope, key: &str) -> ExtractResult<Option<Value>> {
        Ok(self
            .inner
            .get(&(scope, key.to_string()))
            .map(|payload| Value::clone(&payload.value)))
    }

    fn set(
        &self,
        scope: CacheScope,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> ExtractResult<()> {
        let payload = StoredPayload {
            value: Arc::new(value),
            ttl,
        };
        self.inner.insert((scope, key.to_string()), payload);
        Ok(())
    }

    fn delete(&self, scope: CacheScope, key: &str) -> ExtractResult<bool> {
        Ok(self.inner.remove(&(scope, key.to_string())).is_some())
    }
}
