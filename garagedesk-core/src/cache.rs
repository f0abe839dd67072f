use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::AppError;

/// Cache keys for the aggregate reads backed by this cache.
///
/// Every mutation that changes the data behind a key must invalidate it
/// synchronously before returning success.
pub mod keys {
    /// Dashboard revenue/low-stock summary
    pub const DASHBOARD_SUMMARY: &str = "dashboard:summary";

    /// Full inventory listing
    pub const INVENTORY_LIST: &str = "inventory:list";
}

/// Read-through response cache for expensive aggregate reads.
///
/// Strictly an optimization: implementations must never let a cache failure
/// surface to the caller. A disabled cache is a first-class configuration
/// (`NoopCache`), interchangeable with a real one without touching core logic.
pub trait ResponseCache: Send + Sync {
    /// Returns the cached value for `key` if present and not expired.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key` for at most `ttl`.
    fn set(&self, key: &str, value: Value, ttl: Duration);

    /// Drops the entry for `key`, if any.
    fn invalidate(&self, key: &str);
}

/// Read-through helper: serves `key` from the cache, or computes, stores and
/// returns the value. Errors from `compute` propagate; cache trouble does not.
pub async fn get_or_compute<F, Fut>(
    cache: &dyn ResponseCache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<Value, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, AppError>>,
{
    if let Some(hit) = cache.get(key) {
        debug!("Cache hit for {}", key);
        return Ok(hit);
    }

    let value = compute().await?;
    cache.set(key, value.clone(), ttl);
    Ok(value)
}

/// In-process cache: a mutex-guarded map with per-entry expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the map, treating a poisoned lock as still-usable: losing the
    /// cache must never take the operation down with it.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Value, Instant)>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Cache mutex poisoned; continuing with recovered state");
            poisoned.into_inner()
        })
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            Some(_) => {
                // Expired; drop lazily on read.
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }
}

/// Disabled-cache configuration: every read misses, every write is dropped.
pub struct NoopCache;

impl ResponseCache for NoopCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value, _ttl: Duration) {}

    fn invalidate(&self, _key: &str) {}
}
