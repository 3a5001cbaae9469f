//! In-memory fetch cache keyed by caller-chosen strings
//!
//! Provides a `FetchCache` that answers a `(key, request, ttl)` lookup from
//! memory while the entry is fresh and goes to the network otherwise.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::transport::{FetchError, FetchRequest, HttpTransport};

/// A stored response body
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Key the entry was stored under
    key: String,
    /// Response body, handed out by copy
    payload: Vec<u8>,
    /// When the body was stored
    stored_at: DateTime<Utc>,
    /// How long the body stays fresh after `stored_at`
    ttl: Duration,
}

impl CacheEntry {
    /// Valid while `now < stored_at + ttl`
    ///
    /// A clock that moved backwards past `stored_at` counts as fresh.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.stored_at).to_std() {
            Ok(elapsed) => elapsed < self.ttl,
            Err(_) => true,
        }
    }
}

/// What to do when a re-fetch fails while a stale entry exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Surface the error; stale data is never returned
    #[default]
    Strict,
    /// Return the stale payload instead of the error
    ServeStaleOnError,
}

/// Counters describing how the cache has been used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from a fresh entry
    pub hits: u64,
    /// Lookups that went to the network
    pub misses: u64,
    /// Network fetches that failed
    pub fetch_failures: u64,
    /// Failed re-fetches answered with a stale payload
    pub stale_served: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetch_failures: AtomicU64,
    stale_served: AtomicU64,
}

/// TTL cache in front of an [`HttpTransport`]
///
/// Construct one per process and share it behind an `Arc`. Each key has its
/// own async lock held across the miss-fetch-store sequence, so concurrent
/// callers for the same key cause a single network request and then all see
/// the stored entry. Expired entries are never purged proactively; they are
/// replaced on the next successful fetch for their key.
#[derive(Debug)]
pub struct FetchCache {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    stale_policy: StalePolicy,
    entries: Mutex<HashMap<String, CacheEntry>>,
    key_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    counters: Counters,
}

impl FetchCache {
    /// Creates an empty cache that fetches through `transport`
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            clock: Arc::new(SystemClock),
            stale_policy: StalePolicy::default(),
            entries: Mutex::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Replaces the time source used for expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the stale-on-error policy
    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    /// Returns the active stale-on-error policy
    pub fn stale_policy(&self) -> StalePolicy {
        self.stale_policy
    }

    /// Fetches `url` with a plain GET, caching the body under `key` for `ttl`
    pub async fn fetch(&self, key: &str, url: &str, ttl: Duration) -> Result<Vec<u8>, FetchError> {
        self.fetch_request(key, &FetchRequest::get(url), ttl).await
    }

    /// Fetches `request`, caching the body under `key` for `ttl`
    ///
    /// # Returns
    /// * `Ok(bytes)` - a copy of the fresh cached body, or of a newly fetched one
    /// * `Err(FetchError)` - the transport failed; nothing was stored
    ///
    /// # Behavior
    /// - A fresh entry is returned without touching the network
    /// - A missing or expired entry triggers exactly one transport call
    /// - On success the body replaces any previous entry for `key`
    /// - On failure the cache is left untouched; with
    ///   [`StalePolicy::ServeStaleOnError`] an existing stale body is returned
    pub async fn fetch_request(
        &self,
        key: &str,
        request: &FetchRequest,
        ttl: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        let key_lock = self.key_lock(key);
        let result = {
            let _guard = key_lock.lock().await;
            self.fetch_locked(key, request, ttl).await
        };
        self.release_key_lock(key, key_lock);
        result
    }

    /// Miss-fetch-store sequence; the caller holds the lock for `key`
    async fn fetch_locked(
        &self,
        key: &str,
        request: &FetchRequest,
        ttl: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        let now = self.clock.now();
        let stale = {
            let entries = self.entries();
            match entries.get(key) {
                Some(entry) if entry.is_fresh(now) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "cache hit");
                    return Ok(entry.payload.clone());
                }
                Some(entry) => (self.stale_policy == StalePolicy::ServeStaleOnError)
                    .then(|| entry.payload.clone()),
                None => None,
            }
        };

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, url = %request.url, "cache miss, fetching");

        match self.transport.execute(request).await {
            Ok(body) => {
                let entry = CacheEntry {
                    key: key.to_string(),
                    payload: body.clone(),
                    stored_at: self.clock.now(),
                    ttl,
                };
                self.entries().insert(entry.key.clone(), entry);
                Ok(body)
            }
            Err(err) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                match (self.stale_policy, stale) {
                    (StalePolicy::ServeStaleOnError, Some(payload)) => {
                        self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                        warn!(key, error = %err, "fetch failed, serving stale entry");
                        Ok(payload)
                    }
                    _ => {
                        warn!(key, error = %err, "fetch failed");
                        Err(err)
                    }
                }
            }
        }
    }

    /// Number of stored entries, fresh or stale
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns true if nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Returns true if `key` holds an entry that is fresh right now
    pub fn contains_fresh(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries()
            .get(key)
            .is_some_and(|entry| entry.is_fresh(now))
    }

    /// Drops the entry for `key` so the next fetch goes to the network
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries().remove(key).is_some();
        self.prune_key_lock(key);
        removed
    }

    /// Drops every entry
    pub fn clear(&self) {
        self.entries().clear();
        self.key_locks().retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Snapshot of the usage counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Relaxed),
            stale_served: self.counters.stale_served.load(Ordering::Relaxed),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.key_locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock for `key`; clones are only taken while the map is locked
    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.key_locks().entry(key.to_string()).or_default().clone()
    }

    /// Drops the caller's handle and forgets the lock once nobody else holds it
    fn release_key_lock(&self, key: &str, lock: Arc<AsyncMutex<()>>) {
        drop(lock);
        self.prune_key_lock(key);
    }

    /// Removes the lock for `key` if only the map still references it
    fn prune_key_lock(&self, key: &str) {
        let mut locks = self.key_locks();
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }
}
