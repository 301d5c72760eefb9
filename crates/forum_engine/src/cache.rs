use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use forum_core::{ListingPage, ThreadPage};
use forum_logging::forum_trace;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use crate::FetchedDocument;

/// Millisecond time source for cache timestamps.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A cached value and when it was stored. Entries are replaced, never mutated.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub value: Arc<T>,
    pub stored_at: u64,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            stored_at: self.stored_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Capacity-bounded LRU cache keyed by request URL, with staleness judged
/// against an injected clock.
pub struct StalenessCache<T> {
    name: &'static str,
    entries: Cache<String, CacheEntry<T>>,
    clock: Arc<dyn Clock>,
    window: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> fmt::Debug for StalenessCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StalenessCache")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl<T: Send + Sync + 'static> StalenessCache<T> {
    pub fn new(name: &'static str, capacity: u64, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self {
            name,
            entries,
            clock,
            window,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let found = self.entries.get(key);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            forum_trace!("{} cache hit for {key}", self.name);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            forum_trace!("{} cache miss for {key}", self.name);
        }
        found
    }

    pub fn put(&self, key: impl Into<String>, value: T) -> CacheEntry<T> {
        self.put_shared(key, Arc::new(value))
    }

    pub fn put_shared(&self, key: impl Into<String>, value: Arc<T>) -> CacheEntry<T> {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now_millis(),
        };
        self.entries.insert(key.into(), entry.clone());
        entry
    }

    /// Whether `entry` is older than `window` by this cache's clock.
    pub fn is_stale(&self, entry: &CacheEntry<T>, window: Duration) -> bool {
        let age = self.clock.now_millis().saturating_sub(entry.stored_at);
        u128::from(age) >= window.as_millis()
    }

    /// [`Self::is_stale`] against this cache's own window.
    pub fn is_expired(&self, entry: &CacheEntry<T>) -> bool {
        self.is_stale(entry, self.window)
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.invalidate(key);
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.entry_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub listing_capacity: u64,
    pub thread_capacity: u64,
    pub raw_capacity: u64,
    pub listing_window: Duration,
    pub thread_window: Duration,
    pub raw_window: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            listing_capacity: 20,
            thread_capacity: 20,
            raw_capacity: 16,
            listing_window: Duration::from_secs(45),
            thread_window: Duration::from_secs(60),
            raw_window: Duration::from_secs(60),
        }
    }
}

/// The parsed-result caches and the raw document cache, sharing one clock.
#[derive(Debug)]
pub struct ForumCaches {
    pub listings: StalenessCache<ListingPage>,
    pub threads: StalenessCache<ThreadPage>,
    pub raw: StalenessCache<FetchedDocument>,
}

impl ForumCaches {
    pub fn new(settings: &CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            listings: StalenessCache::new(
                "listing",
                settings.listing_capacity,
                settings.listing_window,
                clock.clone(),
            ),
            threads: StalenessCache::new(
                "thread",
                settings.thread_capacity,
                settings.thread_window,
                clock.clone(),
            ),
            raw: StalenessCache::new("raw", settings.raw_capacity, settings.raw_window, clock),
        }
    }
}
