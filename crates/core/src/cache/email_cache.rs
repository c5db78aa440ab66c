//! Session-wide page cache: store, memory-driven sizing and prefetch worker.
//!
//! One [`EmailCache`] is created per session and shared by `Arc`. Store
//! operations are synchronous and never hold a lock across an `.await`. An
//! on-demand fetch and a prefetch may race to fill the same key; both compute
//! the same page, so whichever write lands last wins.

use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::key::CacheKey;
use super::memory::{MemoryPressure, MemoryProbe, SizingPolicy};
use super::page::MailboxPage;
use super::prefetch::{FollowUp, PrefetchFetcher, PrefetchScheduler, QueuedPrefetch};
use super::store::CacheStore;

/// Sizing, expiry and scheduling knobs for an [`EmailCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub max_cache_size: usize,
    pub medium_pressure_cache_size: usize,
    pub high_pressure_cache_size: usize,
    pub ttl: Duration,
    pub memory_check_interval: Duration,
    pub prefetch_delay: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_cache_size: 10,
            medium_pressure_cache_size: 5,
            high_pressure_cache_size: 2,
            ttl: Duration::from_secs(5 * 60),
            memory_check_interval: Duration::from_secs(30),
            prefetch_delay: Duration::from_millis(500),
        }
    }
}

impl CacheSettings {
    fn sizing(&self) -> SizingPolicy {
        SizingPolicy {
            low: self.max_cache_size,
            medium: self.medium_pressure_cache_size,
            high: self.high_pressure_cache_size,
        }
    }
}

/// LRU/TTL page cache with memory-pressure resizing and single-flight prefetching.
pub struct EmailCache {
    store: Mutex<CacheStore>,
    prefetch: PrefetchScheduler,
    probe: Arc<dyn MemoryProbe>,
    sizing: SizingPolicy,
    memory_status: Mutex<MemoryPressure>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl EmailCache {
    /// Create a cache and, inside a Tokio runtime, start memory monitoring.
    pub fn new(settings: CacheSettings, probe: Arc<dyn MemoryProbe>) -> Arc<Self> {
        let cache = Arc::new(Self {
            store: Mutex::new(CacheStore::new(settings.max_cache_size, settings.ttl)),
            prefetch: PrefetchScheduler::new(settings.prefetch_delay),
            probe,
            sizing: settings.sizing(),
            memory_status: Mutex::new(MemoryPressure::Low),
            monitor: Mutex::new(None),
        });
        cache.start_memory_monitoring(settings.memory_check_interval);
        cache
    }

    /// Fresh page for `key`, promoted to most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<MailboxPage>> {
        let page = self.store.lock().get(key);
        tracing::debug!(key = %key, hit = page.is_some(), "cache lookup");
        page
    }

    pub fn set(&self, key: CacheKey, page: impl Into<Arc<MailboxPage>>) {
        self.store.lock().set(key, page.into());
    }

    /// Drop one page, or every page when `key` is `None`.
    pub fn clear(&self, key: Option<&CacheKey>) {
        self.store.lock().clear(key);
        match key {
            Some(key) => tracing::debug!(key = %key, "cache entry cleared"),
            None => tracing::debug!("cache cleared"),
        }
    }

    pub fn key_for_token(&self, token: &str) -> Option<CacheKey> {
        self.store.lock().key_for_token(token)
    }

    pub fn next_page_key(&self, key: &CacheKey) -> Option<CacheKey> {
        self.store.lock().next_page_key(key)
    }

    /// Drop every page inserted before `cutoff`.
    pub fn invalidate_older_than(&self, cutoff: Instant) -> usize {
        let removed = self.store.lock().invalidate_older_than(cutoff);
        tracing::debug!(removed, "invalidated stale pages");
        removed
    }

    /// Number of cached pages.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn max_cache_size(&self) -> usize {
        self.store.lock().max_size()
    }

    /// Pressure level as of the last sample.
    pub fn memory_status(&self) -> MemoryPressure {
        *self.memory_status.lock()
    }

    /// Number of prefetches waiting behind the in-flight one.
    pub fn pending_prefetches(&self) -> usize {
        self.prefetch.pending()
    }

    /// Register the function the prefetch worker uses to load pages.
    pub fn set_prefetch_callback(&self, fetcher: Arc<dyn PrefetchFetcher>) {
        self.prefetch.set_fetcher(fetcher);
    }

    /// Ask for `key` to be loaded in the background.
    ///
    /// No-op if `key` is already a fresh hit. Higher `priority` drains first.
    /// Must be called from within a Tokio runtime for the worker to start;
    /// otherwise the key stays queued until the next call that is.
    pub fn queue_for_prefetch(self: &Arc<Self>, key: CacheKey, priority: i32) {
        self.enqueue(key, priority, None);
    }

    /// Like [`queue_for_prefetch`](Self::queue_for_prefetch), and once `key` is
    /// cached, queue the page after it at `lookahead_priority`, no sooner than
    /// `delay` from now.
    pub fn queue_with_lookahead(self: &Arc<Self>, key: CacheKey, priority: i32, lookahead_priority: i32, delay: Duration) {
        let follow_up = FollowUp { priority: lookahead_priority, not_before: Instant::now() + delay };
        self.enqueue(key, priority, Some(follow_up));
    }

    fn enqueue(self: &Arc<Self>, key: CacheKey, priority: i32, follow_up: Option<FollowUp>) {
        let cached = self.store.lock().contains_fresh(&key);
        if cached {
            if let Some(follow_up) = follow_up {
                self.queue_follow_up(&key, follow_up);
            }
            return;
        }

        if self.prefetch.enqueue(key, priority, follow_up) {
            tracing::debug!(priority, pending = self.prefetch.pending(), "queued page for prefetch");
        }
        self.process_prefetch_queue();
    }

    fn queue_follow_up(self: &Arc<Self>, key: &CacheKey, follow_up: FollowUp) {
        let Some(after) = self.next_page_key(key) else {
            return;
        };

        let runtime = match Handle::try_current() {
            Ok(runtime) if Instant::now() < follow_up.not_before => runtime,
            _ => {
                self.queue_for_prefetch(after, follow_up.priority);
                return;
            }
        };

        let cache = Arc::clone(self);
        runtime.spawn(async move {
            tokio::time::sleep_until(follow_up.not_before).await;
            cache.queue_for_prefetch(after, follow_up.priority);
        });
    }

    fn process_prefetch_queue(self: &Arc<Self>) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("no runtime available; prefetch stays queued");
            return;
        };
        let Some(item) = self.prefetch.try_begin() else {
            return;
        };

        let slot = PrefetchSlot(Arc::clone(self));
        runtime.spawn(async move {
            let cache = Arc::clone(&slot.0);
            if cache.run_prefetch(&item).await
                && let Some(follow_up) = item.follow_up
            {
                cache.queue_follow_up(&item.key, follow_up);
            }
            drop(slot);

            if cache.pending_prefetches() > 0 {
                tokio::time::sleep(cache.prefetch.delay()).await;
                cache.process_prefetch_queue();
            }
        });
    }

    /// Returns whether the page for `item` is cached afterwards.
    async fn run_prefetch(&self, item: &QueuedPrefetch) -> bool {
        let cached = self.store.lock().contains_fresh(&item.key);
        if cached {
            tracing::debug!(key = %item.encoded, "skipping prefetch of cached page");
            return true;
        }

        let Some(fetcher) = self.prefetch.fetcher() else {
            tracing::debug!(key = %item.encoded, "no prefetch callback registered");
            return false;
        };

        match fetcher.fetch_page(&item.key).await {
            Ok(Some(page)) => {
                tracing::debug!(key = %item.encoded, emails = page.emails.len(), "prefetched page");
                self.set(item.key.clone(), page);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(key = %item.encoded, error = %e, "prefetch failed");
                false
            }
        }
    }

    /// Sample memory once and resize the store if the level changed.
    pub fn check_memory_pressure(&self) -> MemoryPressure {
        let status = MemoryPressure::from_ratio(self.probe.usage_ratio());

        let mut last = self.memory_status.lock();
        if status != *last {
            let ceiling = self.sizing.ceiling(status);
            let mut store = self.store.lock();
            store.set_max_size(ceiling);
            let evicted = if self.sizing.trims_on(status) { store.trim() } else { 0 };
            drop(store);

            tracing::info!(
                from = last.as_str(),
                to = status.as_str(),
                max_cache_size = ceiling,
                evicted,
                "memory pressure changed"
            );
            *last = status;
        }
        status
    }

    fn start_memory_monitoring(self: &Arc<Self>, period: Duration) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("no runtime available; memory monitoring disabled");
            return;
        };

        let cache: Weak<Self> = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.check_memory_pressure();
            }
        });

        *self.monitor.lock() = Some(handle);
    }

    /// Stop the background memory sampler. Idempotent.
    pub fn stop_memory_monitoring(&self) {
        if let Some(handle) = self.monitor.lock().take() {
            handle.abort();
            tracing::debug!("memory monitoring stopped");
        }
    }
}

/// Holds the single-flight slot; released on drop, including when the fetch panics.
struct PrefetchSlot(Arc<EmailCache>);

impl Drop for PrefetchSlot {
    fn drop(&mut self) {
        self.0.prefetch.release();
    }
}

impl Drop for EmailCache {
    fn drop(&mut self) {
        self.stop_memory_monitoring();
    }
}
