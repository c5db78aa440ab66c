//! Priority queue and single-flight state for background page prefetching.
//!
//! The drain loop itself lives on [`EmailCache`](super::EmailCache) because it
//! needs the store; this module owns the queue, the in-flight flag and the
//! registered fetcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use super::key::CacheKey;
use super::page::MailboxPage;
use crate::Error;

/// Priority for the page right after the one being viewed.
pub const PRIORITY_NEXT_PAGE: i32 = 10;

/// Priority for the page after the next page.
pub const PRIORITY_LOOKAHEAD: i32 = 5;

/// Fetches a page on behalf of the prefetch worker.
///
/// `Ok(None)` means there is nothing worth caching for this key.
#[async_trait]
pub trait PrefetchFetcher: Send + Sync {
    async fn fetch_page(&self, key: &CacheKey) -> Result<Option<MailboxPage>, Error>;
}

/// Queue the page after a prefetched page once it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FollowUp {
    pub(crate) priority: i32,
    /// Earliest time the follow-up may be queued.
    pub(crate) not_before: Instant,
}

#[derive(Debug, Clone)]
pub(crate) struct QueuedPrefetch {
    pub(crate) key: CacheKey,
    pub(crate) encoded: String,
    pub(crate) follow_up: Option<FollowUp>,
    priority: i32,
    seq: u64,
}

/// Pending prefetches, highest priority first and FIFO within a priority.
#[derive(Debug, Default)]
pub(crate) struct PrefetchQueue {
    items: Vec<QueuedPrefetch>,
    next_seq: u64,
}

impl PrefetchQueue {
    /// Queue `key`, or raise the priority of an identical pending key.
    ///
    /// A pending key without a follow-up adopts the new one. Returns `false`
    /// when the key was already pending.
    pub(crate) fn push(&mut self, key: CacheKey, priority: i32, follow_up: Option<FollowUp>) -> bool {
        let encoded = key.encode();

        let added = match self.items.iter_mut().find(|item| item.encoded == encoded) {
            Some(existing) => {
                existing.priority = existing.priority.max(priority);
                existing.follow_up = existing.follow_up.or(follow_up);
                false
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.items.push(QueuedPrefetch { key, encoded, follow_up, priority, seq });
                true
            }
        };

        self.items.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        added
    }

    pub(crate) fn pop(&mut self) -> Option<QueuedPrefetch> {
        if self.items.is_empty() { None } else { Some(self.items.remove(0)) }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Queue, single-flight flag and fetcher shared by the drain loop.
pub(crate) struct PrefetchScheduler {
    queue: Mutex<PrefetchQueue>,
    in_flight: AtomicBool,
    fetcher: RwLock<Option<Arc<dyn PrefetchFetcher>>>,
    delay: Duration,
}

impl PrefetchScheduler {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            queue: Mutex::new(PrefetchQueue::default()),
            in_flight: AtomicBool::new(false),
            fetcher: RwLock::new(None),
            delay,
        }
    }

    pub(crate) fn enqueue(&self, key: CacheKey, priority: i32, follow_up: Option<FollowUp>) -> bool {
        self.queue.lock().push(key, priority, follow_up)
    }

    /// Claim the single-flight slot and take the next item.
    ///
    /// Returns `None` if a prefetch is already running or nothing is queued.
    pub(crate) fn try_begin(&self) -> Option<QueuedPrefetch> {
        if self.queue.lock().is_empty() {
            return None;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let item = self.queue.lock().pop();
        if item.is_none() {
            self.in_flight.store(false, Ordering::Release);
        }
        item
    }

    /// Release the single-flight slot.
    pub(crate) fn release(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub(crate) fn set_fetcher(&self, fetcher: Arc<dyn PrefetchFetcher>) {
        *self.fetcher.write() = Some(fetcher);
    }

    pub(crate) fn fetcher(&self) -> Option<Arc<dyn PrefetchFetcher>> {
        self.fetcher.read().clone()
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }
}
