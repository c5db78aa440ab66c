//! Bounded, expiring, recency-ordered page store.
//!
//! Entries live in an `IndexMap` ordered from least to most recently used:
//! a hit moves the entry to the back and overflow evicts from the front.
//! Two side tables recover structured keys, one from the encoded key and one
//! from a page's continuation token. Every removal path goes through
//! [`CacheStore::remove_encoded`] so the side tables never outlive their entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

use super::key::CacheKey;
use super::page::MailboxPage;

#[derive(Debug)]
struct CacheEntry {
    page: Arc<MailboxPage>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= ttl
    }
}

/// LRU + TTL store of mailbox pages.
///
/// Not synchronized; [`EmailCache`](super::EmailCache) wraps it in a mutex.
#[derive(Debug)]
pub struct CacheStore {
    entries: IndexMap<String, CacheEntry>,
    token_to_key: HashMap<String, String>,
    keys: HashMap<String, CacheKey>,
    max_size: usize,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self { entries: IndexMap::new(), token_to_key: HashMap::new(), keys: HashMap::new(), max_size, ttl }
    }

    /// Look up a fresh page and mark it most recently used.
    ///
    /// An expired entry is removed (with its token mapping) and reported as a miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<MailboxPage>> {
        self.get_encoded(&key.encode(), Instant::now())
    }

    fn get_encoded(&mut self, encoded: &str, now: Instant) -> Option<Arc<MailboxPage>> {
        let idx = self.entries.get_index_of(encoded)?;

        if self.entries[idx].is_expired(self.ttl, now) {
            tracing::debug!(key = encoded, "cache entry expired");
            self.remove_encoded(encoded);
            return None;
        }

        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        self.entries.get(encoded).map(|entry| Arc::clone(&entry.page))
    }

    /// Store a page under `key`, replacing any previous page for the same key.
    ///
    /// The new entry becomes most recently used; least recently used entries
    /// are evicted while the store is over capacity.
    pub fn set(&mut self, key: CacheKey, page: Arc<MailboxPage>) {
        let encoded = key.encode();
        self.remove_encoded(&encoded);

        if let Some(token) = &page.next_page_token {
            self.token_to_key.insert(token.clone(), encoded.clone());
        }
        self.keys.insert(encoded.clone(), key);
        self.entries.insert(encoded, CacheEntry { page, inserted_at: Instant::now() });

        let evicted = self.trim();
        if evicted > 0 {
            tracing::debug!(evicted, max_size = self.max_size, "evicted least recently used pages");
        }
    }

    /// Remove one entry, or everything when `key` is `None`.
    pub fn clear(&mut self, key: Option<&CacheKey>) {
        match key {
            Some(key) => {
                self.remove_encoded(&key.encode());
            }
            None => {
                self.entries.clear();
                self.token_to_key.clear();
                self.keys.clear();
            }
        }
    }

    /// Structured key of the live page whose continuation token is `token`.
    pub fn key_for_token(&mut self, token: &str) -> Option<CacheKey> {
        let encoded = self.token_to_key.get(token)?.clone();
        if !self.purge_if_expired(&encoded, Instant::now()) {
            return None;
        }
        self.keys.get(&encoded).cloned()
    }

    /// Key for the page after `key`, if `key` is cached and has a continuation token.
    ///
    /// Does not touch recency.
    pub fn next_page_key(&mut self, key: &CacheKey) -> Option<CacheKey> {
        let encoded = key.encode();
        if !self.purge_if_expired(&encoded, Instant::now()) {
            return None;
        }
        let token = self.entries.get(&encoded)?.page.next_page_token.clone()?;
        Some(CacheKey { page_token: Some(token), ..key.clone() })
    }

    /// Whether `key` would be a hit right now. Does not touch recency.
    pub fn contains_fresh(&self, key: &CacheKey) -> bool {
        self.entries
            .get(&key.encode())
            .is_some_and(|entry| !entry.is_expired(self.ttl, Instant::now()))
    }

    /// Drop every entry inserted before `cutoff`. Returns how many were removed.
    pub fn invalidate_older_than(&mut self, cutoff: Instant) -> usize {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at < cutoff)
            .map(|(encoded, _)| encoded.clone())
            .collect();

        for encoded in &stale {
            self.remove_encoded(encoded);
        }
        stale.len()
    }

    /// Evict least recently used entries until within `max_size`.
    pub fn trim(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.max_size {
            let Some(oldest) = self.entries.keys().next().cloned() else {
                break;
            };
            self.remove_encoded(&oldest);
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Change the capacity. Shrinking does not evict until the next
    /// [`trim`](Self::trim) or insertion.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    /// Returns `true` if the entry is present and fresh, removing it if expired.
    fn purge_if_expired(&mut self, encoded: &str, now: Instant) -> bool {
        match self.entries.get(encoded) {
            Some(entry) if entry.is_expired(self.ttl, now) => {
                self.remove_encoded(encoded);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn remove_encoded(&mut self, encoded: &str) -> bool {
        let Some(entry) = self.entries.shift_remove(encoded) else {
            return false;
        };

        // Another page may have taken over the same token since; keep its mapping.
        if let Some(token) = &entry.page.next_page_token
            && self.token_to_key.get(token).is_some_and(|owner| owner == encoded)
        {
            self.token_to_key.remove(token);
        }
        self.keys.remove(encoded);
        true
    }
}
