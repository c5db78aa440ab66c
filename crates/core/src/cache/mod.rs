//! In-memory cache for mailbox listing pages.
//!
//! This module provides a session-scoped cache of provider pages. It supports:
//!
//! - Order-independent cache keys for mailbox views
//! - LRU eviction and lazy TTL expiry
//! - Continuation-token to cache-key reverse lookups
//! - Cache resizing driven by host memory pressure
//! - A single-flight, priority-ordered background prefetch queue

pub mod email_cache;
pub mod key;
pub mod memory;
pub mod page;
pub mod prefetch;
pub mod store;

pub use crate::Error;

pub use email_cache::{CacheSettings, EmailCache};
pub use key::{CacheKey, Mailbox};
pub use memory::{
    MemoryPressure, MemoryProbe, ProcMeminfoProbe, SizingPolicy, StaticProbe, UnavailableProbe, default_probe,
};
pub use page::{EmailAddress, EmailSummary, FetchOptions, Label, LabelCounts, MailboxPage};
pub use prefetch::{PRIORITY_LOOKAHEAD, PRIORITY_NEXT_PAGE, PrefetchFetcher};
pub use store::CacheStore;
