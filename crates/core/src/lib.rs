//! Core types and shared functionality for mailcache.
//!
//! This crate provides:
//! - In-memory mailbox page cache with LRU, TTL and memory-pressure sizing
//! - Background prefetching of following pages
//! - Mailbox service over a pluggable mail provider
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod mailbox;

pub use cache::{CacheKey, CacheSettings, EmailCache, Mailbox, MailboxPage};
pub use config::AppConfig;
pub use error::Error;
pub use mailbox::{CachedPage, ListRequest, MailProvider, MailboxService};
