//! Client code for mailcache.
//!
//! This crate provides the Gmail REST client and its [`MailProvider`]
//! implementation used by the server.
//!
//! [`MailProvider`]: mailcache_core::mailbox::MailProvider

pub mod gmail;

pub use gmail::{GmailClient, GmailConfig, GmailError};
