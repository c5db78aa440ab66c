//! Mailbox orchestration over a mail provider and the page cache.

pub mod service;

use async_trait::async_trait;

use crate::Error;
use crate::cache::{EmailSummary, FetchOptions, Label, LabelCounts, MailboxPage};

pub use service::{CachedPage, ListRequest, MailboxService, ProviderFetcher};

/// Gmail label marking a message unread.
pub const UNREAD_LABEL: &str = "UNREAD";

/// Gmail label whose removal archives a message.
pub const INBOX_LABEL: &str = "INBOX";

/// Backend that lists and mutates messages.
///
/// Implementations own transport concerns (auth headers, retries, timeouts);
/// their errors reach callers of on-demand reads unchanged.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// One page of a listing.
    async fn fetch_emails(&self, options: &FetchOptions) -> Result<MailboxPage, Error>;

    /// A single message summary by id.
    async fn get_email(&self, id: &str) -> Result<EmailSummary, Error>;

    /// Every message of a conversation, oldest first.
    async fn get_thread(&self, thread_id: &str) -> Result<Vec<EmailSummary>, Error>;

    async fn list_labels(&self) -> Result<Vec<Label>, Error>;

    /// Total and unread message counts for one label.
    async fn label_counts(&self, label_id: &str) -> Result<LabelCounts, Error>;

    /// Create a user label shown in label and message lists.
    async fn create_label(&self, name: &str) -> Result<Label, Error>;

    /// Add and remove labels on a batch of messages.
    async fn modify_labels(&self, ids: &[String], add: &[String], remove: &[String]) -> Result<(), Error>;

    /// Move messages to the trash.
    async fn trash(&self, ids: &[String]) -> Result<(), Error>;

    /// Permanently delete messages.
    async fn delete(&self, ids: &[String]) -> Result<(), Error>;
}
