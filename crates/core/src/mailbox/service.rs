//! Cache-first mailbox reads with prefetch chaining and mutation invalidation.
//!
//! Reads consult the [`EmailCache`] before the provider. A miss stores the
//! fetched page and queues the next page at [`PRIORITY_NEXT_PAGE`]; once that
//! page is cached, and no sooner than the lookahead delay, the page after it
//! follows at [`PRIORITY_LOOKAHEAD`]. Any mutation that reached the provider
//! clears the whole cache, since membership and ordering of every cached view
//! may have changed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{INBOX_LABEL, MailProvider, UNREAD_LABEL};
use crate::Error;
use crate::cache::{
    CacheKey, EmailCache, EmailSummary, Label, LabelCounts, Mailbox, MailboxPage, PRIORITY_LOOKAHEAD,
    PRIORITY_NEXT_PAGE, PrefetchFetcher,
};

/// Largest page a caller may ask for.
pub const MAX_LIMIT: u32 = 500;

/// A page together with where it came from.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub key: CacheKey,
    pub page: Arc<MailboxPage>,
    /// `true` when served without contacting the provider.
    pub cache_hit: bool,
}

/// One page of a view, optionally narrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub mailbox: Mailbox,
    pub page_token: Option<String>,
    /// Gmail search query. Required for [`Mailbox::Search`].
    pub query: Option<String>,
    /// Labels in addition to the view's own. [`Mailbox::Label`] needs at least one.
    pub label_ids: Vec<String>,
    /// Page size; the view's default when absent.
    pub limit: Option<u32>,
}

impl ListRequest {
    pub fn new(mailbox: Mailbox) -> Self {
        Self { mailbox, page_token: None, query: None, label_ids: Vec::new(), limit: None }
    }

    pub fn page(mut self, page_token: Option<String>) -> Self {
        self.page_token = page_token.filter(|t| !t.is_empty());
        self
    }

    /// Validate and build the cache key this request names.
    pub fn into_key(self) -> Result<CacheKey, Error> {
        let query = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
        let labels: Vec<&str> = self.label_ids.iter().map(|l| l.trim()).filter(|l| !l.is_empty()).collect();

        match self.mailbox {
            Mailbox::Search if query.is_none() => {
                return Err(Error::InvalidInput("query is required for the search view".into()));
            }
            Mailbox::Label if labels.is_empty() => {
                return Err(Error::InvalidInput("a label id is required for the label view".into()));
            }
            _ => {}
        }

        let mut key = CacheKey::for_view(self.mailbox);
        for label in labels {
            if !key.label_ids.iter().any(|l| l == label) {
                key.label_ids.push(label.to_string());
            }
        }
        if let Some(query) = query {
            key = key.with_query(query);
        }
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_LIMIT {
                return Err(Error::InvalidInput(format!("limit must be 1-{MAX_LIMIT}")));
            }
            key = key.with_limit(limit);
        }
        if let Some(token) = self.page_token.filter(|t| !t.is_empty()) {
            key = key.with_page_token(token);
        }

        Ok(key)
    }
}

/// Adapts a [`MailProvider`] into the cache's prefetch callback.
pub struct ProviderFetcher<P> {
    provider: Arc<P>,
}

impl<P> ProviderFetcher<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> PrefetchFetcher for ProviderFetcher<P>
where
    P: MailProvider + 'static,
{
    async fn fetch_page(&self, key: &CacheKey) -> Result<Option<MailboxPage>, Error> {
        self.provider.fetch_emails(&key.fetch_options()).await.map(Some)
    }
}

/// Mailbox operations for one session.
pub struct MailboxService<P> {
    provider: Arc<P>,
    cache: Arc<EmailCache>,
    lookahead_delay: Duration,
}

impl<P> MailboxService<P>
where
    P: MailProvider + 'static,
{
    /// Wire `provider` into `cache` as its prefetch source.
    pub fn new(provider: Arc<P>, cache: Arc<EmailCache>, lookahead_delay: Duration) -> Self {
        cache.set_prefetch_callback(Arc::new(ProviderFetcher::new(Arc::clone(&provider))));
        Self { provider, cache, lookahead_delay }
    }

    pub fn cache(&self) -> &Arc<EmailCache> {
        &self.cache
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Serve `key` from cache, or fetch, store and warm the following pages.
    ///
    /// Provider errors are returned unchanged and leave the cache untouched.
    pub async fn fetch_page(&self, key: CacheKey) -> Result<CachedPage, Error> {
        if let Some(page) = self.cache.get(&key) {
            if let Some(next) = self.cache.next_page_key(&key) {
                self.cache.queue_for_prefetch(next, PRIORITY_NEXT_PAGE);
            }
            return Ok(CachedPage { key, page, cache_hit: true });
        }

        let page = Arc::new(self.provider.fetch_emails(&key.fetch_options()).await?);
        tracing::debug!(key = %key, emails = page.emails.len(), "fetched page from provider");

        self.cache.set(key.clone(), Arc::clone(&page));
        if let Some(next) = self.cache.next_page_key(&key) {
            self.cache
                .queue_with_lookahead(next, PRIORITY_NEXT_PAGE, PRIORITY_LOOKAHEAD, self.lookahead_delay);
        }

        Ok(CachedPage { key, page, cache_hit: false })
    }

    /// Drop the cached copy of `key` and fetch it again.
    pub async fn refresh(&self, key: CacheKey) -> Result<CachedPage, Error> {
        self.cache.clear(Some(&key));
        self.fetch_page(key).await
    }

    pub async fn list(&self, request: ListRequest) -> Result<CachedPage, Error> {
        self.fetch_page(request.into_key()?).await
    }

    pub async fn inbox(&self, page_token: Option<String>) -> Result<CachedPage, Error> {
        self.list(ListRequest::new(Mailbox::Inbox).page(page_token)).await
    }

    pub async fn important(&self, page_token: Option<String>) -> Result<CachedPage, Error> {
        self.list(ListRequest::new(Mailbox::Important).page(page_token)).await
    }

    pub async fn sent(&self, page_token: Option<String>) -> Result<CachedPage, Error> {
        self.list(ListRequest::new(Mailbox::Sent).page(page_token)).await
    }

    pub async fn trash_view(&self, page_token: Option<String>) -> Result<CachedPage, Error> {
        self.list(ListRequest::new(Mailbox::Trash).page(page_token)).await
    }

    pub async fn spam(&self, page_token: Option<String>) -> Result<CachedPage, Error> {
        self.list(ListRequest::new(Mailbox::Spam).page(page_token)).await
    }

    pub async fn drafts(&self, page_token: Option<String>) -> Result<CachedPage, Error> {
        self.list(ListRequest::new(Mailbox::Draft).page(page_token)).await
    }

    /// Messages carrying `label_id`.
    pub async fn label(&self, label_id: &str, page_token: Option<String>) -> Result<CachedPage, Error> {
        let label = require_label(label_id)?;
        self.list(ListRequest { label_ids: vec![label], ..ListRequest::new(Mailbox::Label).page(page_token) })
            .await
    }

    /// Free-text search across all mail.
    pub async fn search(&self, query: &str, page_token: Option<String>) -> Result<CachedPage, Error> {
        self.list(ListRequest { query: Some(query.to_string()), ..ListRequest::new(Mailbox::Search).page(page_token) })
            .await
    }

    /// Read-through; single messages are not cached.
    pub async fn get_email(&self, id: &str) -> Result<EmailSummary, Error> {
        if id.trim().is_empty() {
            return Err(Error::InvalidInput("message id cannot be empty".into()));
        }
        self.provider.get_email(id.trim()).await
    }

    /// Read-through, like [`get_email`](Self::get_email).
    pub async fn get_thread(&self, thread_id: &str) -> Result<Vec<EmailSummary>, Error> {
        if thread_id.trim().is_empty() {
            return Err(Error::InvalidInput("thread id cannot be empty".into()));
        }
        self.provider.get_thread(thread_id.trim()).await
    }

    pub async fn list_labels(&self) -> Result<Vec<Label>, Error> {
        self.provider.list_labels().await
    }

    pub async fn label_counts(&self, label_id: &str) -> Result<LabelCounts, Error> {
        let label = require_label(label_id)?;
        self.provider.label_counts(&label).await
    }

    /// Counts for every label. Labels whose counts fail to load are skipped.
    pub async fn all_label_counts(&self) -> Result<Vec<LabelCounts>, Error> {
        let labels = self.provider.list_labels().await?;
        let mut counts = Vec::with_capacity(labels.len());
        for label in &labels {
            match self.provider.label_counts(&label.id).await {
                Ok(c) => counts.push(c),
                Err(e) => tracing::warn!(label = %label.id, error = %e, "skipping label counts"),
            }
        }
        Ok(counts)
    }

    /// New user label. Cached pages are unaffected.
    pub async fn create_label(&self, name: &str) -> Result<Label, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("label name cannot be empty".into()));
        }
        self.provider.create_label(name).await
    }

    pub async fn mark_as_read(&self, ids: &[String]) -> Result<(), Error> {
        require_ids(ids)?;
        self.provider.modify_labels(ids, &[], &[UNREAD_LABEL.to_string()]).await?;
        self.invalidate("mark_as_read");
        Ok(())
    }

    pub async fn mark_as_unread(&self, ids: &[String]) -> Result<(), Error> {
        require_ids(ids)?;
        self.provider.modify_labels(ids, &[UNREAD_LABEL.to_string()], &[]).await?;
        self.invalidate("mark_as_unread");
        Ok(())
    }

    pub async fn add_label(&self, ids: &[String], label_id: &str) -> Result<(), Error> {
        require_ids(ids)?;
        let label = require_label(label_id)?;
        self.provider.modify_labels(ids, &[label], &[]).await?;
        self.invalidate("add_label");
        Ok(())
    }

    pub async fn remove_label(&self, ids: &[String], label_id: &str) -> Result<(), Error> {
        require_ids(ids)?;
        let label = require_label(label_id)?;
        self.provider.modify_labels(ids, &[], &[label]).await?;
        self.invalidate("remove_label");
        Ok(())
    }

    /// Remove messages from the inbox without deleting them.
    pub async fn archive(&self, ids: &[String]) -> Result<(), Error> {
        require_ids(ids)?;
        self.provider.modify_labels(ids, &[], &[INBOX_LABEL.to_string()]).await?;
        self.invalidate("archive");
        Ok(())
    }

    /// Clears the cache even on error: ids before the failing one are already trashed.
    pub async fn trash(&self, ids: &[String]) -> Result<(), Error> {
        require_ids(ids)?;
        let result = self.provider.trash(ids).await;
        self.invalidate("trash");
        result
    }

    /// Clears the cache even on error, as [`trash`](Self::trash) does.
    pub async fn delete(&self, ids: &[String]) -> Result<(), Error> {
        require_ids(ids)?;
        let result = self.provider.delete(ids).await;
        self.invalidate("delete");
        result
    }

    fn invalidate(&self, operation: &str) {
        let dropped = self.cache.len();
        self.cache.clear(None);
        tracing::debug!(operation, dropped, "invalidated cache after mutation");
    }
}

fn require_ids(ids: &[String]) -> Result<(), Error> {
    if ids.is_empty() || ids.iter().any(|id| id.trim().is_empty()) {
        return Err(Error::InvalidInput("message ids cannot be empty".into()));
    }
    Ok(())
}

fn require_label(label_id: &str) -> Result<String, Error> {
    let label_id = label_id.trim();
    if label_id.is_empty() {
        return Err(Error::InvalidInput("label id cannot be empty".into()));
    }
    Ok(label_id.to_string())
}
