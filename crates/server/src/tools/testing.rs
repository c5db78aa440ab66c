//! In-memory provider and helpers shared by the tool tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mailcache_core::Error;
use mailcache_core::cache::{
    CacheSettings, EmailAddress, EmailCache, EmailSummary, FetchOptions, Label, LabelCounts, MailboxPage, StaticProbe,
};
use mailcache_core::mailbox::{MailProvider, MailboxService};
use parking_lot::Mutex;
use rmcp::model::CallToolResult;

/// Three pages per view: first -> "p2" -> "p3" -> end, one message each.
#[derive(Default)]
pub(crate) struct FakeProvider {
    pub(crate) fail: bool,
    pub(crate) added: Mutex<Vec<String>>,
    pub(crate) removed: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub(crate) fn added_labels(&self) -> Vec<String> {
        self.added.lock().clone()
    }

    pub(crate) fn removed_labels(&self) -> Vec<String> {
        self.removed.lock().clone()
    }
}

fn summary(id: &str) -> EmailSummary {
    EmailSummary {
        id: id.to_string(),
        thread_id: format!("t-{id}"),
        subject: "Status update".into(),
        snippet: "All green".into(),
        from: EmailAddress { name: Some("Alice".into()), email: "alice@example.com".into() },
        to: Vec::new(),
        cc: Vec::new(),
        labels: vec!["INBOX".into()],
        is_read: false,
        is_starred: false,
        received_at: Utc::now(),
    }
}

#[async_trait]
impl MailProvider for FakeProvider {
    async fn fetch_emails(&self, options: &FetchOptions) -> Result<MailboxPage, Error> {
        if self.fail {
            return Err(Error::Upstream("HTTP error: 503 - unavailable".into()));
        }
        let (id, next) = match options.page_token.as_deref() {
            None => ("m1", Some("p2")),
            Some("p2") => ("m2", Some("p3")),
            _ => ("m3", None),
        };
        Ok(MailboxPage { emails: vec![summary(id)], next_page_token: next.map(str::to_string), result_size_estimate: 3 })
    }

    async fn get_email(&self, id: &str) -> Result<EmailSummary, Error> {
        Ok(summary(id))
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Vec<EmailSummary>, Error> {
        let mut emails = vec![summary("m1"), summary("m2")];
        for email in &mut emails {
            email.thread_id = thread_id.to_string();
        }
        Ok(emails)
    }

    async fn list_labels(&self) -> Result<Vec<Label>, Error> {
        Ok(vec![
            Label { id: "INBOX".into(), name: "INBOX".into(), kind: "system".into() },
            Label { id: "Label_3".into(), name: "Work".into(), kind: "user".into() },
        ])
    }

    async fn label_counts(&self, label_id: &str) -> Result<LabelCounts, Error> {
        Ok(LabelCounts { label_id: label_id.to_string(), total: 3, unread: 1 })
    }

    async fn create_label(&self, name: &str) -> Result<Label, Error> {
        Ok(Label { id: "Label_4".into(), name: name.to_string(), kind: "user".into() })
    }

    async fn modify_labels(&self, _ids: &[String], add: &[String], remove: &[String]) -> Result<(), Error> {
        self.added.lock().extend_from_slice(add);
        self.removed.lock().extend_from_slice(remove);
        Ok(())
    }

    async fn trash(&self, _ids: &[String]) -> Result<(), Error> {
        Ok(())
    }

    async fn delete(&self, _ids: &[String]) -> Result<(), Error> {
        Ok(())
    }
}

pub(crate) fn service(provider: FakeProvider) -> MailboxService<FakeProvider> {
    let cache = EmailCache::new(CacheSettings::default(), Arc::new(StaticProbe::default()));
    MailboxService::new(Arc::new(provider), cache, Duration::from_secs(1))
}

/// Parse the JSON text of a tool result.
pub(crate) fn output_json(result: &CallToolResult) -> serde_json::Value {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
