//! Mailbox page types shared by the cache, the providers and the server.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A parsed `Name <email>` mailbox address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

/// List-view summary of a message.
///
/// Carries only what a mailbox listing renders; bodies and attachments are
/// fetched on demand and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmailSummary {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub snippet: String,
    pub from: EmailAddress,
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<EmailAddress>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub is_read: bool,
    pub is_starred: bool,
    pub received_at: DateTime<Utc>,
}

/// One page of a mailbox listing as returned by a provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MailboxPage {
    pub emails: Vec<EmailSummary>,
    /// Continuation token for the following page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    pub result_size_estimate: u32,
}

/// Listing parameters handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchOptions {
    pub limit: Option<u32>,
    pub page_token: Option<String>,
    pub query: Option<String>,
    pub label_ids: Vec<String>,
}

/// A mailbox label as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Label {
    pub id: String,
    pub name: String,
    /// `system` or `user`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Message totals for one label, as the provider reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LabelCounts {
    pub label_id: String,
    pub total: u32,
    pub unread: u32,
}
