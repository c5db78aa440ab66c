//! Cache key codec.
//!
//! A [`CacheKey`] describes one page of one mailbox view. Its encoded form is
//! `mailbox:page_token:query:labels:limit`, with absent fields written as the
//! empty string (or `0` for the limit) and the label set sorted and deduplicated
//! so callers may pass labels in any order. `%`, `:` and `,` inside a field are
//! percent-escaped, so Gmail operators such as `from:x` cannot shift fields.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::page::FetchOptions;
use crate::Error;

const DELIMITER: char = ':';

/// Logical mailbox view a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mailbox {
    Inbox,
    Sent,
    Trash,
    Spam,
    Draft,
    Important,
    /// A user or system label other than the standard views.
    Label,
    Search,
}

impl Mailbox {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mailbox::Inbox => "inbox",
            Mailbox::Sent => "sent",
            Mailbox::Trash => "trash",
            Mailbox::Spam => "spam",
            Mailbox::Draft => "draft",
            Mailbox::Important => "important",
            Mailbox::Label => "label",
            Mailbox::Search => "search",
        }
    }

    /// Gmail system label backing this view. Label and search views have none.
    pub fn system_label(&self) -> Option<&'static str> {
        match self {
            Mailbox::Inbox => Some("INBOX"),
            Mailbox::Sent => Some("SENT"),
            Mailbox::Trash => Some("TRASH"),
            Mailbox::Spam => Some("SPAM"),
            Mailbox::Draft => Some("DRAFT"),
            Mailbox::Important => Some("IMPORTANT"),
            Mailbox::Label | Mailbox::Search => None,
        }
    }

    /// Page size used when the caller does not ask for one.
    pub fn default_limit(&self) -> u32 {
        match self {
            Mailbox::Inbox | Mailbox::Search => 100,
            _ => 500,
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mailbox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbox" => Ok(Mailbox::Inbox),
            "sent" => Ok(Mailbox::Sent),
            "trash" => Ok(Mailbox::Trash),
            "spam" => Ok(Mailbox::Spam),
            "draft" | "drafts" => Ok(Mailbox::Draft),
            "important" => Ok(Mailbox::Important),
            "label" => Ok(Mailbox::Label),
            "search" => Ok(Mailbox::Search),
            other => Err(Error::InvalidInput(format!("unknown mailbox: {other}"))),
        }
    }
}

/// Structured lookup for one cached page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheKey {
    pub mailbox: Mailbox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl CacheKey {
    /// First page of `mailbox` with no filters.
    pub fn new(mailbox: Mailbox) -> Self {
        Self { mailbox, page_token: None, query: None, label_ids: Vec::new(), limit: None }
    }

    /// First page of a standard view: its system label and default page size.
    pub fn for_view(mailbox: Mailbox) -> Self {
        let key = Self::new(mailbox).with_limit(mailbox.default_limit());
        match mailbox.system_label() {
            Some(label) => key.with_labels([label]),
            None => key,
        }
    }

    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_ids = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Canonical string form used as the store's map key.
    pub fn encode(&self) -> String {
        let mut labels: Vec<String> = self.label_ids.iter().map(String::as_str).map(escape).collect();
        labels.sort_unstable();
        labels.dedup();

        format!(
            "{mailbox}{d}{token}{d}{query}{d}{labels}{d}{limit}",
            mailbox = self.mailbox,
            token = escape(self.page_token.as_deref().unwrap_or("")),
            query = escape(self.query.as_deref().unwrap_or("")),
            labels = labels.join(","),
            limit = self.limit.unwrap_or(0),
            d = DELIMITER,
        )
    }

    /// Provider request that produces the page this key names.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            limit: self.limit,
            page_token: self.page_token.clone(),
            query: self.query.clone(),
            label_ids: self.label_ids.clone(),
        }
    }
}

fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for ch in field.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            ',' => out.push_str("%2C"),
            other => out.push(other),
        }
    }
    out
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
