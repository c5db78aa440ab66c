//! Gmail API response types and normalization.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use mailcache_core::cache::{EmailAddress, EmailSummary, Label, LabelCounts};
use regex::Regex;
use serde::{Deserialize, Serialize};

const NO_SUBJECT: &str = "(No Subject)";

static NAMED_ADDRESS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+)<(.+)>$").expect("valid address regex"));

/// Raw `users.messages.list` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: u32,
}

/// Message id as listed, before its metadata is fetched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
}

/// Raw `users.messages.get` response in `metadata` format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    /// Epoch milliseconds, sent as a string.
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePayload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

#[derive(Debug, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

/// Raw `users.labels.list` response.
#[derive(Debug, Deserialize)]
pub struct LabelListResponse {
    #[serde(default)]
    pub labels: Vec<GmailLabel>,
}

/// A label from `users.labels.list`, `get` or `create`. Counts are only
/// present on `get`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailLabel {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub messages_total: u32,
    #[serde(default)]
    pub messages_unread: u32,
}

/// Raw `users.threads.get` response.
#[derive(Debug, Deserialize)]
pub struct GmailThread {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<GmailMessage>,
}

/// Body of `users.labels.create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLabelRequest<'a> {
    pub name: &'a str,
    pub label_list_visibility: &'static str,
    pub message_list_visibility: &'static str,
}

impl<'a> CreateLabelRequest<'a> {
    /// A label visible in both the label list and message lists.
    pub fn visible(name: &'a str) -> Self {
        Self { name, label_list_visibility: "labelShow", message_list_visibility: "show" }
    }
}

/// Body of `users.messages.batchModify`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchModifyRequest<'a> {
    pub ids: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    pub add_label_ids: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    pub remove_label_ids: &'a [String],
}

fn is_empty(labels: &&[String]) -> bool {
    labels.is_empty()
}

impl GmailMessage {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn received_at(&self) -> DateTime<Utc> {
        self.internal_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_default()
    }
}

impl From<GmailMessage> for EmailSummary {
    fn from(message: GmailMessage) -> Self {
        let subject = message
            .header("Subject")
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_SUBJECT)
            .to_string();
        let from = parse_address(message.header("From").unwrap_or_default());
        let to = message.header("To").map(parse_address_list).unwrap_or_default();
        let cc = message.header("Cc").map(parse_address_list).unwrap_or_default();
        let received_at = message.received_at();

        EmailSummary {
            is_read: !message.label_ids.iter().any(|l| l == "UNREAD"),
            is_starred: message.label_ids.iter().any(|l| l == "STARRED"),
            id: message.id,
            thread_id: message.thread_id,
            subject,
            snippet: message.snippet,
            from,
            to,
            cc,
            labels: message.label_ids,
            received_at,
        }
    }
}

impl From<GmailLabel> for Label {
    fn from(raw: GmailLabel) -> Self {
        Label { id: raw.id, name: raw.name, kind: raw.kind.unwrap_or_else(|| "user".to_string()) }
    }
}

impl From<&GmailLabel> for LabelCounts {
    fn from(raw: &GmailLabel) -> Self {
        LabelCounts { label_id: raw.id.clone(), total: raw.messages_total, unread: raw.messages_unread }
    }
}

/// Parse `Name <email>` or a bare address.
pub fn parse_address(raw: &str) -> EmailAddress {
    let raw = raw.trim();
    match NAMED_ADDRESS.captures(raw) {
        Some(caps) => {
            let name = caps[1].trim().trim_matches('"').trim();
            EmailAddress {
                name: if name.is_empty() { None } else { Some(name.to_string()) },
                email: caps[2].trim().to_string(),
            }
        }
        None => EmailAddress { name: None, email: raw.to_string() },
    }
}

/// Parse a comma-separated header, dropping empty entries.
pub fn parse_address_list(raw: &str) -> Vec<EmailAddress> {
    raw.split(',')
        .map(parse_address)
        .filter(|addr| !addr.email.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE_JSON: &str = r#"{
        "id": "18c1",
        "threadId": "t-18c1",
        "labelIds": ["INBOX", "UNREAD", "STARRED"],
        "snippet": "Lunch tomorrow?",
        "internalDate": "1700000000000",
        "payload": {
            "headers": [
                {"name": "From", "value": "Alice Example <alice@example.com>"},
                {"name": "To", "value": "bob@example.com, Carol <carol@example.com>"},
                {"name": "subject", "value": "Lunch"}
            ]
        }
    }"#;

    #[test]
    fn test_message_into_summary() {
        let raw: GmailMessage = serde_json::from_str(MESSAGE_JSON).unwrap();
        let summary = EmailSummary::from(raw);

        assert_eq!(summary.id, "18c1");
        assert_eq!(summary.thread_id, "t-18c1");
        assert_eq!(summary.subject, "Lunch");
        assert_eq!(summary.from.name.as_deref(), Some("Alice Example"));
        assert_eq!(summary.from.email, "alice@example.com");
        assert_eq!(summary.to.len(), 2);
        assert_eq!(summary.to[1].name.as_deref(), Some("Carol"));
        assert!(summary.cc.is_empty());
        assert!(!summary.is_read);
        assert!(summary.is_starred);
        assert_eq!(summary.received_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_missing_headers_use_defaults() {
        let raw: GmailMessage = serde_json::from_str(r#"{"id": "m1", "labelIds": ["INBOX"]}"#).unwrap();
        let summary = EmailSummary::from(raw);

        assert_eq!(summary.subject, NO_SUBJECT);
        assert_eq!(summary.from.email, "");
        assert!(summary.is_read);
        assert!(!summary.is_starred);
        assert_eq!(summary.received_at, DateTime::<Utc>::default());
    }

    #[test]
    fn test_parse_address_forms() {
        let named = parse_address("\"Dana D\" <dana@example.com>");
        assert_eq!(named.name.as_deref(), Some("Dana D"));
        assert_eq!(named.email, "dana@example.com");

        let bare = parse_address("  eve@example.com ");
        assert!(bare.name.is_none());
        assert_eq!(bare.email, "eve@example.com");
    }

    #[test]
    fn test_parse_address_list_skips_empty() {
        let list = parse_address_list("a@example.com, ,B <b@example.com>,");
        let emails: Vec<&str> = list.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_list_response_without_messages() {
        let raw: MessageListResponse = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(raw.messages.is_empty());
        assert!(raw.next_page_token.is_none());
    }

    #[test]
    fn test_label_with_counts() {
        let raw: GmailLabel = serde_json::from_str(
            r#"{"id": "INBOX", "name": "INBOX", "type": "system", "messagesTotal": 42, "messagesUnread": 3}"#,
        )
        .unwrap();
        let counts = LabelCounts::from(&raw);

        assert_eq!(counts.label_id, "INBOX");
        assert_eq!(counts.total, 42);
        assert_eq!(counts.unread, 3);
    }

    #[test]
    fn test_create_label_body_shape() {
        let json = serde_json::to_value(CreateLabelRequest::visible("Receipts")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "Receipts",
                "labelListVisibility": "labelShow",
                "messageListVisibility": "show"
            })
        );
    }

    #[test]
    fn test_batch_modify_body_shape() {
        let ids = vec!["m1".to_string()];
        let remove = vec!["UNREAD".to_string()];
        let body = BatchModifyRequest { ids: &ids, add_label_ids: &[], remove_label_ids: &remove };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "ids": ["m1"], "removeLabelIds": ["UNREAD"] }));
    }
}
