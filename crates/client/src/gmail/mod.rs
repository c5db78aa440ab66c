//! Gmail REST API client.
//!
//! Provides a client for the Gmail `users.messages` and `users.labels`
//! endpoints and implements [`MailProvider`] on top of it.
//!
//! ### Endpoints
//!
//! - **Base URL**: `https://gmail.googleapis.com/gmail/v1/users/me`
//! - **Authentication**: OAuth bearer token in the `Authorization` header.
//! - **Listing**: `GET /messages` for ids (at most 100 per page), then
//!   `GET /messages/{id}?format=metadata` per message. A message that fails
//!   to load is logged and left out of the page.
//! - **Threads**: `GET /threads/{id}?format=metadata`.
//! - **Labels**: `GET /labels`, `GET /labels/{id}` for counts, `POST /labels`.
//! - **Rate Limiting**: 429 responses are retried up to 3 times with
//!   exponential backoff (1s, 2s, 4s, capped at 10s).

pub mod error;
pub mod response;

pub use error::GmailError;
pub use response::{parse_address, parse_address_list};

use std::time::Duration;

use async_trait::async_trait;
use mailcache_core::cache::{EmailSummary, FetchOptions, Label, LabelCounts, MailboxPage};
use mailcache_core::mailbox::MailProvider;
use mailcache_core::{AppConfig, Error};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use response::{
    BatchModifyRequest, CreateLabelRequest, GmailLabel, GmailMessage, GmailThread, LabelListResponse, MessageListResponse,
};

/// Default base URL for the authenticated user's mailbox.
const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "mailcache/0.1";

/// Largest page the list endpoint will return.
const MAX_PAGE_SIZE: u32 = 100;

/// Headers requested in `metadata` format.
const METADATA_HEADERS: [&str; 5] = ["From", "To", "Cc", "Subject", "Date"];

/// Label totals above this are not trusted; the listing estimate is used instead.
const SUSPECT_LABEL_TOTAL: u32 = 10_000;

/// Gmail client configuration.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    /// OAuth access token.
    pub access_token: String,
    /// Base URL (default: https://gmail.googleapis.com/gmail/v1/users/me).
    pub base_url: String,
    /// Request timeout (default: 20s).
    pub timeout: Duration,
    /// User-agent string (default: mailcache/0.x).
    pub user_agent: String,
    /// Retries after a 429 before giving up (default: 3).
    pub max_retries: u32,
    /// First backoff step, doubled on each retry (default: 1s).
    pub retry_base: Duration,
    /// Backoff ceiling (default: 10s).
    pub retry_max: Duration,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: 3,
            retry_base: Duration::from_secs(1),
            retry_max: Duration::from_secs(10),
        }
    }
}

impl GmailConfig {
    /// Build from application config. Fails if no access token is set.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, GmailError> {
        let access_token = config.require_gmail_access_token().map_err(|_| GmailError::MissingToken)?;

        Ok(Self {
            access_token: access_token.to_string(),
            base_url: config.gmail_base_url.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            ..Default::default()
        })
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_base.saturating_mul(factor).min(self.retry_max)
    }

    /// `base_url` with `segments` appended as percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GmailError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| GmailError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| GmailError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Gmail REST API client.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: reqwest::Client,
    config: GmailConfig,
}

impl GmailClient {
    /// Create a new Gmail client with the given configuration.
    pub fn new(config: GmailConfig) -> Result<Self, GmailError> {
        if config.access_token.is_empty() {
            return Err(GmailError::MissingToken);
        }
        config.endpoint(&[])?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { http, config })
    }

    /// Create a client from application config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, GmailError> {
        Self::new(GmailConfig::from_app_config(config)?)
    }

    /// One page of message summaries.
    ///
    /// Messages are loaded one at a time; any that fail are skipped.
    pub async fn list_messages(&self, options: &FetchOptions) -> Result<MailboxPage, GmailError> {
        let limit = options.limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let mut query: Vec<(&str, String)> = vec![("maxResults", limit.to_string())];
        query.extend(
            options
                .label_ids
                .iter()
                .filter(|label| !label.is_empty())
                .map(|label| ("labelIds", label.clone())),
        );
        if let Some(q) = options.query.as_deref().filter(|q| !q.is_empty()) {
            query.push(("q", q.to_string()));
        }
        if let Some(token) = options.page_token.as_deref().filter(|t| !t.is_empty()) {
            query.push(("pageToken", token.to_string()));
        }

        let listing: MessageListResponse = self.get_json(&["messages"], &query).await?;
        tracing::debug!(
            listed = listing.messages.len(),
            has_next = listing.next_page_token.is_some(),
            "listed Gmail messages"
        );

        let mut emails = Vec::with_capacity(listing.messages.len());
        for message in &listing.messages {
            match self.get_message(&message.id).await {
                Ok(raw) => emails.push(EmailSummary::from(raw)),
                Err(e) => tracing::warn!(id = %message.id, error = %e, "skipping message that failed to load"),
            }
        }

        Ok(MailboxPage {
            emails,
            next_page_token: listing.next_page_token,
            result_size_estimate: listing.result_size_estimate,
        })
    }

    /// One message in `metadata` format.
    pub async fn get_message(&self, id: &str) -> Result<GmailMessage, GmailError> {
        self.get_json(&["messages", id], &metadata_query()).await
    }

    /// Every message of a thread in `metadata` format.
    pub async fn thread(&self, thread_id: &str) -> Result<GmailThread, GmailError> {
        self.get_json(&["threads", thread_id], &metadata_query()).await
    }

    pub async fn labels(&self) -> Result<Vec<Label>, GmailError> {
        let response: LabelListResponse = self.get_json(&["labels"], &[]).await?;
        Ok(response.labels.into_iter().map(Label::from).collect())
    }

    /// Message totals for one label.
    ///
    /// Gmail sometimes reports absurd totals for a label; above
    /// `SUSPECT_LABEL_TOTAL` the listing's size estimate is used instead.
    pub async fn label_totals(&self, label_id: &str) -> Result<LabelCounts, GmailError> {
        let label: GmailLabel = self.get_json(&["labels", label_id], &[]).await?;
        let mut counts = LabelCounts::from(&label);

        if counts.total > SUSPECT_LABEL_TOTAL {
            let query = [("labelIds", label_id.to_string()), ("maxResults", "1".to_string())];
            let listing: MessageListResponse = self.get_json(&["messages"], &query).await?;
            tracing::debug!(
                label = label_id,
                reported = counts.total,
                estimate = listing.result_size_estimate,
                "label total out of range; using listing estimate"
            );
            counts.total = listing.result_size_estimate;
        }
        Ok(counts)
    }

    pub async fn create_user_label(&self, name: &str) -> Result<Label, GmailError> {
        let body = CreateLabelRequest::visible(name);
        let response = self.send(Method::POST, &["labels"], |req| req.json(&body)).await?;
        let label: GmailLabel = parse_json(response).await?;
        Ok(Label::from(label))
    }

    /// Add and remove labels on up to 1000 messages in one call.
    pub async fn batch_modify(&self, ids: &[String], add: &[String], remove: &[String]) -> Result<(), GmailError> {
        let body = BatchModifyRequest { ids, add_label_ids: add, remove_label_ids: remove };
        self.send(Method::POST, &["messages", "batchModify"], |req| req.json(&body))
            .await?;
        Ok(())
    }

    pub async fn trash_message(&self, id: &str) -> Result<(), GmailError> {
        self.send(Method::POST, &["messages", id, "trash"], |req| req).await?;
        Ok(())
    }

    pub async fn delete_message(&self, id: &str) -> Result<(), GmailError> {
        self.send(Method::DELETE, &["messages", id], |req| req).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T, GmailError> {
        let response = self.send(Method::GET, segments, |req| req.query(query)).await?;
        parse_json(response).await
    }

    /// Send a request, retrying 429s with exponential backoff.
    async fn send<F>(&self, method: Method, segments: &[&str], build: F) -> Result<Response, GmailError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = self.config.endpoint(segments)?;
        let mut attempt = 0;

        loop {
            let request = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.config.access_token);
            let response = build(request).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.config.max_retries {
                let delay = self.config.backoff(attempt);
                tracing::warn!(
                    path = url.path(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited by Gmail; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            tracing::debug!(method = %method, path = url.path(), status = status.as_u16(), "Gmail API response");
            return check_status(response, segments).await;
        }
    }
}

fn metadata_query() -> Vec<(&'static str, String)> {
    let mut query = vec![("format", "metadata".to_string())];
    query.extend(METADATA_HEADERS.iter().map(|h| ("metadataHeaders", (*h).to_string())));
    query
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, GmailError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| GmailError::Parse(e.to_string()))
}

async fn check_status(response: Response, segments: &[&str]) -> Result<Response, GmailError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GmailError::AuthError { status: status.as_u16() }),
        StatusCode::TOO_MANY_REQUESTS => Err(GmailError::RateLimited),
        StatusCode::NOT_FOUND => Err(GmailError::NotFound(segments.join("/"))),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(GmailError::HttpError { status: status.as_u16(), body })
        }
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    async fn fetch_emails(&self, options: &FetchOptions) -> Result<MailboxPage, Error> {
        Ok(self.list_messages(options).await?)
    }

    async fn get_email(&self, id: &str) -> Result<EmailSummary, Error> {
        Ok(self.get_message(id).await?.into())
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Vec<EmailSummary>, Error> {
        let thread = self.thread(thread_id).await?;
        Ok(thread.messages.into_iter().map(EmailSummary::from).collect())
    }

    async fn list_labels(&self) -> Result<Vec<Label>, Error> {
        Ok(self.labels().await?)
    }

    async fn label_counts(&self, label_id: &str) -> Result<LabelCounts, Error> {
        Ok(self.label_totals(label_id).await?)
    }

    async fn create_label(&self, name: &str) -> Result<Label, Error> {
        Ok(self.create_user_label(name).await?)
    }

    async fn modify_labels(&self, ids: &[String], add: &[String], remove: &[String]) -> Result<(), Error> {
        Ok(self.batch_modify(ids, add, remove).await?)
    }

    async fn trash(&self, ids: &[String]) -> Result<(), Error> {
        for id in ids {
            self.trash_message(id).await?;
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), Error> {
        for id in ids {
            self.delete_message(id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> GmailClient {
        GmailClient::new(GmailConfig {
            access_token: "test-token".into(),
            base_url: server.uri(),
            retry_base: Duration::from_millis(10),
            retry_max: Duration::from_millis(40),
            ..Default::default()
        })
        .unwrap()
    }

    fn message_json(id: &str, subject: &str) -> serde_json::Value {
        json!({
            "id": id,
            "threadId": format!("t-{id}"),
            "labelIds": ["INBOX"],
            "snippet": "hello",
            "internalDate": "1700000000000",
            "payload": { "headers": [
                { "name": "From", "value": "Alice <alice@example.com>" },
                { "name": "Subject", "value": subject }
            ]}
        })
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = GmailConfig::default();
        assert_eq!(config.backoff(0), Duration::from_secs(1));
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
        assert_eq!(config.backoff(4), Duration::from_secs(10));
        assert_eq!(config.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn test_client_new_missing_token() {
        let result = GmailClient::new(GmailConfig::default());
        assert!(matches!(result, Err(GmailError::MissingToken)));
    }

    #[test]
    fn test_from_app_config_requires_token() {
        let config = AppConfig::default();
        assert!(matches!(GmailConfig::from_app_config(&config), Err(GmailError::MissingToken)));

        let config = AppConfig { gmail_access_token: Some("tok".into()), timeout_ms: 5_000, ..Default::default() };
        let gmail = GmailConfig::from_app_config(&config).unwrap();
        assert_eq!(gmail.access_token, "tok");
        assert_eq!(gmail.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let config = GmailConfig { base_url: "https://example.com/gmail/v1/users/me/".into(), ..Default::default() };
        let url = config.endpoint(&["messages", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/gmail/v1/users/me/messages/a%2Fb");
    }

    #[tokio::test]
    async fn test_list_messages_fetches_each_and_skips_failures() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/messages"))
            .and(query_param("maxResults", "100"))
            .and(query_param("labelIds", "INBOX"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "m1", "threadId": "t-m1" }, { "id": "m2", "threadId": "t-m2" }],
                "nextPageToken": "tok1",
                "resultSizeEstimate": 50
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/messages/m1"))
            .and(query_param("format", "metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_json("m1", "First")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/messages/m2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;

        let options = FetchOptions { limit: Some(500), label_ids: vec!["INBOX".into()], ..Default::default() };
        let page = client(&server).list_messages(&options).await.unwrap();

        assert_eq!(page.emails.len(), 1);
        assert_eq!(page.emails[0].id, "m1");
        assert_eq!(page.emails[0].subject, "First");
        assert_eq!(page.next_page_token.as_deref(), Some("tok1"));
        assert_eq!(page.result_size_estimate, 50);
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .and(query_param("q", "from:nobody"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultSizeEstimate": 0 })))
            .mount(&server)
            .await;

        let options = FetchOptions { query: Some("from:nobody".into()), ..Default::default() };
        let page = client(&server).list_messages(&options).await.unwrap();

        assert!(page.emails.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/labels"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "labels": [{ "id": "INBOX", "name": "INBOX", "type": "system" }, { "id": "Label_1", "name": "Work" }]
            })))
            .mount(&server)
            .await;

        let labels = client(&server).labels().await.unwrap();

        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].kind, "system");
        assert_eq!(labels[1].kind, "user");
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/labels"))
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&server)
            .await;

        let result = client(&server).labels().await;
        assert!(matches!(result, Err(GmailError::RateLimited)));
    }

    #[tokio::test]
    async fn test_auth_failure_maps_to_core_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = client(&server).fetch_emails(&FetchOptions::default()).await;
        assert!(matches!(result, Err(Error::UpstreamAuth(_))));
    }

    #[tokio::test]
    async fn test_modify_labels_posts_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages/batchModify"))
            .and(body_json(json!({ "ids": ["m1", "m2"], "removeLabelIds": ["UNREAD"] })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let ids = vec!["m1".to_string(), "m2".to_string()];
        client(&server)
            .modify_labels(&ids, &[], &["UNREAD".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_trash_and_delete_per_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages/m1/trash"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "m1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/messages/m2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let gmail = client(&server);
        gmail.trash(&["m1".to_string()]).await.unwrap();
        gmail.delete(&["m2".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_thread_maps_every_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/t-1"))
            .and(query_param("format", "metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t-1",
                "messages": [message_json("m1", "Question"), message_json("m2", "Re: Question")]
            })))
            .mount(&server)
            .await;

        let emails = client(&server).get_thread("t-1").await.unwrap();

        let subjects: Vec<&str> = emails.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Question", "Re: Question"]);
    }

    #[tokio::test]
    async fn test_label_counts_from_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/labels/INBOX"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "INBOX", "name": "INBOX", "type": "system", "messagesTotal": 120, "messagesUnread": 7
            })))
            .mount(&server)
            .await;

        let counts = client(&server).label_counts("INBOX").await.unwrap();

        assert_eq!(counts, LabelCounts { label_id: "INBOX".into(), total: 120, unread: 7 });
    }

    #[tokio::test]
    async fn test_label_counts_fall_back_to_estimate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/labels/INBOX"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "INBOX", "name": "INBOX", "messagesTotal": 4_000_000, "messagesUnread": 9
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .and(query_param("labelIds", "INBOX"))
            .and(query_param("maxResults", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "m1" }], "resultSizeEstimate": 350
            })))
            .expect(1)
            .mount(&server)
            .await;

        let counts = client(&server).label_counts("INBOX").await.unwrap();

        assert_eq!(counts.total, 350);
        assert_eq!(counts.unread, 9);
    }

    #[tokio::test]
    async fn test_create_label_posts_visible_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/labels"))
            .and(body_json(json!({
                "name": "Receipts", "labelListVisibility": "labelShow", "messageListVisibility": "show"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "Label_5", "name": "Receipts" })))
            .expect(1)
            .mount(&server)
            .await;

        let label = client(&server).create_label("Receipts").await.unwrap();

        assert_eq!(label.id, "Label_5");
        assert_eq!(label.kind, "user");
    }

    #[tokio::test]
    async fn test_missing_message_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client(&server).get_email("gone").await;
        assert!(matches!(result, Err(Error::NotFound(what)) if what == "messages/gone"));
    }
}
