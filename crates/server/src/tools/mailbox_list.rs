//! mailbox_list tool implementation.
//!
//! Lists one page of a mailbox view through the page cache.

use mailcache_core::cache::{EmailSummary, Mailbox};
use mailcache_core::mailbox::{ListRequest, MailProvider, MailboxService};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for mailbox_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MailboxListParams {
    /// View to list: inbox (default), important, sent, trash, spam, draft, label, search.
    #[serde(default = "default_mailbox")]
    pub mailbox: Mailbox,

    /// Continuation token from a previous page.
    #[serde(default)]
    pub page_token: Option<String>,

    /// Gmail search query. Required for the search view.
    #[serde(default)]
    pub query: Option<String>,

    /// Extra label filters. The label view requires at least one.
    #[serde(default)]
    pub label_ids: Vec<String>,

    /// Page size (1-500). Defaults to 100 for inbox and search, 500 otherwise.
    #[serde(default)]
    pub limit: Option<u32>,

    /// Drop any cached copy and fetch again.
    #[serde(default)]
    pub force_refresh: bool,
}

impl Default for MailboxListParams {
    fn default() -> Self {
        Self {
            mailbox: default_mailbox(),
            page_token: None,
            query: None,
            label_ids: Vec::new(),
            limit: None,
            force_refresh: false,
        }
    }
}

fn default_mailbox() -> Mailbox {
    Mailbox::Inbox
}

/// Output structure for mailbox_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MailboxListOutput {
    /// Encoded cache key of this page.
    pub key: String,
    /// Whether the page was served from cache.
    pub cache_hit: bool,
    pub emails: Vec<EmailSummary>,
    /// Pass as `page_token` to get the following page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    pub result_size_estimate: u32,
}

impl From<&MailboxListParams> for ListRequest {
    fn from(params: &MailboxListParams) -> Self {
        ListRequest {
            query: params.query.clone(),
            label_ids: params.label_ids.clone(),
            limit: params.limit,
            ..ListRequest::new(params.mailbox).page(params.page_token.clone())
        }
    }
}

/// Implementation of the mailbox_list tool.
pub async fn list_impl<P>(service: &MailboxService<P>, params: MailboxListParams) -> Result<CallToolResult, McpError>
where
    P: MailProvider + 'static,
{
    let request = ListRequest::from(&params);

    let result = if params.force_refresh {
        service.refresh(request.into_key()?).await?
    } else {
        service.list(request).await?
    };

    let output = MailboxListOutput {
        key: result.key.encode(),
        cache_hit: result.cache_hit,
        emails: result.page.emails.clone(),
        next_page_token: result.page.next_page_token.clone(),
        result_size_estimate: result.page.result_size_estimate,
    };

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&output).unwrap_or_default(),
    )]))
}
