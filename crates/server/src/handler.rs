//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheClearParams, clear_impl, status_impl};
use crate::tools::{
    LabelCreateParams, LabelsListParams, MailGetParams, MailModifyParams, MailboxListParams, create_impl, get_impl,
    labels_impl, list_impl, modify_impl,
};

use mailcache_client::GmailClient;
use mailcache_core::{EmailCache, Error, MailboxService};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for mailcache.
#[derive(Clone)]
pub struct MailcacheServer {
    cache: Arc<EmailCache>,
    /// `None` when no Gmail token was configured at startup.
    service: Option<Arc<MailboxService<GmailClient>>>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl MailcacheServer {
    /// Create a new server handler.
    pub fn new(cache: Arc<EmailCache>, service: Option<Arc<MailboxService<GmailClient>>>) -> Self {
        Self { cache, service, tool_router: Self::tool_router() }
    }

    fn service(&self) -> Result<&MailboxService<GmailClient>, McpError> {
        self.service.as_deref().ok_or_else(|| {
            Error::NotConfigured("Gmail access token not set; set MAILCACHE_GMAIL_ACCESS_TOKEN".into()).into()
        })
    }

    /// List one page of a mailbox view.
    ///
    /// Served from the page cache when fresh; otherwise fetched from Gmail and
    /// the following pages are prefetched in the background.
    #[tool(
        description = "List one page of a mailbox (inbox, important, sent, trash, spam, draft, label, search). Returns message summaries and a next_page_token."
    )]
    async fn mailbox_list(&self, params: Parameters<MailboxListParams>) -> Result<CallToolResult, McpError> {
        list_impl(self.service()?, params.0).await
    }

    #[tool(description = "Read one message (message_id) or every message of a thread (thread_id). Not cached.")]
    async fn mail_get(&self, params: Parameters<MailGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.service()?, params.0).await
    }

    #[tool(
        description = "List mailbox labels. With with_counts, also total and unread counts per label; with label_id, only that label's counts."
    )]
    async fn labels_list(&self, params: Parameters<LabelsListParams>) -> Result<CallToolResult, McpError> {
        labels_impl(self.service()?, params.0).await
    }

    #[tool(description = "Create a user label visible in the label list and message lists.")]
    async fn label_create(&self, params: Parameters<LabelCreateParams>) -> Result<CallToolResult, McpError> {
        create_impl(self.service()?, params.0).await
    }

    /// Mark, label, archive, trash or delete messages.
    #[tool(
        description = "Modify messages: mark_read, mark_unread, add_label, remove_label, archive, trash or delete. Clears the page cache."
    )]
    async fn mail_modify(&self, params: Parameters<MailModifyParams>) -> Result<CallToolResult, McpError> {
        modify_impl(self.service()?, params.0).await
    }

    #[tool(description = "Report cached page count, page ceiling, memory pressure and pending prefetches.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.cache)
    }

    #[tool(description = "Clear the page cache: one key, pages older than N seconds, or everything.")]
    async fn cache_clear(&self, params: Parameters<CacheClearParams>) -> Result<CallToolResult, McpError> {
        clear_impl(&self.cache, params.0)
    }
}

impl ServerHandler for MailcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mailcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
