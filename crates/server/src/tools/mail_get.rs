//! mail_get tool implementation.
//!
//! Reads one message or a whole thread. Neither is cached.

use mailcache_core::Error;
use mailcache_core::cache::EmailSummary;
use mailcache_core::mailbox::{MailProvider, MailboxService};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for mail_get tool. Exactly one id must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MailGetParams {
    /// Message to read.
    #[serde(default)]
    pub message_id: Option<String>,

    /// Thread to read, every message oldest first.
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Output structure for mail_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MailGetOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub emails: Vec<EmailSummary>,
}

/// Implementation of the mail_get tool.
pub async fn get_impl<P>(service: &MailboxService<P>, params: MailGetParams) -> Result<CallToolResult, McpError>
where
    P: MailProvider + 'static,
{
    let output = match (params.message_id, params.thread_id) {
        (Some(id), None) => MailGetOutput { thread_id: None, emails: vec![service.get_email(&id).await?] },
        (None, Some(thread_id)) => {
            let emails = service.get_thread(&thread_id).await?;
            MailGetOutput { thread_id: Some(thread_id), emails }
        }
        _ => {
            return Err(Error::InvalidInput("set exactly one of message_id or thread_id".into()).into());
        }
    };

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&output).unwrap_or_default(),
    )]))
}
