//! mail_modify tool implementation.
//!
//! Applies a label change, trash or delete to a batch of messages. Label
//! changes clear the page cache once they succeed; trash and delete clear it
//! even when a later message fails.

use mailcache_core::Error;
use mailcache_core::mailbox::{MailProvider, MailboxService};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Change to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MailAction {
    MarkRead,
    MarkUnread,
    AddLabel,
    RemoveLabel,
    Archive,
    Trash,
    Delete,
}

impl MailAction {
    fn needs_label(self) -> bool {
        matches!(self, MailAction::AddLabel | MailAction::RemoveLabel)
    }
}

/// Input parameters for mail_modify tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MailModifyParams {
    pub action: MailAction,

    /// Message ids to change (at least one).
    pub message_ids: Vec<String>,

    /// Label to add or remove. Required for add_label and remove_label.
    #[serde(default)]
    pub label_id: Option<String>,
}

/// Output structure for mail_modify tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MailModifyOutput {
    pub action: MailAction,
    /// Number of messages changed.
    pub modified: usize,
    /// Pages dropped from the cache.
    pub invalidated: usize,
}

/// Implementation of the mail_modify tool.
pub async fn modify_impl<P>(service: &MailboxService<P>, params: MailModifyParams) -> Result<CallToolResult, McpError>
where
    P: MailProvider + 'static,
{
    let label = match (params.action.needs_label(), params.label_id.as_deref()) {
        (true, Some(label)) => label,
        (true, None) => return Err(Error::InvalidInput("label_id is required for this action".into()).into()),
        (false, _) => "",
    };

    let ids = &params.message_ids;
    let invalidated = service.cache().len();

    match params.action {
        MailAction::MarkRead => service.mark_as_read(ids).await?,
        MailAction::MarkUnread => service.mark_as_unread(ids).await?,
        MailAction::AddLabel => service.add_label(ids, label).await?,
        MailAction::RemoveLabel => service.remove_label(ids, label).await?,
        MailAction::Archive => service.archive(ids).await?,
        MailAction::Trash => service.trash(ids).await?,
        MailAction::Delete => service.delete(ids).await?,
    }

    tracing::info!(action = ?params.action, count = ids.len(), "modified messages");

    let output = MailModifyOutput { action: params.action, modified: ids.len(), invalidated };

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&output).unwrap_or_default(),
    )]))
}
