//! labels_list and label_create tool implementations.

use mailcache_core::cache::{Label, LabelCounts};
use mailcache_core::mailbox::{MailProvider, MailboxService};
use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for labels_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LabelsListParams {
    /// Only report counts for this label.
    #[serde(default)]
    pub label_id: Option<String>,

    /// Also report total and unread counts for every label.
    #[serde(default)]
    pub with_counts: bool,
}

/// Output structure for labels_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LabelsListOutput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub counts: Vec<LabelCounts>,
}

/// Input parameters for label_create tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LabelCreateParams {
    /// Display name of the new label.
    pub name: String,
}

/// Implementation of the labels_list tool.
pub async fn labels_impl<P>(service: &MailboxService<P>, params: LabelsListParams) -> Result<CallToolResult, McpError>
where
    P: MailProvider + 'static,
{
    let output = match params.label_id {
        Some(label_id) => LabelsListOutput { labels: Vec::new(), counts: vec![service.label_counts(&label_id).await?] },
        None => {
            let labels = service.list_labels().await?;
            let counts = if params.with_counts { service.all_label_counts().await? } else { Vec::new() };
            LabelsListOutput { labels, counts }
        }
    };

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&output).unwrap_or_default(),
    )]))
}

/// Implementation of the label_create tool.
pub async fn create_impl<P>(service: &MailboxService<P>, params: LabelCreateParams) -> Result<CallToolResult, McpError>
where
    P: MailProvider + 'static,
{
    let label = service.create_label(&params.name).await?;
    tracing::info!(label = %label.id, "created label");

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&label).unwrap_or_default(),
    )]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{FakeProvider, output_json, service};

    #[tokio::test]
    async fn test_list_without_counts() {
        let svc = service(FakeProvider::default());

        let output = output_json(&labels_impl(&svc, LabelsListParams::default()).await.unwrap());

        assert_eq!(output["labels"][0]["id"], "INBOX");
        assert_eq!(output["labels"][1]["type"], "user");
        assert!(output.get("counts").is_none());
    }

    #[tokio::test]
    async fn test_list_with_counts() {
        let svc = service(FakeProvider::default());
        let params = LabelsListParams { with_counts: true, ..Default::default() };

        let output = output_json(&labels_impl(&svc, params).await.unwrap());

        assert_eq!(output["counts"].as_array().unwrap().len(), 2);
        assert_eq!(output["counts"][0]["unread"], 1);
    }

    #[tokio::test]
    async fn test_counts_for_one_label() {
        let svc = service(FakeProvider::default());
        let params = LabelsListParams { label_id: Some("Label_3".into()), ..Default::default() };

        let output = output_json(&labels_impl(&svc, params).await.unwrap());

        assert_eq!(output["counts"][0]["label_id"], "Label_3");
        assert!(output.get("labels").is_none());
    }

    #[tokio::test]
    async fn test_create_label() {
        let svc = service(FakeProvider::default());

        let output = output_json(&create_impl(&svc, LabelCreateParams { name: "Receipts".into() }).await.unwrap());
        assert_eq!(output["name"], "Receipts");

        assert!(create_impl(&svc, LabelCreateParams { name: " ".into() }).await.is_err());
    }
}
