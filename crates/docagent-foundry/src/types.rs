// Foundry Agents REST API wire types
//
// Only the fields the client reads or writes are modelled; everything else
// in the service payloads is ignored on deserialization.

use docagent_core::{HostedMcpTool, ToolDescriptor};
use serde::{Deserialize, Serialize};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct CreateAgentRequest<'a> {
    pub model: &'a str,
    pub name: &'a str,
    pub instructions: &'a str,
    pub tools: Vec<FoundryTool>,
}

/// Tool definition as registered with the service
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum FoundryTool {
    Mcp {
        server_label: String,
        server_url: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        allowed_tools: Vec<String>,
    },
}

impl From<&ToolDescriptor> for FoundryTool {
    fn from(tool: &ToolDescriptor) -> Self {
        match tool {
            ToolDescriptor::HostedMcp(mcp) => FoundryTool::Mcp {
                server_label: mcp.server_label(),
                server_url: mcp.url.clone(),
                allowed_tools: mcp.allowed_tools.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateMessageRequest<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_resources: Option<ToolResources>,
}

/// Per-run tool settings
#[derive(Debug, Serialize)]
pub(crate) struct ToolResources {
    pub mcp: Vec<McpToolResource>,
}

#[derive(Debug, Serialize)]
pub(crate) struct McpToolResource {
    pub server_label: String,
    pub require_approval: &'static str,
}

impl ToolResources {
    /// Approval policy of every MCP tool, or None when there are none
    pub fn for_tools(tools: &[ToolDescriptor]) -> Option<Self> {
        let mcp: Vec<McpToolResource> = tools
            .iter()
            .map(|tool| match tool {
                ToolDescriptor::HostedMcp(mcp) => McpToolResource::from(mcp),
            })
            .collect();
        (!mcp.is_empty()).then_some(ToolResources { mcp })
    }
}

impl From<&HostedMcpTool> for McpToolResource {
    fn from(tool: &HostedMcpTool) -> Self {
        McpToolResource {
            server_label: tool.server_label(),
            require_approval: tool.approval_mode.as_service_value(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitToolApprovalsRequest {
    pub tool_approvals: Vec<ToolApproval>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolApproval {
    pub tool_call_id: String,
    pub approve: bool,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct AgentObject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThreadObject {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunObject {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<UsageObject>,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<ErrorObject>,
}

/// Run lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled | RunStatus::Failed | RunStatus::Completed | RunStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct UsageObject {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RequiredAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_approval: Option<SubmitToolApproval>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitToolApproval {
    #[serde(default)]
    pub tool_calls: Vec<ApprovalToolCall>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalToolCall {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub server_label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorObject {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Error envelope on non-success responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorObject,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageList {
    #[serde(default)]
    pub data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThreadMessage {
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum MessageContent {
    Text {
        text: TextContent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextContent {
    pub value: String,
}

impl ThreadMessage {
    /// Concatenated text parts of the message
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docagent_core::{microsoft_learn_tool, ApprovalMode};
    use serde_json::json;

    #[test]
    fn test_mcp_tool_wire_shape() {
        let tool = FoundryTool::from(&microsoft_learn_tool());
        assert_eq!(
            serde_json::to_value(&tool).unwrap(),
            json!({
                "type": "mcp",
                "server_label": "Microsoft_Learn_MCP",
                "server_url": "https://learn.microsoft.com/api/mcp"
            })
        );
    }

    #[test]
    fn test_tool_resources_carry_approval() {
        let tools = vec![
            microsoft_learn_tool(),
            HostedMcpTool::new("Gated", "https://example.com/mcp")
                .with_approval_mode(ApprovalMode::AlwaysRequire)
                .into(),
        ];
        let resources = ToolResources::for_tools(&tools).unwrap();
        assert_eq!(
            serde_json::to_value(&resources).unwrap(),
            json!({
                "mcp": [
                    {"server_label": "Microsoft_Learn_MCP", "require_approval": "never"},
                    {"server_label": "Gated", "require_approval": "always"}
                ]
            })
        );
        assert!(ToolResources::for_tools(&[]).is_none());
    }

    #[test]
    fn test_run_status_parsing() {
        let run: RunObject =
            serde_json::from_value(json!({"id": "run_1", "status": "in_progress"})).unwrap();
        assert_eq!(run.status, RunStatus::InProgress);
        assert!(!run.status.is_terminal());

        let run: RunObject =
            serde_json::from_value(json!({"id": "run_1", "status": "brand_new"})).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
    }

    #[test]
    fn test_message_text_skips_non_text_parts() {
        let message: ThreadMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": [
                {"type": "image_file", "image_file": {"file_id": "f"}},
                {"type": "text", "text": {"value": "Hello", "annotations": []}}
            ]
        }))
        .unwrap();
        assert_eq!(message.text(), "Hello");
    }
}
