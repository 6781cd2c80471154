// Tool descriptors attached to an agent definition
//
// Tools are hosted elsewhere; the agent only declares them. Execution and the
// MCP message shapes are owned by the remote service.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Name of the documentation lookup tool
pub const MICROSOFT_LEARN_TOOL_NAME: &str = "Microsoft Learn MCP";

/// URL of the documentation lookup tool
pub const MICROSOFT_LEARN_TOOL_URL: &str = "https://learn.microsoft.com/api/mcp";

/// Whether invoking a tool needs human confirmation first
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// The agent may call the tool on its own
    #[default]
    NeverRequire,
    /// Every call waits for a human to approve it
    AlwaysRequire,
}

impl ApprovalMode {
    /// Value of `require_approval` understood by the agents service
    pub fn as_service_value(&self) -> &'static str {
        match self {
            ApprovalMode::NeverRequire => "never",
            ApprovalMode::AlwaysRequire => "always",
        }
    }
}

impl std::str::FromStr for ApprovalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "never_require" | "never" => Ok(ApprovalMode::NeverRequire),
            "always_require" | "always" => Ok(ApprovalMode::AlwaysRequire),
            _ => Err(format!(
                "Unknown approval mode: {}. Use 'never_require' or 'always_require'",
                s
            )),
        }
    }
}

/// A tool served by a remote MCP server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HostedMcpTool {
    /// Display name, also used to derive the server label
    pub name: String,
    /// MCP server URL
    pub url: String,
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    /// Restrict the agent to these tool names; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
}

impl HostedMcpTool {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            approval_mode: ApprovalMode::default(),
            allowed_tools: Vec::new(),
        }
    }

    pub fn with_approval_mode(mut self, approval_mode: ApprovalMode) -> Self {
        self.approval_mode = approval_mode;
        self
    }

    pub fn with_allowed_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.allowed_tools = tools.into_iter().collect();
        self
    }

    /// Server label accepted by the service: `[A-Za-z0-9_-]`, other characters become `_`
    pub fn server_label(&self) -> String {
        self.name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

/// Tool descriptor in an agent definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDescriptor {
    /// Tool exposed by a remote MCP server
    HostedMcp(HostedMcpTool),
}

impl ToolDescriptor {
    pub fn name(&self) -> &str {
        match self {
            ToolDescriptor::HostedMcp(tool) => &tool.name,
        }
    }

    pub fn approval_mode(&self) -> ApprovalMode {
        match self {
            ToolDescriptor::HostedMcp(tool) => tool.approval_mode,
        }
    }
}

impl From<HostedMcpTool> for ToolDescriptor {
    fn from(tool: HostedMcpTool) -> Self {
        ToolDescriptor::HostedMcp(tool)
    }
}

/// The Microsoft Learn documentation lookup tool, callable without approval
pub fn microsoft_learn_tool() -> ToolDescriptor {
    HostedMcpTool::new(MICROSOFT_LEARN_TOOL_NAME, MICROSOFT_LEARN_TOOL_URL)
        .with_approval_mode(ApprovalMode::NeverRequire)
        .into()
}
