// Agent serving protocol contracts
//
// Responses-style request/response bodies. A request carries the new input
// and, optionally, the conversation to continue; the response carries the
// assistant's output and the conversation id to send next time.

use chrono::Utc;
use docagent_core::{AgentResponse, ChatMessage, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================
// Request
// ============================================

/// Request to run the agent
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateResponseRequest {
    /// New input: plain text, or a list of role-tagged messages
    pub input: ResponseInput,
    /// Conversation to continue; a new one is started when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationRef>,
    /// Stream the response as server-sent events
    #[serde(default)]
    pub stream: bool,
    /// Caller metadata, echoed back on the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Request input
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ResponseInput {
    /// A single user message
    Text(String),
    /// Messages in order
    Items(Vec<InputItem>),
}

/// One input message
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InputItem {
    /// `user`, `assistant`, `system` or `developer`
    #[serde(default = "default_role")]
    #[schema(example = "user")]
    pub role: String,
    pub content: InputContent,
}

fn default_role() -> String {
    "user".to_string()
}

/// Message content: text, or text parts
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum InputContent {
    Text(String),
    Parts(Vec<InputContentPart>),
}

/// A content part; only text parts contribute to the message
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InputContentPart {
    /// `input_text`, `output_text` or `text`
    #[serde(rename = "type")]
    #[schema(example = "input_text")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Conversation reference: bare id or `{ "id": ... }`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ConversationRef {
    Id(String),
    Object { id: String },
}

impl ConversationRef {
    pub fn id(&self) -> &str {
        match self {
            ConversationRef::Id(id) | ConversationRef::Object { id } => id,
        }
    }
}

impl InputContent {
    fn text(&self) -> String {
        match self {
            InputContent::Text(text) => text.clone(),
            InputContent::Parts(parts) => parts
                .iter()
                .filter(|part| matches!(part.kind.as_str(), "input_text" | "output_text" | "text"))
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl ResponseInput {
    /// Convert to chat messages, dropping blank ones.
    ///
    /// Fails on an unknown role.
    pub fn to_messages(&self) -> Result<Vec<ChatMessage>, String> {
        let messages = match self {
            ResponseInput::Text(text) => vec![ChatMessage::user(text.clone())],
            ResponseInput::Items(items) => items
                .iter()
                .map(|item| {
                    let role: Role = item.role.parse()?;
                    Ok(ChatMessage::new(role, item.content.text()))
                })
                .collect::<Result<Vec<_>, String>>()?,
        };

        Ok(messages
            .into_iter()
            .filter(|message| !message.text.trim().is_empty())
            .collect())
    }
}

impl CreateResponseRequest {
    /// Text-only request (for tests and clients)
    pub fn text(input: impl Into<String>) -> Self {
        Self {
            input: ResponseInput::Text(input.into()),
            conversation: None,
            stream: false,
            metadata: None,
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation = Some(ConversationRef::Id(conversation_id.into()));
        self
    }
}

// ============================================
// Response
// ============================================

/// Response lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    InProgress,
    Completed,
    Failed,
}

/// Agent response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResponseObject {
    #[schema(example = "resp_0193a1b2c3d4")]
    pub id: String,
    /// Always `response`
    pub object: String,
    /// Unix seconds
    pub created_at: i64,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub output: Vec<OutputItem>,
    pub conversation: ConversationObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResponseUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Output message
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OutputItem {
    /// Always `message`
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    /// Always `assistant`
    pub role: String,
    pub status: ResponseStatus,
    pub content: Vec<OutputContent>,
}

/// Output text part
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OutputContent {
    /// Always `output_text`
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationObject {
    pub id: String,
}

/// Token usage of the run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ResponseUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Error carried by a failed response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResponseError {
    #[schema(example = "server_error")]
    pub code: String,
    pub message: String,
}

/// New response id
pub fn response_id() -> String {
    format!("resp_{}", Uuid::now_v7().simple())
}

/// New conversation id
pub fn conversation_id() -> String {
    format!("conv_{}", Uuid::now_v7().simple())
}

/// New output item id
pub fn message_id() -> String {
    format!("msg_{}", Uuid::now_v7().simple())
}

impl ResponseObject {
    /// Empty response for a run that has just started
    pub fn in_progress(
        id: String,
        conversation_id: String,
        model: Option<String>,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Self {
        Self {
            id,
            object: "response".to_string(),
            created_at: Utc::now().timestamp(),
            status: ResponseStatus::InProgress,
            model,
            output: Vec::new(),
            conversation: ConversationObject {
                id: conversation_id,
            },
            usage: None,
            error: None,
            metadata,
        }
    }

    /// Fill in the agent's answer
    pub fn complete(mut self, item_id: String, response: AgentResponse) -> Self {
        self.status = ResponseStatus::Completed;
        if response.model.is_some() {
            self.model = response.model;
        }
        self.usage = response.usage.map(|usage| ResponseUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        });
        self.output = vec![OutputItem {
            kind: "message".to_string(),
            id: item_id,
            role: "assistant".to_string(),
            status: ResponseStatus::Completed,
            content: vec![OutputContent {
                kind: "output_text".to_string(),
                text: response.text,
            }],
        }];
        self
    }

    pub fn fail(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.status = ResponseStatus::Failed;
        self.error = Some(ResponseError {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    /// Concatenated output text
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .flat_map(|item| item.content.iter())
            .map(|content| content.text.as_str())
            .collect()
    }
}

// ============================================
// Streaming events
// ============================================

/// Server-sent event payloads, in emission order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "response.created")]
    Created {
        sequence_number: u64,
        response: ResponseObject,
    },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        sequence_number: u64,
        item_id: String,
        output_index: u32,
        content_index: u32,
        delta: String,
    },
    #[serde(rename = "response.output_text.done")]
    OutputTextDone {
        sequence_number: u64,
        item_id: String,
        output_index: u32,
        content_index: u32,
        text: String,
    },
    #[serde(rename = "response.completed")]
    Completed {
        sequence_number: u64,
        response: ResponseObject,
    },
    #[serde(rename = "response.failed")]
    Failed {
        sequence_number: u64,
        response: ResponseObject,
    },
}

impl StreamEvent {
    /// SSE `event:` name
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::Created { .. } => "response.created",
            StreamEvent::OutputTextDelta { .. } => "response.output_text.delta",
            StreamEvent::OutputTextDone { .. } => "response.output_text.done",
            StreamEvent::Completed { .. } => "response.completed",
            StreamEvent::Failed { .. } => "response.failed",
        }
    }
}
