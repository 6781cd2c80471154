// Core traits for pluggable backends
//
// These traits let the agent handle and the server adapter run against:
// - The Foundry agents service and Azure identity (production)
// - In-memory implementations (examples and tests)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::agent::AgentDefinition;
use crate::error::Result;
use crate::message::ChatMessage;
use crate::thread::AgentThread;
use crate::tools::ToolDescriptor;

// ============================================================================
// TokenCredential - For bearer tokens against the identity domain
// ============================================================================

/// Bearer token with its expiry
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// True when the token is expired or expires within `window`
    pub fn expires_within(&self, window: Duration) -> bool {
        let window =
            chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(365));
        Utc::now() + window >= self.expires_on
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Trait for credentials that can produce bearer tokens on demand
///
/// Implementations handle their own refresh. `close` releases whatever the
/// credential holds (cached tokens, sessions); it is called once when a
/// scoped credential leaves its scope.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Get a token valid for the given scopes
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken>;

    /// Release held resources
    async fn close(&self) {}
}

#[async_trait]
impl<T: TokenCredential + ?Sized> TokenCredential for std::sync::Arc<T> {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        (**self).get_token(scopes).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

// ============================================================================
// ChatClient - For the remote agents service
// ============================================================================

/// Agent registration on the service side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAgent {
    pub id: String,
    pub name: String,
    pub model: String,
}

/// One run of a registered agent on a service thread
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub agent: &'a RemoteAgent,
    pub thread_id: &'a str,
    /// New messages to append to the thread before running
    pub messages: &'a [ChatMessage],
    /// Tool descriptors, for their approval policies
    pub tools: &'a [ToolDescriptor],
}

/// Token usage reported for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub run_id: String,
    /// Assistant text produced by the run
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<RunUsage>,
}

/// Trait for chat clients bound to one model deployment
///
/// Implementations talk to an agents service: register agents, create
/// threads, run agents on threads, and delete what they created.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Model deployment the client is bound to
    fn model(&self) -> &str;

    /// Register an agent for the definition
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<RemoteAgent>;

    /// Create an empty service-side thread
    async fn create_thread(&self) -> Result<String>;

    /// Append the request's messages and run the agent to completion
    async fn run(&self, request: RunRequest<'_>) -> Result<RunOutput>;

    /// Delete an agent registration
    async fn delete_agent(&self, agent_id: &str) -> Result<()>;

    /// Delete a service-side thread
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;
}

// ============================================================================
// ThreadRepository - For conversation persistence
// ============================================================================

/// Trait for storing threads by conversation id
///
/// Implementations can:
/// - Keep threads in memory for the process lifetime
/// - Discard everything (stateless serving)
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// Thread previously stored for the conversation, if any
    async fn get(&self, conversation_id: &str) -> Result<Option<AgentThread>>;

    /// Store the thread for the conversation
    async fn set(&self, conversation_id: &str, thread: AgentThread) -> Result<()>;

    /// Whether stored threads are ever returned again. A repository that
    /// discards them leaves the service-side thread to the caller.
    fn retains_threads(&self) -> bool {
        true
    }
}
