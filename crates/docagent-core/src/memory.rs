// In-memory implementations for examples and testing
//
// These implementations keep all data in memory, making them suitable for:
// - The default provider-managed persistence strategy (thread mapping only)
// - Unit tests of the agent handle and the server adapter
// - Running the server without a Foundry project

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::agent::AgentDefinition;
use crate::error::{AgentError, Result};
use crate::message::{ChatMessage, Role};
use crate::thread::{AgentThread, ChatMessageStore};
use crate::traits::{
    AccessToken, ChatClient, RemoteAgent, RunOutput, RunRequest, RunUsage, ThreadRepository,
    TokenCredential,
};

// ============================================================================
// InMemoryThreadRepository - Keeps threads keyed by conversation id
// ============================================================================

/// In-memory thread repository
///
/// Stores threads in a HashMap keyed by conversation id. Threads live for the
/// process lifetime.
#[derive(Debug, Default, Clone)]
pub struct InMemoryThreadRepository {
    threads: Arc<RwLock<HashMap<String, AgentThread>>>,
}

impl InMemoryThreadRepository {
    /// Create a new in-memory thread repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations stored
    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.threads.read().await.is_empty()
    }

    /// Forget a conversation
    pub async fn remove(&self, conversation_id: &str) -> Option<AgentThread> {
        self.threads.write().await.remove(conversation_id)
    }
}

#[async_trait]
impl ThreadRepository for InMemoryThreadRepository {
    async fn get(&self, conversation_id: &str) -> Result<Option<AgentThread>> {
        Ok(self.threads.read().await.get(conversation_id).cloned())
    }

    async fn set(&self, conversation_id: &str, thread: AgentThread) -> Result<()> {
        self.threads
            .write()
            .await
            .insert(conversation_id.to_string(), thread);
        Ok(())
    }
}

// ============================================================================
// InMemoryChatMessageStore - Local transcript of one conversation
// ============================================================================

/// In-memory message store for a single conversation
#[derive(Debug, Default, Clone)]
pub struct InMemoryChatMessageStore {
    messages: Arc<RwLock<Vec<ChatMessage>>>,
}

impl InMemoryChatMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatMessageStore for InMemoryChatMessageStore {
    async fn add_messages(&self, messages: Vec<ChatMessage>) -> Result<()> {
        self.messages.write().await.extend(messages);
        Ok(())
    }

    async fn list_messages(&self) -> Result<Vec<ChatMessage>> {
        Ok(self.messages.read().await.clone())
    }
}

// ============================================================================
// StaticTokenCredential - Fixed token, counts calls
// ============================================================================

/// Credential returning a fixed token that never expires within an hour
///
/// Counts `get_token` and `close` calls so tests can check credential lifetime.
#[derive(Debug, Default)]
pub struct StaticTokenCredential {
    token: String,
    token_requests: AtomicUsize,
    closes: AtomicUsize,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_requests: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new(
            self.token.clone(),
            Utc::now() + chrono::Duration::hours(1),
        ))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// EchoChatClient - Replies with the last user message
// ============================================================================

/// Chat client that answers every run with `"Echo: <last user message>"`
///
/// Threads are tracked in memory, so a conversation's full history is visible
/// through [`EchoChatClient::thread_messages`]. Calls are counted for tests.
#[derive(Debug)]
pub struct EchoChatClient {
    model: String,
    threads: RwLock<HashMap<String, Vec<ChatMessage>>>,
    agents_created: AtomicUsize,
    agents_deleted: AtomicUsize,
    runs: AtomicUsize,
    fail_runs_with: Option<u16>,
}

impl EchoChatClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            threads: RwLock::new(HashMap::new()),
            agents_created: AtomicUsize::new(0),
            agents_deleted: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            fail_runs_with: None,
        }
    }

    /// Make every run fail with a remote error of the given status
    pub fn failing(model: impl Into<String>, status: u16) -> Self {
        Self {
            fail_runs_with: Some(status),
            ..Self::new(model)
        }
    }

    pub fn agents_created(&self) -> usize {
        self.agents_created.load(Ordering::SeqCst)
    }

    pub fn agents_deleted(&self) -> usize {
        self.agents_deleted.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn thread_messages(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for EchoChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn create_agent(&self, definition: &AgentDefinition) -> Result<RemoteAgent> {
        let n = self.agents_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RemoteAgent {
            id: format!("asst_echo_{}", n),
            name: definition.name.clone(),
            model: self.model.clone(),
        })
    }

    async fn create_thread(&self) -> Result<String> {
        let mut threads = self.threads.write().await;
        let id = format!("thread_echo_{}", threads.len() + 1);
        threads.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn run(&self, request: RunRequest<'_>) -> Result<RunOutput> {
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(status) = self.fail_runs_with {
            return Err(AgentError::remote(status, "echo client configured to fail"));
        }

        let mut threads = self.threads.write().await;
        let history = threads
            .get_mut(request.thread_id)
            .ok_or_else(|| AgentError::remote(404, format!("No thread {}", request.thread_id)))?;
        history.extend(request.messages.iter().cloned());

        let last_user = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text.clone())
            .unwrap_or_default();
        let text = format!("Echo: {}", last_user);
        history.push(ChatMessage::assistant(text.clone()));

        Ok(RunOutput {
            run_id: format!("run_echo_{}", n),
            text,
            model: Some(request.agent.model.clone()),
            usage: Some(RunUsage::default()),
        })
    }

    async fn delete_agent(&self, _agent_id: &str) -> Result<()> {
        self.agents_deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.threads.write().await.remove(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::documentation_agent;

    #[tokio::test]
    async fn test_thread_repository_round_trip() {
        let repo = InMemoryThreadRepository::new();
        assert!(repo.is_empty().await);

        repo.set("conv_1", AgentThread::with_service_thread("thread_1"))
            .await
            .unwrap();
        let thread = repo.get("conv_1").await.unwrap().unwrap();
        assert_eq!(thread.service_thread_id.as_deref(), Some("thread_1"));
        assert!(repo.get("conv_2").await.unwrap().is_none());

        repo.remove("conv_1").await;
        assert!(repo.get("conv_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_thread_repository_overwrites() {
        let repo = InMemoryThreadRepository::new();
        repo.set("conv_1", AgentThread::with_service_thread("a"))
            .await
            .unwrap();
        repo.set("conv_1", AgentThread::with_service_thread("b"))
            .await
            .unwrap();
        assert_eq!(repo.len().await, 1);
        let thread = repo.get("conv_1").await.unwrap().unwrap();
        assert_eq!(thread.service_thread_id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_message_store_keeps_order() {
        let store = InMemoryChatMessageStore::new();
        store
            .add_messages(vec![ChatMessage::user("one"), ChatMessage::assistant("two")])
            .await
            .unwrap();
        store
            .add_messages(vec![ChatMessage::user("three")])
            .await
            .unwrap();

        let texts: Vec<String> = store
            .list_messages()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_static_credential_counts() {
        let credential = StaticTokenCredential::new("abc");
        let token = credential.get_token(&["scope"]).await.unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(credential.token_requests(), 1);
        credential.close().await;
        assert_eq!(credential.close_count(), 1);
    }

    #[tokio::test]
    async fn test_echo_client_run() {
        let client = EchoChatClient::new("gpt-test");
        let agent = client.create_agent(&documentation_agent()).await.unwrap();
        let thread_id = client.create_thread().await.unwrap();
        let messages = vec![ChatMessage::user("hello")];

        let output = client
            .run(RunRequest {
                agent: &agent,
                thread_id: &thread_id,
                messages: &messages,
                tools: &[],
            })
            .await
            .unwrap();

        assert_eq!(output.text, "Echo: hello");
        assert_eq!(client.thread_messages(&thread_id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_echo_client_unknown_thread() {
        let client = EchoChatClient::new("gpt-test");
        let agent = client.create_agent(&documentation_agent()).await.unwrap();

        let result = client
            .run(RunRequest {
                agent: &agent,
                thread_id: "missing",
                messages: &[],
                tools: &[],
            })
            .await;
        assert!(matches!(result, Err(AgentError::Remote { status: 404, .. })));
    }
}
