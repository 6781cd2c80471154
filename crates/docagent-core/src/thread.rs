// Agent threads and per-conversation message stores
//
// A thread is either bound to a service-side thread (the provider keeps the
// history) or carries a local message store created by the agent's factory,
// or both.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::message::ChatMessage;

/// Local record of the messages of one conversation
#[async_trait]
pub trait ChatMessageStore: Send + Sync {
    /// Append messages in order
    async fn add_messages(&self, messages: Vec<ChatMessage>) -> Result<()>;

    /// All messages, oldest first
    async fn list_messages(&self) -> Result<Vec<ChatMessage>>;
}

/// Zero-argument constructor for a fresh message store
pub type MessageStoreFactory = Arc<dyn Fn() -> Arc<dyn ChatMessageStore> + Send + Sync>;

/// Conversation state carried between runs
#[derive(Clone, Default)]
pub struct AgentThread {
    /// Thread id assigned by the agents service, once created
    pub service_thread_id: Option<String>,
    /// Local transcript, when the agent was given a message store factory
    pub message_store: Option<Arc<dyn ChatMessageStore>>,
}

impl AgentThread {
    /// A thread with no history anywhere
    pub fn new() -> Self {
        Self::default()
    }

    /// A thread continuing an existing service-side thread
    pub fn with_service_thread(id: impl Into<String>) -> Self {
        Self {
            service_thread_id: Some(id.into()),
            message_store: None,
        }
    }

    pub fn with_message_store(mut self, store: Arc<dyn ChatMessageStore>) -> Self {
        self.message_store = Some(store);
        self
    }

    /// True when the thread has not been bound to any history yet
    pub fn is_blank(&self) -> bool {
        self.service_thread_id.is_none() && self.message_store.is_none()
    }
}

impl std::fmt::Debug for AgentThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentThread")
            .field("service_thread_id", &self.service_thread_id)
            .field("has_message_store", &self.message_store.is_some())
            .finish()
    }
}
