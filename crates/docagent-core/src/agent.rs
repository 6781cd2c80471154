// Agent definition and runtime handle
//
// AgentDefinition is the immutable description (name, instructions, tools,
// optional message store factory). ChatAgent binds a definition to a chat
// client and runs it on threads. The instructions are a soft constraint for
// the remote model; nothing here checks the output against them.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::error::{AgentError, Result};
use crate::message::ChatMessage;
use crate::semconv::gen_ai;
use crate::thread::{AgentThread, ChatMessageStore, MessageStoreFactory};
use crate::tools::{microsoft_learn_tool, ToolDescriptor};
use crate::traits::{ChatClient, RemoteAgent, RunRequest, RunUsage};

/// Display name of the documentation agent
pub const DOCUMENTATION_AGENT_NAME: &str = "Microsoft Documentation Agent";

/// Instructions of the documentation agent
pub const DOCUMENTATION_AGENT_INSTRUCTIONS: &str = "You are an agent, which can use its MCP documentation tool to answer end user questions about Microsoft products. Limit your response to 2 paragraphs.";

/// Immutable description of an agent
#[derive(Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub instructions: String,
    /// Tools, unique by name
    pub tools: Vec<ToolDescriptor>,
    pub message_store_factory: Option<MessageStoreFactory>,
}

impl AgentDefinition {
    pub fn builder(name: impl Into<String>) -> AgentDefinitionBuilder {
        AgentDefinitionBuilder::new(name)
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name() == name)
    }
}

impl std::fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("instructions", &self.instructions)
            .field("tools", &self.tools)
            .field(
                "message_store_factory",
                &self.message_store_factory.as_ref().map(|_| "<factory>"),
            )
            .finish()
    }
}

/// Builder for AgentDefinition with fluent API
pub struct AgentDefinitionBuilder {
    definition: AgentDefinition,
}

impl AgentDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            definition: AgentDefinition {
                name: name.into(),
                instructions: String::new(),
                tools: Vec::new(),
                message_store_factory: None,
            },
        }
    }

    /// Set the instructions
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.definition.instructions = instructions.into();
        self
    }

    /// Add a tool; a tool with the same name is replaced
    pub fn tool(mut self, tool: impl Into<ToolDescriptor>) -> Self {
        let tool = tool.into();
        self.definition.tools.retain(|t| t.name() != tool.name());
        self.definition.tools.push(tool);
        self
    }

    /// Create a fresh message store for every new thread
    pub fn message_store_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn ChatMessageStore> + Send + Sync + 'static,
    {
        self.definition.message_store_factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> AgentDefinition {
        self.definition
    }
}

/// The Microsoft documentation agent with its single Learn MCP tool
pub fn documentation_agent() -> AgentDefinition {
    AgentDefinition::builder(DOCUMENTATION_AGENT_NAME)
        .instructions(DOCUMENTATION_AGENT_INSTRUCTIONS)
        .tool(microsoft_learn_tool())
        .build()
}

/// What happens to the service-side agent registration after use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Register once and keep the registration for every later request (default)
    #[default]
    Keep,
    /// Register for each run and delete the registration afterwards
    Delete,
}

impl CleanupPolicy {
    pub fn from_flag(should_cleanup: bool) -> Self {
        if should_cleanup {
            CleanupPolicy::Delete
        } else {
            CleanupPolicy::Keep
        }
    }
}

/// Response of one agent run
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub run_id: String,
    pub text: String,
    pub thread_id: String,
    pub model: Option<String>,
    pub usage: Option<RunUsage>,
}

/// Runtime handle binding a definition to a chat client
pub struct ChatAgent {
    definition: AgentDefinition,
    client: Arc<dyn ChatClient>,
    cleanup: CleanupPolicy,
    registration: Mutex<Option<RemoteAgent>>,
}

impl ChatAgent {
    pub fn new(
        client: Arc<dyn ChatClient>,
        definition: AgentDefinition,
        cleanup: CleanupPolicy,
    ) -> Self {
        Self {
            definition,
            client,
            cleanup,
            registration: Mutex::new(None),
        }
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn instructions(&self) -> &str {
        &self.definition.instructions
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.definition.tools
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        self.cleanup
    }

    /// A blank thread, with a fresh message store when the definition has a factory
    pub fn get_new_thread(&self) -> AgentThread {
        let thread = AgentThread::new();
        match &self.definition.message_store_factory {
            Some(factory) => thread.with_message_store(factory()),
            None => thread,
        }
    }

    /// Id of the kept registration, if the agent was registered
    pub async fn registered_id(&self) -> Option<String> {
        self.registration.lock().await.as_ref().map(|a| a.id.clone())
    }

    /// Release the handle on shutdown.
    ///
    /// A kept registration stays alive on the service; only the local handle
    /// is dropped. Returns the id that was released.
    pub async fn close(&self) -> Option<String> {
        let released = self.registration.lock().await.take();
        if let Some(agent) = &released {
            tracing::info!(agent_id = %agent.id, "Leaving agent registration in place");
        }
        released.map(|agent| agent.id)
    }

    /// Delete the thread's service-side thread, if it has one.
    ///
    /// The thread is left blank so it is not reused.
    pub async fn release_thread(&self, thread: &mut AgentThread) -> Result<()> {
        if let Some(thread_id) = thread.service_thread_id.take() {
            self.client.delete_thread(&thread_id).await?;
            tracing::debug!(thread_id = %thread_id, "Released service thread");
        }
        Ok(())
    }

    /// Registration to run with. Kept registrations are created once.
    async fn acquire_registration(&self) -> Result<RemoteAgent> {
        if self.cleanup == CleanupPolicy::Delete {
            return self.client.create_agent(&self.definition).await;
        }

        let mut registration = self.registration.lock().await;
        if let Some(agent) = registration.as_ref() {
            return Ok(agent.clone());
        }

        let agent = self.client.create_agent(&self.definition).await?;
        tracing::info!(
            agent_id = %agent.id,
            agent_name = %agent.name,
            model = %agent.model,
            "Registered agent"
        );
        *registration = Some(agent.clone());
        Ok(agent)
    }

    /// Run the agent on `thread` with new `messages`.
    ///
    /// A thread without a service thread gets one; the thread is updated in
    /// place so the caller can persist it.
    pub async fn run(
        &self,
        messages: Vec<ChatMessage>,
        thread: &mut AgentThread,
    ) -> Result<AgentResponse> {
        if messages.is_empty() {
            return Err(AgentError::invalid("at least one message is required"));
        }

        let agent = self.acquire_registration().await?;

        let result = self.run_registered(&agent, messages, thread).await;

        if self.cleanup == CleanupPolicy::Delete {
            if let Err(e) = self.client.delete_agent(&agent.id).await {
                tracing::warn!(agent_id = %agent.id, error = %e, "Failed to delete agent");
            }
        }

        result
    }

    async fn run_registered(
        &self,
        agent: &RemoteAgent,
        messages: Vec<ChatMessage>,
        thread: &mut AgentThread,
    ) -> Result<AgentResponse> {
        let thread_id = match &thread.service_thread_id {
            Some(id) => id.clone(),
            None => {
                let id = self.client.create_thread().await?;
                thread.service_thread_id = Some(id.clone());
                id
            }
        };

        if thread.message_store.is_none() {
            if let Some(factory) = &self.definition.message_store_factory {
                thread.message_store = Some(factory());
            }
        }

        let span = tracing::info_span!(
            "gen_ai.invoke_agent",
            "gen_ai.operation.name" = gen_ai::operation::INVOKE_AGENT,
            "gen_ai.agent.id" = %agent.id,
            "gen_ai.agent.name" = %agent.name,
            "gen_ai.conversation.id" = %thread_id,
        );

        let output = self
            .client
            .run(RunRequest {
                agent,
                thread_id: &thread_id,
                messages: &messages,
                tools: &self.definition.tools,
            })
            .instrument(span)
            .await?;

        if let Some(store) = &thread.message_store {
            let mut transcript = messages;
            transcript.push(ChatMessage::assistant(output.text.clone()));
            store.add_messages(transcript).await?;
        }

        tracing::debug!(
            run_id = %output.run_id,
            chars = output.text.len(),
            "Agent run completed"
        );

        Ok(AgentResponse {
            run_id: output.run_id,
            text: output.text,
            thread_id,
            model: output.model,
            usage: output.usage,
        })
    }
}

impl std::fmt::Debug for ChatAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAgent")
            .field("definition", &self.definition)
            .field("model", &self.client.model())
            .field("cleanup", &self.cleanup)
            .finish()
    }
}
