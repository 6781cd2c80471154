// Hosted documentation agent: core abstractions
//
// This crate defines what the agent is and the seams it runs through. The
// agents service, identity provider and HTTP adapter live in other crates.
//
// Key design decisions:
// - ChatClient, ThreadRepository and TokenCredential are traits so the
//   Foundry implementations can be swapped for in-memory ones in tests
// - Configuration absence is reported, never fatal at read time
// - Semantic attribute names live in an owned registry instead of a global
// - Credential lifetime, cleanup policy and persistence mode are explicit options

pub mod agent;
pub mod config;
pub mod credential;
pub mod error;
pub mod message;
pub mod persistence;
pub mod semconv;
pub mod thread;
pub mod tools;
pub mod traits;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use agent::{
    documentation_agent, AgentDefinition, AgentDefinitionBuilder, AgentResponse, ChatAgent,
    CleanupPolicy, DOCUMENTATION_AGENT_INSTRUCTIONS, DOCUMENTATION_AGENT_NAME,
};
pub use config::{read_config, ConfigStatus, FoundryConfig};
pub use credential::{with_scoped_credential, CredentialLifetime};
pub use error::{AgentError, Result};
pub use message::{ChatMessage, Role};
pub use persistence::{create_thread_repository, NoopThreadRepository, PersistenceMode};
pub use semconv::SemanticAttributes;
pub use thread::{AgentThread, ChatMessageStore, MessageStoreFactory};
pub use tools::{microsoft_learn_tool, ApprovalMode, HostedMcpTool, ToolDescriptor};
pub use traits::{
    AccessToken, ChatClient, RemoteAgent, RunOutput, RunRequest, RunUsage, ThreadRepository,
    TokenCredential,
};
