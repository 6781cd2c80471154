// Thread persistence strategies
//
// `Provider` keeps a conversation id → service thread mapping in memory so
// the provider-held history carries across requests. `Stateless` forgets
// every conversation: each request starts from a blank thread.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::memory::InMemoryThreadRepository;
use crate::thread::AgentThread;
use crate::traits::ThreadRepository;

/// Which thread persistence strategy the server uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Conversations continue on their service-side thread (default)
    #[default]
    Provider,
    /// Every request starts a new conversation
    Stateless,
}

impl std::str::FromStr for PersistenceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "provider" | "stateful" | "default" | "" => Ok(PersistenceMode::Provider),
            "stateless" | "noop" | "none" => Ok(PersistenceMode::Stateless),
            _ => anyhow::bail!(
                "Unknown persistence mode: {}. Use 'provider' or 'stateless'",
                s
            ),
        }
    }
}

impl std::fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceMode::Provider => write!(f, "provider"),
            PersistenceMode::Stateless => write!(f, "stateless"),
        }
    }
}

/// Create the thread repository for a persistence mode
pub fn create_thread_repository(mode: PersistenceMode) -> Arc<dyn ThreadRepository> {
    match mode {
        PersistenceMode::Provider => Arc::new(InMemoryThreadRepository::new()),
        PersistenceMode::Stateless => Arc::new(NoopThreadRepository),
    }
}

/// Repository that never returns a thread and discards everything stored
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopThreadRepository;

#[async_trait]
impl ThreadRepository for NoopThreadRepository {
    async fn get(&self, _conversation_id: &str) -> Result<Option<AgentThread>> {
        Ok(None)
    }

    async fn set(&self, conversation_id: &str, _thread: AgentThread) -> Result<()> {
        tracing::trace!(conversation_id = %conversation_id, "Discarding thread");
        Ok(())
    }

    fn retains_threads(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_mode_parse() {
        assert_eq!(
            "provider".parse::<PersistenceMode>().unwrap(),
            PersistenceMode::Provider
        );
        assert_eq!(
            "".parse::<PersistenceMode>().unwrap(),
            PersistenceMode::Provider
        );
        assert_eq!(
            "Stateless".parse::<PersistenceMode>().unwrap(),
            PersistenceMode::Stateless
        );
        assert_eq!(
            "noop".parse::<PersistenceMode>().unwrap(),
            PersistenceMode::Stateless
        );
        assert!("redis".parse::<PersistenceMode>().is_err());
    }

    #[test]
    fn test_only_noop_discards_threads() {
        assert!(!NoopThreadRepository.retains_threads());
        assert!(create_thread_repository(PersistenceMode::Provider).retains_threads());
        assert!(!create_thread_repository(PersistenceMode::Stateless).retains_threads());
    }

    #[tokio::test]
    async fn test_noop_get_is_always_absent() {
        let repo = NoopThreadRepository;
        for id in ["", "conv_1", "a-very-long-conversation-identifier"] {
            assert!(repo.get(id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_noop_never_returns_stored_thread() {
        let repo = NoopThreadRepository;
        repo.set("conv_1", AgentThread::with_service_thread("thread_1"))
            .await
            .unwrap();
        repo.set("conv_1", AgentThread::with_service_thread("thread_2"))
            .await
            .unwrap();

        assert!(repo.get("conv_1").await.unwrap().is_none());
        assert!(repo.get("conv_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_thread_repository_provider_keeps_threads() {
        let repo = create_thread_repository(PersistenceMode::Provider);
        repo.set("conv_1", AgentThread::with_service_thread("thread_1"))
            .await
            .unwrap();

        let thread = repo.get("conv_1").await.unwrap().unwrap();
        assert_eq!(thread.service_thread_id.as_deref(), Some("thread_1"));
    }

    #[tokio::test]
    async fn test_create_thread_repository_stateless_discards() {
        let repo = create_thread_repository(PersistenceMode::Stateless);
        repo.set("conv_1", AgentThread::with_service_thread("thread_1"))
            .await
            .unwrap();
        assert!(repo.get("conv_1").await.unwrap().is_none());
    }
}
