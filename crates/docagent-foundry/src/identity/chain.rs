// Default credential chain
//
// Tries each source in order and sticks with the first one that produced a
// token. Errors from every source are collected into one message so a
// misconfigured host shows all the reasons at once.

use async_trait::async_trait;
use docagent_core::{AccessToken, AgentError, Result, TokenCredential};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{AzureCliCredential, ClientSecretCredential, ManagedIdentityCredential};

const UNSELECTED: usize = usize::MAX;

struct Source {
    name: &'static str,
    credential: Box<dyn TokenCredential>,
}

/// Credential chain: environment, managed identity, Azure CLI
pub struct DefaultAzureCredential {
    sources: Vec<Source>,
    selected: AtomicUsize,
}

impl DefaultAzureCredential {
    /// Empty chain; add sources with [`Self::with_source`]
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            selected: AtomicUsize::new(UNSELECTED),
        }
    }

    /// Append a source to the chain
    pub fn with_source(
        mut self,
        name: &'static str,
        credential: impl TokenCredential + 'static,
    ) -> Self {
        self.sources.push(Source {
            name,
            credential: Box::new(credential),
        });
        self
    }

    /// Standard chain built from the process environment
    pub fn from_env() -> Self {
        let mut chain = Self::empty();
        if let Some(credential) = ClientSecretCredential::from_env() {
            chain = chain.with_source("EnvironmentCredential", credential);
        }
        chain
            .with_source("ManagedIdentityCredential", ManagedIdentityCredential::from_env())
            .with_source("AzureCliCredential", AzureCliCredential::new())
    }

    /// Names of the sources in the order they are tried
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name).collect()
    }

    /// Name of the source that last produced a token
    pub fn selected_source(&self) -> Option<&'static str> {
        self.sources
            .get(self.selected.load(Ordering::Acquire))
            .map(|source| source.name)
    }
}

#[async_trait]
impl TokenCredential for DefaultAzureCredential {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let selected = self.selected.load(Ordering::Acquire);
        if let Some(source) = self.sources.get(selected) {
            return source.credential.get_token(scopes).await;
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        for (index, source) in self.sources.iter().enumerate() {
            match source.credential.get_token(scopes).await {
                Ok(token) => {
                    self.selected.store(index, Ordering::Release);
                    tracing::info!(source = source.name, "Azure credential selected");
                    return Ok(token);
                }
                Err(e) => {
                    tracing::debug!(source = source.name, error = %e, "Credential source unavailable");
                    failures.push(format!("{}: {}", source.name, e));
                }
            }
        }

        Err(AgentError::auth(format!(
            "DefaultAzureCredential failed to retrieve a token. {}",
            if failures.is_empty() {
                "No credential sources configured".to_string()
            } else {
                failures.join("; ")
            }
        )))
    }

    async fn close(&self) {
        for source in &self.sources {
            source.credential.close().await;
        }
    }
}

impl std::fmt::Debug for DefaultAzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultAzureCredential")
            .field("sources", &self.source_names())
            .field("selected", &self.selected_source())
            .finish()
    }
}
