// Foundry project configuration
//
// The endpoint and the model deployment are read once at startup. Missing
// values are reported but never fatal here; the first remote call that needs
// them fails instead.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};

/// Environment variable holding the Foundry project endpoint URL
pub const PROJECT_ENDPOINT_VAR: &str = "AZURE_FOUNDRY_PROJECT_ENDPOINT";

/// Environment variable holding the model deployment name
pub const MODEL_DEPLOYMENT_VAR: &str = "AZURE_FOUNDRY_GPT_MODEL";

/// Diagnostic emitted when both settings are present
pub const CONFIG_OK_MESSAGE: &str = "Environment variables set successfully!";

/// Diagnostic emitted when at least one setting is missing
pub const CONFIG_MISSING_MESSAGE: &str = "WARNING: Environment variables not set properly!";

/// Endpoint and deployment of the Foundry project backing the agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundryConfig {
    pub project_endpoint: Option<String>,
    pub model_deployment: Option<String>,
}

/// Outcome of reading the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStatus {
    Complete,
    /// Names of the variables that were unset or empty
    Missing(Vec<&'static str>),
}

impl ConfigStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, ConfigStatus::Complete)
    }

    /// The fixed diagnostic line for this status
    pub fn message(&self) -> &'static str {
        match self {
            ConfigStatus::Complete => CONFIG_OK_MESSAGE,
            ConfigStatus::Missing(_) => CONFIG_MISSING_MESSAGE,
        }
    }
}

impl FoundryConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> (Self, ConfigStatus) {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> (Self, ConfigStatus)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let config = Self {
            project_endpoint: read(PROJECT_ENDPOINT_VAR),
            model_deployment: read(MODEL_DEPLOYMENT_VAR),
        };
        let status = config.status();
        (config, status)
    }

    pub fn status(&self) -> ConfigStatus {
        let mut missing = Vec::new();
        if self.project_endpoint.is_none() {
            missing.push(PROJECT_ENDPOINT_VAR);
        }
        if self.model_deployment.is_none() {
            missing.push(MODEL_DEPLOYMENT_VAR);
        }

        if missing.is_empty() {
            ConfigStatus::Complete
        } else {
            ConfigStatus::Missing(missing)
        }
    }

    /// Project endpoint without a trailing slash, or a configuration error
    pub fn require_endpoint(&self) -> Result<&str> {
        self.project_endpoint
            .as_deref()
            .map(|endpoint| endpoint.trim_end_matches('/'))
            .ok_or_else(|| AgentError::config(format!("{} is not set", PROJECT_ENDPOINT_VAR)))
    }

    /// Model deployment name, or a configuration error
    pub fn require_model(&self) -> Result<&str> {
        self.model_deployment
            .as_deref()
            .ok_or_else(|| AgentError::config(format!("{} is not set", MODEL_DEPLOYMENT_VAR)))
    }
}

/// Read the configuration from the environment and report on it
pub fn read_config() -> FoundryConfig {
    let (config, status) = FoundryConfig::from_env();
    report(&status);
    config
}

/// Log the fixed diagnostic for a configuration status
pub fn report(status: &ConfigStatus) {
    match status {
        ConfigStatus::Complete => tracing::info!("{}", status.message()),
        ConfigStatus::Missing(missing) => {
            tracing::warn!(missing = ?missing, "{}", status.message())
        }
    }
}
