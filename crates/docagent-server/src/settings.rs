// Server settings
// Decision: Every knob has a default, so an empty environment serves on 0.0.0.0:8088
// Decision: Unknown mode values fail startup instead of silently falling back
//
// Environment variables:
// - HOST, PORT (or DEFAULT_AD_PORT): listen address
// - API_PREFIX: optional prefix for the protocol routes
// - CORS_ALLOWED_ORIGINS: comma separated origins, CORS disabled when unset
// - AGENT_SERVE_MODE: blocking | async
// - AGENT_PERSISTENCE: provider | stateless
// - AGENT_CREDENTIAL_LIFETIME: process | scoped
// - AGENT_CLEANUP: true | false
// - AGENT_RUN_TIMEOUT_SECS, AGENT_RUN_POLL_MS: run polling

use anyhow::{Context, Result};
use docagent_core::{CleanupPolicy, CredentialLifetime, PersistenceMode};
use std::time::Duration;

/// Port the hosted agent listens on when nothing else is configured
pub const DEFAULT_PORT: u16 = 8088;

// =============================================================================
// ServeMode
// =============================================================================

/// How the server is driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServeMode {
    /// `AgentServer::run`: builds its own runtime and blocks the calling thread
    #[default]
    Blocking,
    /// `AgentServer::run_async`: awaited inside an existing runtime
    Async,
}

impl std::str::FromStr for ServeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocking" | "sync" | "" => Ok(ServeMode::Blocking),
            "async" | "asynchronous" => Ok(ServeMode::Async),
            _ => anyhow::bail!("Unknown serve mode: {}. Use 'blocking' or 'async'", s),
        }
    }
}

impl std::fmt::Display for ServeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServeMode::Blocking => write!(f, "blocking"),
            ServeMode::Async => write!(f, "async"),
        }
    }
}

// =============================================================================
// ServerSettings
// =============================================================================

/// Startup settings for the agent server
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    pub serve_mode: ServeMode,
    pub persistence: PersistenceMode,
    pub credential_lifetime: CredentialLifetime,
    pub cleanup: CleanupPolicy,
    pub run_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            api_prefix: String::new(),
            cors_origins: Vec::new(),
            serve_mode: ServeMode::default(),
            persistence: PersistenceMode::default(),
            credential_lifetime: CredentialLifetime::default(),
            cleanup: CleanupPolicy::default(),
            run_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl ServerSettings {
    /// Create settings from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create settings through an arbitrary lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let port = match read("PORT").or_else(|| read("DEFAULT_AD_PORT")) {
            Some(port) => port
                .parse()
                .with_context(|| format!("Invalid port: {}", port))?,
            None => defaults.port,
        };

        let cleanup = match read("AGENT_CLEANUP") {
            Some(flag) => CleanupPolicy::from_flag(parse_flag(&flag)?),
            None => defaults.cleanup,
        };

        let run_timeout = match read("AGENT_RUN_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("Invalid AGENT_RUN_TIMEOUT_SECS: {}", secs))?,
            ),
            None => defaults.run_timeout,
        };

        let poll_interval = match read("AGENT_RUN_POLL_MS") {
            Some(ms) => Duration::from_millis(
                ms.parse()
                    .with_context(|| format!("Invalid AGENT_RUN_POLL_MS: {}", ms))?,
            ),
            None => defaults.poll_interval,
        };
        if poll_interval.is_zero() {
            anyhow::bail!("AGENT_RUN_POLL_MS must be greater than 0");
        }

        Ok(Self {
            host: read("HOST").unwrap_or(defaults.host),
            port,
            api_prefix: read("API_PREFIX").unwrap_or_default(),
            cors_origins: read("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            serve_mode: read("AGENT_SERVE_MODE")
                .map(|mode| mode.parse())
                .transpose()?
                .unwrap_or_default(),
            persistence: read("AGENT_PERSISTENCE")
                .map(|mode| mode.parse())
                .transpose()?
                .unwrap_or_default(),
            credential_lifetime: read("AGENT_CREDENTIAL_LIFETIME")
                .map(|lifetime| lifetime.parse())
                .transpose()?
                .unwrap_or_default(),
            cleanup,
            run_timeout,
            poll_interval,
        })
    }

    /// Socket address to bind, e.g. `0.0.0.0:8088`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("Invalid AGENT_CLEANUP: {}. Use 'true' or 'false'", value),
    }
}
