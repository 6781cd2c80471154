// Error types for the agent runtime
//
// This layer recovers nothing: every variant is a pass-through of whatever
// the remote service, the identity provider or the local configuration produced.

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur while bootstrapping or running the agent
#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or invalid configuration, surfaced at first use
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller sent something the agent cannot run
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Token acquisition failed
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The remote service answered with a non-success status
    #[error("Remote service error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The request never produced a response (connect, TLS, decode)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A remote run ended in a non-successful terminal state
    #[error("Run {run_id} ended with status {status}: {message}")]
    RunFailed {
        run_id: String,
        status: String,
        message: String,
    },

    /// A tool call needs human confirmation, which this service cannot give
    #[error("Tool call requires approval: {0}")]
    ApprovalRequired(String),

    /// A remote run did not finish in time
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Thread persistence error
    #[error("Thread store error: {0}")]
    ThreadStore(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AgentError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        AgentError::Configuration(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid(msg: impl Into<String>) -> Self {
        AgentError::InvalidRequest(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        AgentError::Authentication(msg.into())
    }

    /// Create a remote service error
    pub fn remote(status: u16, msg: impl Into<String>) -> Self {
        AgentError::Remote {
            status,
            message: msg.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        AgentError::Transport(msg.into())
    }

    /// Create a thread store error
    pub fn store(msg: impl Into<String>) -> Self {
        AgentError::ThreadStore(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = AgentError::remote(404, "assistant not found");
        assert_eq!(
            err.to_string(),
            "Remote service error (404): assistant not found"
        );
    }

    #[test]
    fn test_run_failed_display() {
        let err = AgentError::RunFailed {
            run_id: "run_1".to_string(),
            status: "failed".to_string(),
            message: "rate limited".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Run run_1 ended with status failed: rate limited"
        );
    }

    #[test]
    fn test_internal_from_anyhow() {
        let err: AgentError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, AgentError::Internal(_)));
    }
}
