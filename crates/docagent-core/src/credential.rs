// Credential lifetime
//
// A process-scoped credential is created once and relies on its own token
// refresh. A scoped credential is created for a bounded piece of work and
// closed exactly once when that work ends, whatever its outcome.

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::traits::TokenCredential;

/// How long a credential instance lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialLifetime {
    /// One instance for the whole process (default)
    #[default]
    Process,
    /// One instance per scope, released on scope exit
    Scoped,
}

impl std::str::FromStr for CredentialLifetime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process" | "singleton" | "" => Ok(CredentialLifetime::Process),
            "scoped" | "scope" => Ok(CredentialLifetime::Scoped),
            _ => anyhow::bail!(
                "Unknown credential lifetime: {}. Use 'process' or 'scoped'",
                s
            ),
        }
    }
}

impl std::fmt::Display for CredentialLifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialLifetime::Process => write!(f, "process"),
            CredentialLifetime::Scoped => write!(f, "scoped"),
        }
    }
}

/// Run `body` with `credential`, then close the credential.
///
/// `close` runs exactly once after the body finishes, on success and on error.
/// The body's result is returned unchanged.
pub async fn with_scoped_credential<C, F, Fut, T>(credential: Arc<C>, body: F) -> Result<T>
where
    C: TokenCredential + ?Sized,
    F: FnOnce(Arc<C>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let result = body(Arc::clone(&credential)).await;
    credential.close().await;
    if let Err(e) = &result {
        tracing::debug!(error = %e, "Scoped credential released after failure");
    } else {
        tracing::debug!("Scoped credential released");
    }
    result
}
