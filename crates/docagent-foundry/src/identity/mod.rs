// Azure identity credentials
//
// Every credential implements docagent_core::TokenCredential. The default
// chain tries, in order:
// - client secret from AZURE_TENANT_ID / AZURE_CLIENT_ID / AZURE_CLIENT_SECRET
// - managed identity (App Service / Container Apps, then IMDS)
// - the Azure CLI's logged-in account
//
// The chain is wrapped in a per-scope token cache so a single process-wide
// instance keeps handing out valid tokens.

mod cache;
mod chain;
mod cli;
mod client_secret;
mod managed_identity;

pub use cache::CachedCredential;
pub use chain::DefaultAzureCredential;
pub use cli::AzureCliCredential;
pub use client_secret::ClientSecretCredential;
pub use managed_identity::{ManagedIdentityCredential, ManagedIdentitySource};

use chrono::{DateTime, TimeZone, Utc};
use docagent_core::{AccessToken, AgentError, Result, TokenCredential};
use serde::Deserialize;
use std::sync::Arc;

/// Default authority for Entra ID token requests
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Build the process credential: default chain behind a token cache
pub fn default_credential() -> Arc<dyn TokenCredential> {
    Arc::new(CachedCredential::new(DefaultAzureCredential::from_env()))
}

/// Convert an OAuth2 `.default` scope to the resource it names
///
/// `https://ai.azure.com/.default` → `https://ai.azure.com`
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Token payload returned by Entra ID and the managed identity endpoints
///
/// Entra ID returns `expires_in` as a number; managed identity endpoints
/// return `expires_on` / `expires_in` as strings of seconds.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<serde_json::Value>,
    #[serde(default)]
    pub expires_on: Option<serde_json::Value>,
}

impl TokenResponse {
    pub(crate) fn into_access_token(self) -> Result<AccessToken> {
        // Legacy endpoints send `expires_on` as a date string; fall back to `expires_in`
        let expires_on = self
            .expires_on
            .as_ref()
            .and_then(seconds)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| {
                self.expires_in
                    .as_ref()
                    .and_then(seconds)
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            });

        let expires_on: DateTime<Utc> = expires_on
            .ok_or_else(|| AgentError::auth("Token response carried no usable expiry"))?;
        Ok(AccessToken::new(self.access_token, expires_on))
    }
}

fn seconds(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Turn a failed token endpoint response into an authentication error
pub(crate) async fn token_error(source: &str, response: reqwest::Response) -> AgentError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AgentError::auth(format!("{} returned {}: {}", source, status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_to_resource() {
        assert_eq!(
            scope_to_resource("https://ai.azure.com/.default"),
            "https://ai.azure.com"
        );
        assert_eq!(scope_to_resource("https://ai.azure.com"), "https://ai.azure.com");
    }

    #[test]
    fn test_token_response_expires_in_number() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"token_type":"Bearer","expires_in":3599,"access_token":"abc"}"#,
        )
        .unwrap();
        let token = response.into_access_token().unwrap();
        assert_eq!(token.token, "abc");
        assert!(!token.expires_within(std::time::Duration::from_secs(3000)));
        assert!(token.expires_within(std::time::Duration::from_secs(3700)));
    }

    #[test]
    fn test_token_response_expires_on_string() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","expires_on":"1586984735","resource":"https://ai.azure.com"}"#,
        )
        .unwrap();
        let token = response.into_access_token().unwrap();
        assert_eq!(token.expires_on.timestamp(), 1586984735);
    }

    #[test]
    fn test_token_response_date_expires_on_uses_expires_in() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","expires_on":"09/14/2017 00:00:00 PM +00:00","expires_in":"3599"}"#,
        )
        .unwrap();
        let token = response.into_access_token().unwrap();
        assert!(!token.expires_within(std::time::Duration::from_secs(3000)));
    }

    #[test]
    fn test_token_response_without_expiry() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert!(matches!(
            response.into_access_token(),
            Err(AgentError::Authentication(_))
        ));
    }
}
