// Service principal credential (OAuth2 client credentials grant)

use async_trait::async_trait;
use docagent_core::{AccessToken, AgentError, Result, TokenCredential};
use reqwest::Client;

use super::{token_error, TokenResponse, DEFAULT_AUTHORITY_HOST};

/// Credential for a service principal with a client secret
pub struct ClientSecretCredential {
    http: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Use another authority (sovereign clouds, tests)
    pub fn with_authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from AZURE_TENANT_ID, AZURE_CLIENT_ID, AZURE_CLIENT_SECRET and
    /// optional AZURE_AUTHORITY_HOST. Returns None when any of the three is unset.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let credential = Self::new(
            var("AZURE_TENANT_ID")?,
            var("AZURE_CLIENT_ID")?,
            var("AZURE_CLIENT_SECRET")?,
        );
        Some(match var("AZURE_AUTHORITY_HOST") {
            Some(host) => credential.with_authority_host(host),
            None => credential,
        })
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host, self.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| AgentError::auth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(token_error("ClientSecretCredential", response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AgentError::auth(format!("Invalid token response: {}", e)))?;

        tracing::debug!(client_id = %self.client_id, "Acquired token with client secret");
        token.into_access_token()
    }
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("authority_host", &self.authority_host)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_client_secret_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "sp-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ClientSecretCredential::new("tenant-1", "app-1", "s3cret")
            .with_authority_host(server.uri());
        let token = credential
            .get_token(&["https://ai.azure.com/.default"])
            .await
            .unwrap();

        assert_eq!(token.token, "sp-token");
    }

    #[tokio::test]
    async fn test_client_secret_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let credential = ClientSecretCredential::new("tenant-1", "app-1", "wrong")
            .with_authority_host(server.uri());
        let err = credential
            .get_token(&["https://ai.azure.com/.default"])
            .await
            .unwrap_err();

        match err {
            AgentError::Authentication(msg) => assert!(msg.contains("invalid_client")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debug_hides_secret() {
        let credential = ClientSecretCredential::new("t", "c", "super-secret");
        assert!(!format!("{:?}", credential).contains("super-secret"));
    }
}
