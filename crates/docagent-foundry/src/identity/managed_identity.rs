// Managed identity credential
//
// App Service and Container Apps expose IDENTITY_ENDPOINT + IDENTITY_HEADER.
// Older App Service plans only expose MSI_ENDPOINT + MSI_SECRET, which speak
// an earlier protocol revision. Everywhere else (VMs, AKS with pod identity) the instance metadata service
// answers on a link-local address.

use async_trait::async_trait;
use docagent_core::{AccessToken, AgentError, Result, TokenCredential};
use reqwest::Client;
use std::time::Duration;

use super::{scope_to_resource, token_error, TokenResponse};

/// Instance metadata service token endpoint
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const LEGACY_APP_SERVICE_API_VERSION: &str = "2017-09-01";
const IMDS_API_VERSION: &str = "2018-02-01";

/// Where the managed identity token comes from
#[derive(Clone, PartialEq, Eq)]
pub enum ManagedIdentitySource {
    /// App Service / Container Apps identity endpoint
    AppService { endpoint: String, header: String },
    /// Pre-2019 App Service endpoint authenticated with the `secret` header
    LegacyAppService { endpoint: String, secret: String },
    /// Instance metadata service
    Imds { endpoint: String },
}

impl ManagedIdentitySource {
    pub fn endpoint(&self) -> &str {
        match self {
            ManagedIdentitySource::AppService { endpoint, .. }
            | ManagedIdentitySource::LegacyAppService { endpoint, .. }
            | ManagedIdentitySource::Imds { endpoint } => endpoint,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ManagedIdentitySource::AppService { .. } => "app_service",
            ManagedIdentitySource::LegacyAppService { .. } => "legacy_app_service",
            ManagedIdentitySource::Imds { .. } => "imds",
        }
    }
}

// The identity header is a bearer secret for the token endpoint
impl std::fmt::Debug for ManagedIdentitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedIdentitySource")
            .field("kind", &self.kind())
            .field("endpoint", &self.endpoint())
            .finish_non_exhaustive()
    }
}

/// Token credential backed by the hosting environment's managed identity
pub struct ManagedIdentityCredential {
    http: Client,
    source: ManagedIdentitySource,
    /// User-assigned identity; None selects the system-assigned identity
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(source: ManagedIdentitySource) -> Self {
        // IMDS is not routable outside Azure; fail fast instead of hanging
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self {
            http,
            source,
            client_id: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Pick the source from the environment.
    ///
    /// IDENTITY_ENDPOINT/IDENTITY_HEADER select App Service, MSI_ENDPOINT/MSI_SECRET
    /// the legacy App Service endpoint; otherwise IMDS. AZURE_CLIENT_ID selects
    /// a user-assigned identity.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Pick the source through an arbitrary lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let source = if let Some((endpoint, header)) =
            var("IDENTITY_ENDPOINT").zip(var("IDENTITY_HEADER"))
        {
            ManagedIdentitySource::AppService { endpoint, header }
        } else if let Some((endpoint, secret)) = var("MSI_ENDPOINT").zip(var("MSI_SECRET")) {
            ManagedIdentitySource::LegacyAppService { endpoint, secret }
        } else {
            ManagedIdentitySource::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            }
        };

        let credential = Self::new(source);
        match var("AZURE_CLIENT_ID") {
            Some(client_id) => credential.with_client_id(client_id),
            None => credential,
        }
    }

    pub fn source(&self) -> &ManagedIdentitySource {
        &self.source
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let scope = scopes
            .first()
            .ok_or_else(|| AgentError::auth("Managed identity needs exactly one scope"))?;
        let resource = scope_to_resource(scope);

        let mut query = vec![("resource", resource)];
        if let Some(client_id) = &self.client_id {
            // The legacy protocol spells the parameter without the underscore
            let name = match self.source {
                ManagedIdentitySource::LegacyAppService { .. } => "clientid",
                _ => "client_id",
            };
            query.push((name, client_id.as_str()));
        }

        let request = match &self.source {
            ManagedIdentitySource::LegacyAppService { endpoint, secret } => {
                query.push(("api-version", LEGACY_APP_SERVICE_API_VERSION));
                self.http.get(endpoint).header("secret", secret).query(&query)
            }
            ManagedIdentitySource::AppService { endpoint, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.http
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
                    .query(&query)
            }
            ManagedIdentitySource::Imds { endpoint } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http
                    .get(endpoint)
                    .header("Metadata", "true")
                    .query(&query)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::auth(format!("Managed identity unavailable: {}", e)))?;

        if !response.status().is_success() {
            return Err(token_error("ManagedIdentityCredential", response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AgentError::auth(format!("Invalid managed identity response: {}", e)))?;

        tracing::debug!(
            source = self.source.kind(),
            endpoint = %self.source.endpoint(),
            "Acquired token from managed identity"
        );
        token.into_access_token()
    }
}

impl std::fmt::Debug for ManagedIdentityCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedIdentityCredential")
            .field("source", &self.source)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_app_service_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/msi/token"))
            .and(header("X-IDENTITY-HEADER", "h3ader"))
            .and(query_param("resource", "https://ai.azure.com"))
            .and(query_param("api-version", "2019-08-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mi-token",
                "expires_on": "4102444800",
                "resource": "https://ai.azure.com",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::new(ManagedIdentitySource::AppService {
            endpoint: format!("{}/msi/token", server.uri()),
            header: "h3ader".to_string(),
        });
        let token = credential
            .get_token(&["https://ai.azure.com/.default"])
            .await
            .unwrap();

        assert_eq!(token.token, "mi-token");
        assert_eq!(token.expires_on.timestamp(), 4102444800);
    }

    #[tokio::test]
    async fn test_imds_user_assigned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Metadata", "true"))
            .and(query_param("client_id", "uami-1"))
            .and(query_param("api-version", "2018-02-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "imds-token",
                "expires_in": "3599",
                "expires_on": "4102444800"
            })))
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::new(ManagedIdentitySource::Imds {
            endpoint: server.uri(),
        })
        .with_client_id("uami-1");

        let token = credential.get_token(&["https://ai.azure.com/.default"]).await.unwrap();
        assert_eq!(token.token, "imds-token");
    }

    #[tokio::test]
    async fn test_managed_identity_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("identity not found"))
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::new(ManagedIdentitySource::Imds {
            endpoint: server.uri(),
        });
        let err = credential.get_token(&["x/.default"]).await.unwrap_err();
        assert!(matches!(err, AgentError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_legacy_app_service_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/MSI/token"))
            .and(header("secret", "legacy-s3cret"))
            .and(query_param("api-version", "2017-09-01"))
            .and(query_param("clientid", "uami-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "legacy-token",
                "expires_on": "09/14/2017 00:00:00 PM +00:00",
                "expires_in": "3599"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::new(ManagedIdentitySource::LegacyAppService {
            endpoint: format!("{}/MSI/token", server.uri()),
            secret: "legacy-s3cret".to_string(),
        })
        .with_client_id("uami-2");

        let token = credential.get_token(&["https://ai.azure.com/.default"]).await.unwrap();
        assert_eq!(token.token, "legacy-token");
    }

    #[test]
    fn test_source_selection_from_lookup() {
        let env = |vars: &'static [(&'static str, &'static str)]| {
            move |name: &str| {
                vars.iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
            }
        };

        let credential = ManagedIdentityCredential::from_lookup(env(&[
            ("IDENTITY_ENDPOINT", "http://localhost:42356/msi/token"),
            ("IDENTITY_HEADER", "h"),
            ("MSI_ENDPOINT", "http://localhost:8081/MSI/token"),
            ("MSI_SECRET", "s"),
        ]));
        assert!(matches!(credential.source(), ManagedIdentitySource::AppService { .. }));

        let credential = ManagedIdentityCredential::from_lookup(env(&[
            ("MSI_ENDPOINT", "http://localhost:8081/MSI/token"),
            ("MSI_SECRET", "s"),
        ]));
        assert!(matches!(
            credential.source(),
            ManagedIdentitySource::LegacyAppService { .. }
        ));

        let credential = ManagedIdentityCredential::from_lookup(env(&[]));
        assert_eq!(credential.source().endpoint(), IMDS_ENDPOINT);
    }

    #[test]
    fn test_debug_redacts_identity_secrets() {
        let credential = ManagedIdentityCredential::new(ManagedIdentitySource::AppService {
            endpoint: "http://localhost:42356/msi/token".to_string(),
            header: "very-secret-header".to_string(),
        });
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("very-secret-header"));
        assert!(debug.contains("localhost:42356"));

        let source = ManagedIdentitySource::LegacyAppService {
            endpoint: "http://localhost:8081/MSI/token".to_string(),
            secret: "legacy-secret".to_string(),
        };
        assert!(!format!("{:?}", source).contains("legacy-secret"));
    }

    #[tokio::test]
    async fn test_no_scope_is_an_error() {
        let credential = ManagedIdentityCredential::new(ManagedIdentitySource::Imds {
            endpoint: "http://127.0.0.1:9".to_string(),
        });
        assert!(credential.get_token(&[]).await.is_err());
    }
}
