// Azure CLI credential
//
// Shells out to `az account get-access-token` for the signed-in account.
// Intended for local development; hosted deployments use managed identity.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use docagent_core::{AccessToken, AgentError, Result, TokenCredential};
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;

use super::scope_to_resource;

const CLI_TIMEOUT: Duration = Duration::from_secs(10);

/// Output of `az account get-access-token --output json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Local time, e.g. "2025-06-01 12:30:00.000000"
    #[serde(default)]
    expires_on: Option<String>,
    /// Unix seconds; newer CLI versions only
    #[serde(default, rename = "expires_on")]
    expires_on_unix: Option<i64>,
}

/// Credential that borrows the Azure CLI's login
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
    tenant_id: Option<String>,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
            tenant_id: None,
        }
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Use another executable in place of `az`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let scope = scopes
            .first()
            .ok_or_else(|| AgentError::auth("Azure CLI credential needs exactly one scope"))?;

        let mut command = Command::new(&self.program);
        command
            .args(["account", "get-access-token", "--output", "json", "--resource"])
            .arg(scope_to_resource(scope))
            .kill_on_drop(true);
        if let Some(tenant_id) = &self.tenant_id {
            command.args(["--tenant", tenant_id]);
        }

        let output = tokio::time::timeout(CLI_TIMEOUT, command.output())
            .await
            .map_err(|_| AgentError::auth("Azure CLI timed out"))?
            .map_err(|e| AgentError::auth(format!("Azure CLI not available: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::auth(format!(
                "Azure CLI failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let token = parse_cli_output(&output.stdout)?;
        tracing::debug!("Acquired token from Azure CLI");
        Ok(token)
    }
}

fn parse_cli_output(stdout: &[u8]) -> Result<AccessToken> {
    let parsed: CliToken = serde_json::from_slice(stdout)
        .map_err(|e| AgentError::auth(format!("Unexpected Azure CLI output: {}", e)))?;

    let expires_on = match (parsed.expires_on_unix, parsed.expires_on.as_deref()) {
        (Some(secs), _) => Utc.timestamp_opt(secs, 0).single(),
        (None, Some(local)) => parse_local_time(local),
        (None, None) => None,
    }
    .ok_or_else(|| AgentError::auth("Azure CLI token has no usable expiry"))?;

    Ok(AccessToken::new(parsed.access_token, expires_on))
}

fn parse_local_time(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_expiry() {
        let token = parse_cli_output(
            br#"{"accessToken":"cli-token","expiresOn":"2030-01-01 00:00:00.000000","expires_on":1893456000,"tokenType":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(token.token, "cli-token");
        assert_eq!(token.expires_on.timestamp(), 1893456000);
    }

    #[test]
    fn test_parse_local_expiry() {
        let token = parse_cli_output(
            br#"{"accessToken":"cli-token","expiresOn":"2030-01-01 00:00:00.123456"}"#,
        )
        .unwrap();
        assert!(!token.expires_within(Duration::from_secs(60)));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_cli_output(b"ERROR: Please run 'az login'").is_err());
        assert!(parse_cli_output(br#"{"accessToken":"x"}"#).is_err());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let credential = AzureCliCredential::new().with_program("definitely-not-az-cli-binary");
        let err = credential
            .get_token(&["https://ai.azure.com/.default"])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Authentication(_)));
    }
}
