// Per-scope token cache
//
// Wraps any credential and returns the cached token until it is within the
// refresh window of its expiry.

use async_trait::async_trait;
use docagent_core::{AccessToken, Result, TokenCredential};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// Tokens are refreshed this long before they expire
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Token cache in front of another credential
#[derive(Debug)]
pub struct CachedCredential<C> {
    inner: C,
    refresh_window: Duration,
    // Held across refresh so concurrent callers share one token request
    tokens: Mutex<HashMap<String, AccessToken>>,
}

impl<C: TokenCredential> CachedCredential<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            refresh_window: DEFAULT_REFRESH_WINDOW,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_refresh_window(mut self, refresh_window: Duration) -> Self {
        self.refresh_window = refresh_window;
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: TokenCredential> TokenCredential for CachedCredential<C> {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let key = scopes.join(" ");
        let mut tokens = self.tokens.lock().await;

        if let Some(token) = tokens.get(&key) {
            if !token.expires_within(self.refresh_window) {
                return Ok(token.clone());
            }
            tracing::debug!(scopes = %key, "Refreshing token near expiry");
        }

        let token = self.inner.get_token(scopes).await?;
        tokens.insert(key, token.clone());
        Ok(token)
    }

    async fn close(&self) {
        self.tokens.lock().await.clear();
        self.inner.close().await;
    }
}
