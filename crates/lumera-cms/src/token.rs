//! Bearer-token lifecycle for the content backend.
//!
//! Tokens come from a client-credentials exchange and are cached with a
//! fixed TTL. Concurrent callers on a cold cache coalesce into a single
//! in-flight exchange; the token value never leaves this module except as a
//! header value handed to the transport.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use lumera_core::error::{Result, UpstreamError};
use lumera_core::transport::{RetryPolicy, send_with_retry};

use crate::config::CmsConfig;

const SERVICE: &str = "cms";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    obtained_at: Instant,
    ttl: Duration,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        self.obtained_at.elapsed() >= self.ttl
    }
}

/// Obtains and caches the content backend's bearer token.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    ttl: Duration,
    policy: RetryPolicy,
    current: RwLock<Option<CachedToken>>,
    refresh: Mutex<()>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, config: &CmsConfig, policy: RetryPolicy) -> Self {
        Self {
            http,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
            ttl: config.token_ttl,
            policy,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Returns a valid bearer token, performing the credential exchange only
    /// when no unexpired token is cached.
    ///
    /// Safe to call concurrently: cold-cache callers serialize on the
    /// refresh lock and all but one observe the freshly stored token.
    pub async fn bearer_token(&self) -> Result<String> {
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        tracing::debug!(url = %self.token_url, "requesting new bearer token");
        let value = self.exchange().await?;
        *self.current.write().await = Some(CachedToken {
            value: value.clone(),
            obtained_at: Instant::now(),
            ttl: self.ttl,
        });
        Ok(value)
    }

    async fn cached(&self) -> Option<String> {
        let guard = self.current.read().await;
        guard
            .as_ref()
            .filter(|token| !token.is_expired())
            .map(|token| token.value.clone())
    }

    async fn exchange(&self) -> Result<String> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let request = self.http.post(&self.token_url).form(&form);
        let response = send_with_retry(SERVICE, &self.policy, request).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::payload(SERVICE, format!("token response: {e}")))?;
        Ok(token.access_token)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials and the token itself stay out of debug output.
        f.debug_struct("TokenManager")
            .field("token_url", &self.token_url)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_relative_to_obtained_at() {
        let fresh = CachedToken {
            value: "t".into(),
            obtained_at: Instant::now(),
            ttl: Duration::from_secs(60),
        };
        assert!(!fresh.is_expired());

        let stale = CachedToken {
            value: "t".into(),
            obtained_at: Instant::now() - Duration::from_secs(61),
            ttl: Duration::from_secs(60),
        };
        assert!(stale.is_expired());
    }

    #[test]
    fn debug_output_hides_credentials() {
        let config = CmsConfig::new("https://cms.example.com", "app", "id", "very-secret");
        let manager = TokenManager::new(reqwest::Client::new(), &config, RetryPolicy::default());
        let rendered = format!("{manager:?}");
        assert!(!rendered.contains("very-secret"));
    }
}
