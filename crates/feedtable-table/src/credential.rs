//! Client-secret (OAuth2 client-credentials) token acquisition.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Tokens are refreshed this long before the authority says they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Bearer tokens for a tenant/client/secret identity.
///
/// The token is cached and shared; the lock is held while refreshing so
/// concurrent callers wait for one refresh instead of issuing their own.
pub struct ClientSecretCredential {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cache: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ClientSecretCredential {
    #[must_use]
    pub fn new(
        client: Client,
        authority_host: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Self {
        let token_url = format!(
            "{}/{tenant_id}/oauth2/v2.0/token",
            authority_host.trim_end_matches('/')
        );
        Self {
            client,
            token_url,
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            scope: scope.to_owned(),
            cache: Mutex::new(None),
        }
    }

    /// Returns a valid access token, requesting a new one when the cached
    /// token is missing or close to expiry.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Http`] if the authority cannot be reached.
    /// - [`StoreError::Auth`] if the authority refuses the credentials or
    ///   answers with an unreadable body.
    pub async fn token(&self) -> Result<String, StoreError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *cache = Some(fresh);
        Ok(value)
    }

    /// Drops the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    async fn request_token(&self) -> Result<CachedToken, StoreError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
            ("grant_type", "client_credentials"),
        ];
        let response = self.client.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.error, e.error_description))
                .unwrap_or_else(|_| format!("status {status}"));
            return Err(StoreError::Auth(detail));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| StoreError::Auth(format!("unreadable token response: {e}")))?;
        if token.access_token.is_empty() {
            return Err(StoreError::Auth("authority returned an empty token".to_string()));
        }

        let lifetime = Duration::from_secs(token.expires_in);
        let usable = if lifetime > REFRESH_MARGIN * 2 {
            lifetime - REFRESH_MARGIN
        } else {
            lifetime / 2
        };
        tracing::debug!(expires_in = token.expires_in, "acquired store access token");

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + usable,
        })
    }
}
