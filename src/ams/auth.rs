//! Azure AD service-principal authentication.
//!
//! Media Services v2 accepts bearer tokens issued by the Azure AD v1
//! endpoint through the client-credentials grant:
//!
//! ```text
//! POST {authority}/{tenant}/oauth2/token
//!   grant_type=client_credentials
//!   client_id=…  client_secret=…  resource=https://rest.media.azure.net
//!        │
//!        ▼
//! {"access_token": "…", "expires_in": "3599", …}
//! ```
//!
//! Tokens are cached and refreshed shortly before they expire, so a long
//! polling loop never runs with a stale token.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::error::{ensure_success, AmsError};
use super::models::TokenResponse;
use crate::config::ServiceConfig;

/// Refresh this long before the reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Service principal and audience for the token request.
#[derive(Clone)]
pub struct AzureAdCredentials {
    pub tenant: String,
    pub client_id: String,
    pub client_secret: String,
    /// Token audience, e.g. `https://rest.media.azure.net`.
    pub resource: String,
}

impl AzureAdCredentials {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            tenant: config.tenant_domain.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            resource: config.environment.media_resource().to_string(),
        }
    }
}

impl std::fmt::Debug for AzureAdCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureAdCredentials")
            .field("tenant", &self.tenant)
            .field("client_id", &self.client_id)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Token provider
// ---------------------------------------------------------------------------

struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// Fetches and caches bearer tokens for the Media Services REST API.
pub struct AzureAdTokenProvider {
    http: reqwest::Client,
    credentials: AzureAdCredentials,
    authority: String,
    cached: Mutex<Option<AccessToken>>,
}

impl AzureAdTokenProvider {
    pub fn new(http: reqwest::Client, config: &ServiceConfig) -> Self {
        Self::with_authority(
            http,
            AzureAdCredentials::from_config(config),
            config.environment.authority(),
        )
    }

    /// Use an explicit authority host (sovereign clouds, tests).
    pub fn with_authority(
        http: reqwest::Client,
        credentials: AzureAdCredentials,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            http,
            credentials,
            authority: authority.into().trim_end_matches('/').to_string(),
            cached: Mutex::new(None),
        }
    }

    /// A valid bearer token, fetching a new one when the cached token is
    /// missing or about to expire.
    pub async fn token(&self) -> Result<String, AmsError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
            log::debug!("access token near expiry, refreshing");
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self) -> Result<AccessToken, AmsError> {
        let url = format!("{}/{}/oauth2/token", self.authority, self.credentials.tenant);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("resource", self.credentials.resource.as_str()),
        ];

        let response = ensure_success(self.http.post(&url).form(&form).send().await?).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AmsError::Parse(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(AmsError::Parse("token response has no access_token".into()));
        }

        let lifetime = Duration::from_secs(token.expires_in);
        log::debug!(
            "acquired access token for {} (expires in {}s)",
            self.credentials.resource,
            token.expires_in
        );
        Ok(AccessToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
