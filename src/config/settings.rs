//! Service settings structs, defaults and TOML loading.
//!
//! The settings file carries the Media Services endpoint and the Azure AD
//! client credentials, plus optional `[job]` and `[transfer]` tuning
//! sections.  Only the `[service]` keys are required; everything else falls
//! back to the defaults below.
//!
//! ```toml
//! [service]
//! rest_api_endpoint = "https://myaccount.restv2.westeurope.media.azure.net/api/"
//! tenant_domain     = "contoso.onmicrosoft.com"
//! client_id         = "00000000-0000-0000-0000-000000000000"
//! client_secret     = "..."
//! environment       = "AzureCloud"
//!
//! [job]
//! poll_interval_ms  = 1000
//! cancel_remote_job = false
//! ```

use std::path::Path;

use serde::Deserialize;

use super::AppPaths;
use crate::error::{Result, Voice2TextError};

// ---------------------------------------------------------------------------
// AzureEnvironment
// ---------------------------------------------------------------------------

/// Which Azure cloud the account lives in.  Selects the Azure AD authority
/// and the Media Services token audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum AzureEnvironment {
    #[default]
    AzureCloud,
    AzureChinaCloud,
    AzureUsGovernment,
    AzureGermanCloud,
}

impl AzureEnvironment {
    /// Azure AD authority host for the client-credentials grant.
    pub fn authority(&self) -> &'static str {
        match self {
            Self::AzureCloud => "https://login.microsoftonline.com",
            Self::AzureChinaCloud => "https://login.chinacloudapi.cn",
            Self::AzureUsGovernment => "https://login.microsoftonline.us",
            Self::AzureGermanCloud => "https://login.microsoftonline.de",
        }
    }

    /// Resource URI the bearer token must be issued for.
    pub fn media_resource(&self) -> &'static str {
        match self {
            Self::AzureCloud => "https://rest.media.azure.net",
            Self::AzureChinaCloud => "https://rest.media.chinacloudapi.cn",
            Self::AzureUsGovernment => "https://rest.media.usgovcloudapi.net",
            Self::AzureGermanCloud => "https://rest.media.cloudapi.de",
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Endpoint and credentials for the Media Services account.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// REST API endpoint of the account (ends in `/api/`).
    pub rest_api_endpoint: String,
    /// Azure AD tenant, e.g. `contoso.onmicrosoft.com`.
    pub tenant_domain: String,
    /// Service principal application id.
    pub client_id: String,
    /// Service principal secret.
    pub client_secret: String,
    /// Cloud the account lives in.
    pub environment: AzureEnvironment,
}

// Keeps the secret out of logs.
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("rest_api_endpoint", &self.rest_api_endpoint)
            .field("tenant_domain", &self.tenant_domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("environment", &self.environment)
            .finish()
    }
}

impl ServiceConfig {
    /// Names of required keys that are absent or blank.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        [
            ("rest_api_endpoint", &self.rest_api_endpoint),
            ("tenant_domain", &self.tenant_domain),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect()
    }
}

// ---------------------------------------------------------------------------
// JobConfig
// ---------------------------------------------------------------------------

/// How the indexing job is named, selected and watched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Media processor to run; the highest available version is chosen.
    pub processor_name: String,
    /// Name given to the submitted job.
    pub job_name: String,
    /// Delay between two status polls.
    pub poll_interval_ms: u64,
    /// When the operator presses Escape, also ask the service to cancel the
    /// job instead of only stopping to watch it.
    pub cancel_remote_job: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            processor_name: "Azure Media Indexer 2 Preview".into(),
            job_name: "Voice2Text Job".into(),
            poll_interval_ms: 1_000,
            cancel_remote_job: false,
        }
    }
}

// ---------------------------------------------------------------------------
// TransferConfig
// ---------------------------------------------------------------------------

/// Blob transfer limits and access-locator lifetime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Files transferred at the same time.
    pub concurrent_transfers: usize,
    /// Ranged requests in flight per file.
    pub parallel_transfer_threads: usize,
    /// Block size for uploads and range size for downloads.
    pub block_size_bytes: u64,
    /// Lifetime of the read locator created for downloads.
    pub locator_duration_days: u32,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrent_transfers: 20,
            parallel_transfer_threads: 20,
            block_size_bytes: 4 * 1024 * 1024,
            locator_duration_days: 30,
            timeout_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, read from `appsettings.toml` or the platform
/// `settings.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub job: JobConfig,
    pub transfer: TransferConfig,
}

impl AppConfig {
    /// Load from the first settings file that exists, see
    /// [`AppPaths::settings_candidates`].
    pub fn load() -> Result<Self> {
        let paths = AppPaths::new();
        let candidates = paths.settings_candidates();
        match candidates.iter().find(|p| p.exists()) {
            Some(path) => {
                log::debug!("loading settings from {}", path.display());
                Self::load_from(path)
            }
            None => Err(Voice2TextError::ConfigurationMissing(format!(
                "no settings file found (looked for {})",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Load and validate an explicit settings file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Voice2TextError::ConfigurationMissing(format!(
                "settings file {} does not exist",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            Voice2TextError::ConfigurationMissing(format!("invalid settings file: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Fails with `ConfigurationMissing` listing every blank required key.
    pub fn validate(&self) -> Result<()> {
        let missing = self.service.missing_keys();
        if !missing.is_empty() {
            return Err(Voice2TextError::ConfigurationMissing(format!(
                "required settings absent: {}",
                missing.join(", ")
            )));
        }
        if self.transfer.concurrent_transfers == 0
            || self.transfer.parallel_transfer_threads == 0
            || self.transfer.block_size_bytes == 0
            || self.transfer.locator_duration_days == 0
        {
            return Err(Voice2TextError::ConfigurationMissing(
                "transfer limits must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
