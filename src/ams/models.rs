//! Media Services entities as they travel over the wire.
//!
//! The REST API answers in OData v3 "verbose" JSON: single entities arrive as
//! `{"d": {...}}`, collections as `{"d": {"results": [...]}}`, `Edm.Int64`
//! values are quoted strings and complex-type collections nested inside an
//! entity carry their own `results` wrapper.  The helpers at the bottom of
//! this file absorb those quirks so the structs stay plain.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// `{"d": ...}` wrapper around every verbose response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub d: T,
}

/// `{"results": [...]}` body of a verbose collection.
#[derive(Debug, Deserialize)]
pub(crate) struct Results<T> {
    pub results: Vec<T>,
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// A named unit of remote storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Asset {
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
}

/// Storage options chosen when an asset is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetCreationOptions {
    /// Plain storage.
    #[default]
    None,
    /// Storage-encrypted asset; needs client-side key handling.
    StorageEncrypted,
}

impl AssetCreationOptions {
    /// Wire value of the `Options` property.
    pub fn wire_value(self) -> i32 {
        match self {
            Self::None => 0,
            Self::StorageEncrypted => 1,
        }
    }
}

/// One blob inside an asset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssetFile {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "int64")]
    pub content_file_size: u64,
}

// ---------------------------------------------------------------------------
// MediaProcessor
// ---------------------------------------------------------------------------

/// A named, versioned processing capability offered by the account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaProcessor {
    pub id: String,
    pub name: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Job / JobState / JobTask
// ---------------------------------------------------------------------------

/// Lifecycle of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    Scheduled,
    Processing,
    Finished,
    Error,
    Canceled,
    Canceling,
}

impl JobState {
    /// No further transitions will happen once the job is here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Error | JobState::Canceled)
    }

    /// Map the service's `State` integer.
    pub fn from_wire(value: i32) -> Option<Self> {
        Some(match value {
            0 => JobState::Queued,
            1 => JobState::Scheduled,
            2 => JobState::Processing,
            3 => JobState::Finished,
            4 => JobState::Error,
            5 => JobState::Canceled,
            6 => JobState::Canceling,
            _ => return None,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Queued => "Queued",
            JobState::Scheduled => "Scheduled",
            JobState::Processing => "Processing",
            JobState::Finished => "Finished",
            JobState::Error => "Error",
            JobState::Canceled => "Canceled",
            JobState::Canceling => "Canceling",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A submitted job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "job_state")]
    pub state: JobState,
}

/// One error entry attached to a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorDetail {
    #[serde(default, deserialize_with = "nullable_string")]
    pub code: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub message: String,
}

/// A processing step of a job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobTask {
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    /// Percent complete, 0–100.
    #[serde(default)]
    pub progress: f64,
    #[serde(default, deserialize_with = "collection")]
    pub error_details: Vec<ErrorDetail>,
}

/// What the orchestrator asks the service to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub name: String,
    pub task_name: String,
    pub input_asset_id: String,
    pub processor_id: String,
    /// Opaque processor configuration, passed through unchanged.
    pub configuration: String,
    pub output_asset_name: String,
}

// ---------------------------------------------------------------------------
// AccessPolicy / Locator
// ---------------------------------------------------------------------------

/// Permission bits of an access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccessPermissions(pub u32);

impl AccessPermissions {
    pub const READ: Self = Self(1);
    pub const WRITE: Self = Self(2);
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessPolicy {
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(default)]
    pub duration_in_minutes: f64,
}

/// SAS locator type on the wire.
pub(crate) const LOCATOR_TYPE_SAS: i32 = 1;

/// Time-bounded access to an asset's container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Locator {
    pub id: String,
    /// Container URL carrying the SAS query string.
    pub path: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub access_policy_id: String,
}

// ---------------------------------------------------------------------------
// Azure AD token
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default, deserialize_with = "int64")]
    pub expires_in: u64,
}

// ---------------------------------------------------------------------------
// serde helpers
// ---------------------------------------------------------------------------

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `Edm.Int64` arrives quoted in verbose JSON; accept numbers as well.
fn int64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
        Null(()),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        Raw::Null(()) => Ok(0),
    }
}

fn job_state<'de, D>(deserializer: D) -> Result<JobState, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i32::deserialize(deserializer)?;
    JobState::from_wire(raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown job state {raw}")))
}

/// Nested collections come either bare or wrapped in `{"results": [...]}`.
fn collection<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Bare(Vec<T>),
        Wrapped { results: Vec<T> },
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bare(items) => items,
        Raw::Wrapped { results } => results,
        Raw::Null(()) => Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
