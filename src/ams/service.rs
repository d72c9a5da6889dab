//! The `MediaService` trait: every remote operation a run needs.
//!
//! [`MediaServicesClient`](super::MediaServicesClient) implements it against
//! the REST API; tests drive the pipeline through an in-memory double.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::blob::Progress;
use super::error::AmsError;
use super::models::{
    Asset, AssetCreationOptions, AssetFile, Job, JobRequest, JobTask, Locator, MediaProcessor,
};

/// Remote Media Services operations.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn MediaService>` between the orchestrator and the download tasks.
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Create an asset and upload `path` into it as its single file.
    async fn upload_asset(
        &self,
        path: &Path,
        options: AssetCreationOptions,
        progress: Progress<'_>,
    ) -> Result<Asset, AmsError>;

    /// Every processor registered under `name`, all versions.
    async fn media_processors(&self, name: &str) -> Result<Vec<MediaProcessor>, AmsError>;

    async fn submit_job(&self, request: &JobRequest) -> Result<Job, AmsError>;

    /// Current state of a job.
    async fn job(&self, job_id: &str) -> Result<Job, AmsError>;

    async fn job_tasks(&self, job_id: &str) -> Result<Vec<JobTask>, AmsError>;

    async fn job_output_assets(&self, job_id: &str) -> Result<Vec<Asset>, AmsError>;

    /// Ask the service to cancel a job.  The job moves to `Canceling` and
    /// later `Canceled`.
    async fn cancel_job(&self, job_id: &str) -> Result<(), AmsError>;

    /// Delete an asset together with its locators and storage.
    async fn delete_asset(&self, asset_id: &str) -> Result<(), AmsError>;

    /// Read-only SAS locator on an asset, valid for `duration`.
    async fn create_read_locator(&self, asset_id: &str, duration: Duration) -> Result<Locator, AmsError>;

    async fn asset_files(&self, asset_id: &str) -> Result<Vec<AssetFile>, AmsError>;

    /// Download one file of the asset the locator points at into `dest`.
    async fn download_file(
        &self,
        locator: &Locator,
        file: &AssetFile,
        dest: &Path,
        progress: Progress<'_>,
    ) -> Result<(), AmsError>;
}
