//! In-memory [`MediaService`] double for pipeline tests.
//!
//! The input asset is always `A1`, the job `J1` and its output asset `A2`.
//! Job states are scripted: each `job()` call pops the next state and the
//! last one repeats forever.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::blob::Progress;
use super::error::AmsError;
use super::models::{
    Asset, AssetCreationOptions, AssetFile, ErrorDetail, Job, JobRequest, JobState, JobTask,
    Locator, MediaProcessor,
};
use super::service::MediaService;

pub const INPUT_ASSET: &str = "A1";
pub const OUTPUT_ASSET: &str = "A2";
pub const JOB_ID: &str = "J1";

struct MockState {
    states: VecDeque<JobState>,
    task_progress: f64,
    task_errors: Vec<ErrorDetail>,
    processors: Vec<MediaProcessor>,
    outputs: Vec<(String, String)>,
    has_output_asset: bool,
    fail_upload: bool,
    fail_download: bool,
    download_delay: Duration,
    active_downloads: usize,
    max_active_downloads: usize,
    calls: Vec<String>,
    deleted_assets: Vec<String>,
    cancel_calls: usize,
    submitted: Vec<JobRequest>,
    locator_durations: Vec<Duration>,
}

pub struct MockMediaService {
    state: Mutex<MockState>,
}

impl MockMediaService {
    /// A job that finishes on the first poll with no output files, and one
    /// indexer processor at version 2.1.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                states: VecDeque::from([JobState::Finished]),
                task_progress: 100.0,
                task_errors: Vec::new(),
                processors: vec![processor("p21", "2.1")],
                outputs: Vec::new(),
                has_output_asset: true,
                fail_upload: false,
                fail_download: false,
                download_delay: Duration::ZERO,
                active_downloads: 0,
                max_active_downloads: 0,
                calls: Vec::new(),
                deleted_assets: Vec::new(),
                cancel_calls: 0,
                submitted: Vec::new(),
                locator_durations: Vec::new(),
            }),
        }
    }

    fn with(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn with_states(self, states: &[JobState]) -> Self {
        self.with(|s| s.states = states.iter().copied().collect())
    }

    pub fn with_processors(self, processors: Vec<MediaProcessor>) -> Self {
        self.with(|s| s.processors = processors)
    }

    pub fn with_task_progress(self, progress: f64) -> Self {
        self.with(|s| s.task_progress = progress)
    }

    pub fn with_task_error(self, code: &str, message: &str) -> Self {
        self.with(|s| {
            s.task_errors.push(ErrorDetail {
                code: code.into(),
                message: message.into(),
            })
        })
    }

    pub fn with_output_file(self, name: &str, content: &str) -> Self {
        self.with(|s| s.outputs.push((name.into(), content.into())))
    }

    pub fn without_output_asset(self) -> Self {
        self.with(|s| s.has_output_asset = false)
    }

    pub fn failing_upload(self) -> Self {
        self.with(|s| s.fail_upload = true)
    }

    pub fn failing_download(self) -> Self {
        self.with(|s| s.fail_download = true)
    }

    pub fn with_download_delay(self, delay: Duration) -> Self {
        self.with(|s| s.download_delay = delay)
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn deleted_assets(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_assets.clone()
    }

    pub fn cancel_calls(&self) -> usize {
        self.state.lock().unwrap().cancel_calls
    }

    pub fn submitted(&self) -> Vec<JobRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn locator_durations(&self) -> Vec<Duration> {
        self.state.lock().unwrap().locator_durations.clone()
    }

    pub fn max_active_downloads(&self) -> usize {
        self.state.lock().unwrap().max_active_downloads
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }
}

pub fn processor(id: &str, version: &str) -> MediaProcessor {
    MediaProcessor {
        id: id.into(),
        name: "Azure Media Indexer 2 Preview".into(),
        version: version.into(),
    }
}

fn job(state: JobState) -> Job {
    Job {
        id: JOB_ID.into(),
        name: "Voice2Text Job".into(),
        state,
    }
}

#[async_trait]
impl MediaService for MockMediaService {
    async fn upload_asset(
        &self,
        path: &Path,
        _options: AssetCreationOptions,
        progress: Progress<'_>,
    ) -> Result<Asset, AmsError> {
        self.record("upload_asset");
        if self.state.lock().unwrap().fail_upload {
            return Err(AmsError::Status {
                status: 507,
                message: "quota exceeded".into(),
            });
        }
        progress(50.0);
        progress(100.0);
        Ok(Asset {
            id: INPUT_ASSET.into(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    async fn media_processors(&self, name: &str) -> Result<Vec<MediaProcessor>, AmsError> {
        self.record("media_processors");
        let state = self.state.lock().unwrap();
        Ok(state
            .processors
            .iter()
            .filter(|p| p.name == name)
            .cloned()
            .collect())
    }

    async fn submit_job(&self, request: &JobRequest) -> Result<Job, AmsError> {
        self.record("submit_job");
        self.state.lock().unwrap().submitted.push(request.clone());
        Ok(job(JobState::Queued))
    }

    async fn job(&self, _job_id: &str) -> Result<Job, AmsError> {
        let mut state = self.state.lock().unwrap();
        let current = if state.states.len() > 1 {
            state.states.pop_front()
        } else {
            state.states.front().copied()
        };
        Ok(job(current.unwrap_or(JobState::Queued)))
    }

    async fn job_tasks(&self, _job_id: &str) -> Result<Vec<JobTask>, AmsError> {
        let state = self.state.lock().unwrap();
        Ok(vec![JobTask {
            id: "T1".into(),
            name: "Voice2Text Task".into(),
            progress: state.task_progress,
            error_details: state.task_errors.clone(),
        }])
    }

    async fn job_output_assets(&self, _job_id: &str) -> Result<Vec<Asset>, AmsError> {
        self.record("job_output_assets");
        let state = self.state.lock().unwrap();
        Ok(if state.has_output_asset {
            vec![Asset {
                id: OUTPUT_ASSET.into(),
                name: "Voice2Text Output".into(),
            }]
        } else {
            Vec::new()
        })
    }

    async fn cancel_job(&self, _job_id: &str) -> Result<(), AmsError> {
        self.record("cancel_job");
        let mut state = self.state.lock().unwrap();
        state.cancel_calls += 1;
        state.states = VecDeque::from([JobState::Canceling, JobState::Canceled]);
        Ok(())
    }

    async fn delete_asset(&self, asset_id: &str) -> Result<(), AmsError> {
        self.record(format!("delete_asset {asset_id}"));
        self.state.lock().unwrap().deleted_assets.push(asset_id.into());
        Ok(())
    }

    async fn create_read_locator(&self, asset_id: &str, duration: Duration) -> Result<Locator, AmsError> {
        self.record("create_read_locator");
        self.state.lock().unwrap().locator_durations.push(duration);
        Ok(Locator {
            id: "L1".into(),
            path: format!("https://storage.invalid/{asset_id}?sig=x"),
            access_policy_id: "P1".into(),
        })
    }

    async fn asset_files(&self, _asset_id: &str) -> Result<Vec<AssetFile>, AmsError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .outputs
            .iter()
            .enumerate()
            .map(|(i, (name, content))| AssetFile {
                id: format!("F{i}"),
                name: name.clone(),
                content_file_size: content.len() as u64,
            })
            .collect())
    }

    async fn download_file(
        &self,
        _locator: &Locator,
        file: &AssetFile,
        dest: &Path,
        progress: Progress<'_>,
    ) -> Result<(), AmsError> {
        let (content, delay, fail) = {
            let mut state = self.state.lock().unwrap();
            state.active_downloads += 1;
            state.max_active_downloads = state.max_active_downloads.max(state.active_downloads);
            let content = state
                .outputs
                .iter()
                .find(|(name, _)| *name == file.name)
                .map(|(_, c)| c.clone())
                .unwrap_or_default();
            (content, state.download_delay, state.fail_download)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = if fail {
            Err(AmsError::Status {
                status: 403,
                message: "Signature expired".into(),
            })
        } else {
            tokio::fs::write(dest, content).await.map_err(AmsError::from)
        };

        self.state.lock().unwrap().active_downloads -= 1;
        if result.is_ok() {
            progress(100.0);
        }
        result
    }
}
