//! End-to-end run: upload → job → cleanup → download → caption cleaning.
//!
//! [`TranscriptionPipeline`] owns the ordering of the phases and the remote
//! cleanup rules:
//!
//! ```text
//! upload ─► resolve + submit ─► watch ─► delete input ─► download ─► delete output ─► clean .vtt
//!              │ error              │
//!              └─► delete input     ├─ terminal      → delete input
//!                                   ├─ still running → keep input (job needs it)
//!                                   └─ poll error    → keep input
//! ```
//!
//! The output asset is deleted only once every file is on disk.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::ams::{Asset, JobState, MediaService};
use crate::caption;
use crate::config::{AppConfig, JobFiles};
use crate::error::{JobExecutionError, Result, Voice2TextError};
use crate::keyboard::EscapeWatcher;

use super::download::Downloader;
use super::job::{JobOrchestrator, JobOutcome};
use super::report::{Reporter, RunEvent};
use super::upload::Uploader;

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    /// Outputs downloaded; `transcript` is `None` when the job emitted no
    /// caption file.
    Transcribed {
        downloaded: Vec<PathBuf>,
        transcript: Option<PathBuf>,
    },
    /// The remote task failed; nothing was downloaded.
    JobFailed(JobExecutionError),
    /// Watching ended without a result, in the given job state.
    Stopped(JobState),
}

// ---------------------------------------------------------------------------
// TranscriptionPipeline
// ---------------------------------------------------------------------------

pub struct TranscriptionPipeline {
    service: Arc<dyn MediaService>,
    reporter: Arc<dyn Reporter>,
    config: AppConfig,
    escape_key: bool,
}

impl TranscriptionPipeline {
    pub fn new(service: Arc<dyn MediaService>, reporter: Arc<dyn Reporter>, config: AppConfig) -> Self {
        Self {
            service,
            reporter,
            config,
            escape_key: false,
        }
    }

    /// Watch the terminal for Esc while the job runs.
    pub fn with_escape_key(mut self, enabled: bool) -> Self {
        self.escape_key = enabled;
        self
    }

    /// Run every phase for `files`.  `cancel` stops the poll loop; the
    /// Esc watcher, when enabled, feeds the same token.
    pub async fn run(
        &self,
        files: &JobFiles,
        job_configuration: &str,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let uploader = Uploader::new(Arc::clone(&self.service), Arc::clone(&self.reporter));
        let input = uploader.upload(&files.input_file).await?;

        let orchestrator = JobOrchestrator::new(
            Arc::clone(&self.service),
            Arc::clone(&self.reporter),
            self.config.job.clone(),
        );

        let submitted = async {
            let processor = orchestrator.resolve_processor().await?;
            orchestrator.submit(&input, job_configuration, &processor).await
        }
        .await;
        let job = match submitted {
            Ok(job) => job,
            Err(e) => {
                self.discard_input(&input).await;
                return Err(e);
            }
        };

        let watched = {
            let _watcher = self.start_escape_watcher(&cancel);
            orchestrator.watch(job, &cancel).await
        };
        let outcome = match watched {
            Ok(outcome) => outcome,
            Err(e @ Voice2TextError::Service(_)) => {
                log::warn!("job state unknown; keeping input asset {}", input.id);
                return Err(e);
            }
            Err(e) => {
                self.discard_input(&input).await;
                return Err(e);
            }
        };

        if outcome.is_terminal() {
            self.discard_input(&input).await;
        } else {
            log::warn!(
                "job {} is still {}; keeping input asset {}",
                outcome.job().id,
                outcome.job().state,
                input.id
            );
        }

        match outcome {
            JobOutcome::Failed { error, .. } => Ok(RunReport::JobFailed(error)),
            JobOutcome::Stopped { job } => Ok(RunReport::Stopped(job.state)),
            JobOutcome::Finished { output, .. } => self.collect(files, &output).await,
        }
    }

    fn start_escape_watcher(&self, cancel: &CancellationToken) -> Option<EscapeWatcher> {
        if !self.escape_key {
            return None;
        }
        let watcher = EscapeWatcher::start(cancel.clone())?;
        self.reporter.report(&RunEvent::EscapeHint {
            cancels_job: self.config.job.cancel_remote_job,
        });
        Some(watcher)
    }

    async fn collect(&self, files: &JobFiles, output: &Asset) -> Result<RunReport> {
        self.reporter.report(&RunEvent::DownloadingOutput);
        let downloader = Downloader::new(
            Arc::clone(&self.service),
            Arc::clone(&self.reporter),
            self.config.transfer.clone(),
        );
        let downloaded = downloader.download(output, &files.directory).await?;

        if let Err(e) = self.service.delete_asset(&output.id).await {
            log::warn!("could not delete output asset {}: {e}", output.id);
        }

        let transcript = caption::clean_caption_file(&files.input_file)?;
        if let Some(path) = &transcript {
            self.reporter.report(&RunEvent::TranscriptWritten { path: path.clone() });
        }
        self.reporter.report(&RunEvent::Done);

        Ok(RunReport::Transcribed {
            downloaded,
            transcript,
        })
    }

    /// Best-effort delete of the uploaded input.
    async fn discard_input(&self, input: &Asset) {
        match self.service.delete_asset(&input.id).await {
            Ok(()) => self.reporter.report(&RunEvent::InputAssetDeleted {
                asset_name: input.name.clone(),
            }),
            Err(e) => log::warn!("could not delete input asset {}: {e}", input.id),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
