//! Job orchestrator: processor lookup, submission and the poll loop.
//!
//! ```text
//! resolve_processor ──► submit ──► watch
//!                                   │  every poll_interval_ms
//!                                   ├─ job state   → JobStateChanged on change
//!                                   ├─ task progress → JobProgress
//!                                   ├─ terminal?   → outcome
//!                                   └─ cancelled?  → stop watching
//!                                                    (or cancel remotely and
//!                                                     keep polling)
//! ```

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ams::{Asset, Job, JobRequest, JobState, JobTask, MediaProcessor, MediaService};
use crate::config::JobConfig;
use crate::error::{JobExecutionError, Result, Voice2TextError};

use super::report::{Reporter, RunEvent};

const TASK_NAME: &str = "Voice2Text Task";
const OUTPUT_ASSET_NAME: &str = "Voice2Text Output";

// ---------------------------------------------------------------------------
// Processor versions
// ---------------------------------------------------------------------------

/// Dotted numeric version, compared component by component.
///
/// Missing trailing components count as zero, so `2.1 == 2.1.0`.
#[derive(Debug, Clone, Eq)]
pub struct ProcessorVersion(Vec<u64>);

impl FromStr for ProcessorVersion {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .split('.')
            .map(str::parse)
            .collect::<std::result::Result<Vec<u64>, _>>()
            .map(ProcessorVersion)
    }
}

impl Ord for ProcessorVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ProcessorVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ProcessorVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

/// Highest-versioned processor; entries whose version does not parse are
/// skipped.
pub fn latest_processor(processors: Vec<MediaProcessor>) -> Option<MediaProcessor> {
    processors
        .into_iter()
        .filter_map(|p| match p.version.parse::<ProcessorVersion>() {
            Ok(version) => Some((version, p)),
            Err(_) => {
                log::warn!("ignoring processor {} with version '{}'", p.id, p.version);
                None
            }
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, p)| p)
}

// ---------------------------------------------------------------------------
// JobOutcome
// ---------------------------------------------------------------------------

/// How watching a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The job finished; `output` is its first output asset.
    Finished { job: Job, output: Asset },
    /// The job ended in `Error`.
    Failed { job: Job, error: JobExecutionError },
    /// The job was canceled, or watching stopped before a terminal state.
    Stopped { job: Job },
}

impl JobOutcome {
    pub fn job(&self) -> &Job {
        match self {
            JobOutcome::Finished { job, .. }
            | JobOutcome::Failed { job, .. }
            | JobOutcome::Stopped { job } => job,
        }
    }

    /// `true` once the service will not touch the job's input any more.
    pub fn is_terminal(&self) -> bool {
        self.job().state.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// JobOrchestrator
// ---------------------------------------------------------------------------

pub struct JobOrchestrator {
    service: Arc<dyn MediaService>,
    reporter: Arc<dyn Reporter>,
    config: JobConfig,
}

impl JobOrchestrator {
    pub fn new(service: Arc<dyn MediaService>, reporter: Arc<dyn Reporter>, config: JobConfig) -> Self {
        Self {
            service,
            reporter,
            config,
        }
    }

    /// Latest version of the configured processor.
    pub async fn resolve_processor(&self) -> Result<MediaProcessor> {
        let name = &self.config.processor_name;
        let candidates = self.service.media_processors(name).await?;
        let processor = latest_processor(candidates)
            .ok_or_else(|| Voice2TextError::ProcessorNotFound(name.clone()))?;
        log::info!("using {} version {} ({})", processor.name, processor.version, processor.id);
        Ok(processor)
    }

    /// Submit one indexing task over `input` with the opaque `configuration`.
    pub async fn submit(
        &self,
        input: &Asset,
        configuration: &str,
        processor: &MediaProcessor,
    ) -> Result<Job> {
        let request = JobRequest {
            name: self.config.job_name.clone(),
            task_name: TASK_NAME.into(),
            input_asset_id: input.id.clone(),
            processor_id: processor.id.clone(),
            configuration: configuration.to_string(),
            output_asset_name: OUTPUT_ASSET_NAME.into(),
        };
        self.reporter.report(&RunEvent::JobSubmitted {
            job_name: request.name.clone(),
        });
        let job = self.service.submit_job(&request).await?;
        log::info!("submitted job {} ({})", job.name, job.id);
        Ok(job)
    }

    /// Poll `job` until it is terminal or `cancel` fires.
    pub async fn watch(&self, job: Job, cancel: &CancellationToken) -> Result<JobOutcome> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut last_state: Option<JobState> = None;
        let mut cancel_sent = false;

        let job = loop {
            let current = self.service.job(&job.id).await?;
            if last_state != Some(current.state) {
                log::debug!("job {} is {}", current.id, current.state);
                self.reporter.report(&RunEvent::JobStateChanged {
                    state: current.state,
                });
                last_state = Some(current.state);
            }

            let tasks = self.service.job_tasks(&current.id).await?;
            self.reporter.report(&RunEvent::JobProgress {
                percent: overall_progress(&tasks),
                state: current.state,
            });

            if current.state.is_terminal() {
                break current;
            }

            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancel_sent => true,
                _ = tokio::time::sleep(interval) => false,
            };
            if !cancelled {
                continue;
            }

            self.reporter.report(&RunEvent::CancelRequested);
            if self.config.cancel_remote_job {
                log::info!("cancelling job {}", current.id);
                self.service.cancel_job(&current.id).await?;
                cancel_sent = true;
            } else {
                log::warn!("stopped watching job {} while {}", current.id, current.state);
                self.reporter.report(&RunEvent::WatchStopped {
                    state: current.state,
                });
                return Ok(JobOutcome::Stopped { job: current });
            }
        };

        match job.state {
            JobState::Error => {
                let tasks = self.service.job_tasks(&job.id).await?;
                let error = first_error(&tasks);
                log::error!("job {} failed: {error}", job.id);
                self.reporter.report(&RunEvent::JobFailed(error.clone()));
                Ok(JobOutcome::Failed { job, error })
            }
            JobState::Finished => {
                let output = self
                    .service
                    .job_output_assets(&job.id)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        Voice2TextError::DownloadFailed(format!(
                            "job {} finished without an output asset",
                            job.id
                        ))
                    })?;
                Ok(JobOutcome::Finished { job, output })
            }
            _ => Ok(JobOutcome::Stopped { job }),
        }
    }
}

/// Mean progress over all tasks; zero for a job without tasks.
fn overall_progress(tasks: &[JobTask]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    tasks.iter().map(|t| t.progress).sum::<f64>() / tasks.len() as f64
}

/// First error detail of the first task.
fn first_error(tasks: &[JobTask]) -> JobExecutionError {
    tasks
        .first()
        .and_then(|t| t.error_details.first())
        .map(|d| JobExecutionError {
            code: d.code.clone(),
            message: d.message.clone(),
        })
        .unwrap_or_else(|| JobExecutionError {
            code: "Unknown".into(),
            message: "the job failed without error details".into(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ams::mock::{processor, MockMediaService, INPUT_ASSET, OUTPUT_ASSET};
    use crate::pipeline::report::RecordingReporter;

    fn fast_config() -> JobConfig {
        JobConfig {
            poll_interval_ms: 1,
            ..JobConfig::default()
        }
    }

    fn input() -> Asset {
        Asset {
            id: INPUT_ASSET.into(),
            name: "speech.mp4".into(),
        }
    }

    fn orchestrator(
        service: Arc<MockMediaService>,
        config: JobConfig,
    ) -> (JobOrchestrator, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::default());
        (JobOrchestrator::new(service, reporter.clone(), config), reporter)
    }

    async fn submitted(orch: &JobOrchestrator) -> Job {
        let processor = orch.resolve_processor().await.expect("processor");
        orch.submit(&input(), "{}", &processor).await.expect("submit")
    }

    #[test]
    fn picks_highest_version() {
        let picked = latest_processor(vec![
            processor("a", "2.0"),
            processor("b", "2.1"),
            processor("c", "1.9"),
        ])
        .expect("some");
        assert_eq!(picked.version, "2.1");
    }

    #[test]
    fn versions_compare_numerically() {
        let v = |s: &str| s.parse::<ProcessorVersion>().expect("version");
        assert!(v("1.10") > v("1.9"));
        assert!(v("2.0.1") > v("2.0"));
        assert_eq!(v("2.1"), v("2.1.0"));
    }

    #[test]
    fn unparseable_versions_are_ignored() {
        let picked = latest_processor(vec![processor("a", "1.0"), processor("b", "beta")]);
        assert_eq!(picked.map(|p| p.id), Some("a".to_string()));
        assert!(latest_processor(vec![processor("x", "")]).is_none());
    }

    #[tokio::test]
    async fn unknown_processor_is_an_error() {
        let service = Arc::new(MockMediaService::new().with_processors(Vec::new()));
        let (orch, _) = orchestrator(service, fast_config());

        let err = orch.resolve_processor().await.unwrap_err();
        assert!(matches!(err, Voice2TextError::ProcessorNotFound(n) if n == "Azure Media Indexer 2 Preview"));
    }

    #[tokio::test]
    async fn submit_passes_configuration_through() {
        let service = Arc::new(MockMediaService::new());
        let (orch, _) = orchestrator(service.clone(), fast_config());
        let processor = processor("p21", "2.1");

        orch.submit(&input(), "{\"Features\":[]}", &processor)
            .await
            .expect("submit");

        let sent = service.submitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "Voice2Text Job");
        assert_eq!(sent[0].task_name, "Voice2Text Task");
        assert_eq!(sent[0].input_asset_id, INPUT_ASSET);
        assert_eq!(sent[0].processor_id, "p21");
        assert_eq!(sent[0].configuration, "{\"Features\":[]}");
        assert_eq!(sent[0].output_asset_name, "Voice2Text Output");
    }

    #[tokio::test]
    async fn finished_job_yields_first_output() {
        let service = Arc::new(MockMediaService::new().with_states(&[
            JobState::Queued,
            JobState::Processing,
            JobState::Processing,
            JobState::Finished,
        ]));
        let (orch, reporter) = orchestrator(service, fast_config());
        let job = submitted(&orch).await;

        let outcome = orch.watch(job, &CancellationToken::new()).await.expect("watch");

        match outcome {
            JobOutcome::Finished { output, .. } => assert_eq!(output.id, OUTPUT_ASSET),
            other => panic!("unexpected {other:?}"),
        }
        let changes: Vec<JobState> = reporter
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::JobStateChanged { state } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            vec![JobState::Queued, JobState::Processing, JobState::Finished]
        );
    }

    #[tokio::test]
    async fn task_progress_is_reported_each_poll() {
        let service = Arc::new(
            MockMediaService::new()
                .with_states(&[JobState::Processing, JobState::Finished])
                .with_task_progress(42.0),
        );
        let (orch, reporter) = orchestrator(service, fast_config());
        let job = submitted(&orch).await;

        orch.watch(job, &CancellationToken::new()).await.expect("watch");

        let progress: Vec<(f64, JobState)> = reporter
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::JobProgress { percent, state } => Some((percent, state)),
                _ => None,
            })
            .collect();
        assert_eq!(
            progress,
            vec![(42.0, JobState::Processing), (42.0, JobState::Finished)]
        );
    }

    #[tokio::test]
    async fn error_state_reports_first_task_error() {
        let service = Arc::new(
            MockMediaService::new()
                .with_states(&[JobState::Processing, JobState::Error])
                .with_task_error("E1", "bad input")
                .with_task_error("E2", "ignored"),
        );
        let (orch, reporter) = orchestrator(service, fast_config());
        let job = submitted(&orch).await;

        let outcome = orch.watch(job, &CancellationToken::new()).await.expect("watch");

        let expected = JobExecutionError {
            code: "E1".into(),
            message: "bad input".into(),
        };
        match outcome {
            JobOutcome::Failed { error, .. } => assert_eq!(error, expected),
            other => panic!("unexpected {other:?}"),
        }
        assert!(reporter.events().contains(&RunEvent::JobFailed(expected)));
    }

    #[tokio::test]
    async fn error_without_details_uses_placeholder() {
        let service = Arc::new(MockMediaService::new().with_states(&[JobState::Error]));
        let (orch, _) = orchestrator(service, fast_config());
        let job = submitted(&orch).await;

        match orch.watch(job, &CancellationToken::new()).await.expect("watch") {
            JobOutcome::Failed { error, .. } => assert_eq!(error.code, "Unknown"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn pre_cancelled_token_stops_watching() {
        let service = Arc::new(MockMediaService::new().with_states(&[JobState::Processing]));
        let (orch, reporter) = orchestrator(service.clone(), fast_config());
        let job = submitted(&orch).await;
        let token = CancellationToken::new();
        token.cancel();

        let outcome = orch.watch(job, &token).await.expect("watch");

        assert!(matches!(&outcome, JobOutcome::Stopped { job } if job.state == JobState::Processing));
        assert!(!outcome.is_terminal());
        assert_eq!(service.cancel_calls(), 0);
        assert!(reporter.events().contains(&RunEvent::WatchStopped {
            state: JobState::Processing
        }));
    }

    #[tokio::test]
    async fn remote_cancel_polls_until_canceled() {
        let service = Arc::new(MockMediaService::new().with_states(&[JobState::Processing]));
        let config = JobConfig {
            cancel_remote_job: true,
            ..fast_config()
        };
        let (orch, _) = orchestrator(service.clone(), config);
        let job = submitted(&orch).await;
        let token = CancellationToken::new();
        token.cancel();

        let outcome = orch.watch(job, &token).await.expect("watch");

        assert_eq!(service.cancel_calls(), 1);
        assert_eq!(outcome.job().state, JobState::Canceled);
        assert!(outcome.is_terminal());
    }

    #[tokio::test]
    async fn finished_without_output_is_download_failed() {
        let service = Arc::new(MockMediaService::new().without_output_asset());
        let (orch, _) = orchestrator(service, fast_config());
        let job = submitted(&orch).await;

        let err = orch.watch(job, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Voice2TextError::DownloadFailed(_)));
    }

    #[test]
    fn progress_is_mean_of_tasks() {
        let task = |p: f64| JobTask {
            id: "t".into(),
            name: String::new(),
            progress: p,
            error_details: Vec::new(),
        };
        assert_eq!(overall_progress(&[]), 0.0);
        assert!((overall_progress(&[task(20.0), task(60.0)]) - 40.0).abs() < f64::EPSILON);
    }
}
