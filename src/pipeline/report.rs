//! Run events and the sinks that display them.
//!
//! Every phase of [`TranscriptionPipeline`](super::TranscriptionPipeline)
//! pushes a [`RunEvent`] into a [`Reporter`] instead of printing directly.
//! [`ConsoleReporter`] renders them as the familiar progress and status
//! lines; tests use a recording sink.
//!
//! ```text
//! Uploading 'speech.mp4' - Progress: 100%
//! Submitting Speech Recognition Job.
//! Job is Queued...
//! Processing Job. Please wait...
//! Processing - 42% Processing
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::ams::JobState;
use crate::error::JobExecutionError;

// ---------------------------------------------------------------------------
// RunEvent
// ---------------------------------------------------------------------------

/// Something worth telling the operator about.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The job configuration file is being read.
    ReadingConfiguration { path: PathBuf },
    /// Upload of the input file is about to start.
    Uploading { path: PathBuf },
    UploadProgress { file_name: String, percent: f64 },
    Uploaded { asset_name: String },
    JobSubmitted { job_name: String },
    /// The job moved to a new state.
    JobStateChanged { state: JobState },
    /// Poll tick: mean task progress and current state.
    JobProgress { percent: f64, state: JobState },
    /// The job ended in `Error`; carries the first task error.
    JobFailed(JobExecutionError),
    /// Tells the operator which key stops the poll loop.
    EscapeHint { cancels_job: bool },
    CancelRequested,
    /// Watching stopped before the job reached a terminal state.
    WatchStopped { state: JobState },
    InputAssetDeleted { asset_name: String },
    DownloadingOutput,
    DownloadStarted { path: PathBuf },
    DownloadProgress { file_name: String, percent: f64 },
    TranscriptWritten { path: PathBuf },
    Done,
}

/// Sink for [`RunEvent`]s.  Shared between the orchestrator and the
/// download tasks, so it must be `Send + Sync`.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &RunEvent);
}

// ---------------------------------------------------------------------------
// ConsoleReporter
// ---------------------------------------------------------------------------

/// Writes events to stdout.
///
/// Progress ticks overwrite the current line with `\r`; the next full line
/// first terminates the overwritten one.  While the cancel-key watcher has
/// the terminal in raw mode, line breaks are written as `\r\n`.
#[derive(Default)]
pub struct ConsoleReporter {
    inline_open: AtomicBool,
    out: Mutex<()>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn newline() -> &'static str {
        if crossterm::terminal::is_raw_mode_enabled().unwrap_or(false) {
            "\r\n"
        } else {
            "\n"
        }
    }

    fn line(&self, text: &str) {
        let _guard = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let nl = Self::newline();
        let mut stdout = std::io::stdout().lock();
        if self.inline_open.swap(false, Ordering::Relaxed) {
            let _ = write!(stdout, "{nl}");
        }
        let _ = write!(stdout, "{text}{nl}");
        let _ = stdout.flush();
    }

    fn inline(&self, text: &str) {
        let _guard = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\r{text}");
        let _ = stdout.flush();
        self.inline_open.store(true, Ordering::Relaxed);
    }
}

/// Status line printed when the job enters `state`; `Error` is silent
/// because the failure details are reported separately.
pub fn state_line(state: JobState) -> Option<&'static str> {
    match state {
        JobState::Queued => Some("Job is Queued..."),
        JobState::Scheduled => Some("Job is Scheduled."),
        JobState::Processing => Some("Processing Job. Please wait..."),
        JobState::Finished => Some("Job is Done."),
        JobState::Canceling => Some("Job is Canceling..."),
        JobState::Canceled => Some("Job is CANCELED."),
        JobState::Error => None,
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, event: &RunEvent) {
        match event {
            RunEvent::ReadingConfiguration { path } => {
                self.line(&format!("Reading Configuration File {}", path.display()))
            }
            RunEvent::Uploading { path } => {
                self.line(&format!("Preparing to Upload '{}'", path.display()))
            }
            RunEvent::UploadProgress { file_name, percent } => {
                self.inline(&format!("Uploading '{file_name}' - Progress: {percent:.2}%  "))
            }
            RunEvent::Uploaded { .. } => self.line("Done."),
            RunEvent::JobSubmitted { .. } => self.line("Submitting Speech Recognition Job."),
            RunEvent::JobStateChanged { state } => {
                if let Some(text) = state_line(*state) {
                    self.line(text);
                }
            }
            RunEvent::JobProgress { percent, state } => {
                self.inline(&format!("Processing - {percent:.0}% {state}    "))
            }
            RunEvent::JobFailed(error) => self.line(&error.to_string()),
            RunEvent::EscapeHint { cancels_job } => {
                if *cancels_job {
                    self.line("Press Esc to cancel the job.")
                } else {
                    self.line("Press Esc to stop watching the job.")
                }
            }
            RunEvent::CancelRequested => self.line("Cancel requested."),
            RunEvent::WatchStopped { state } => self.line(&format!(
                "Stopped watching. Job is still {state} on the service."
            )),
            RunEvent::InputAssetDeleted { asset_name } => {
                self.line(&format!("Cleaning Input Asset: {asset_name}"))
            }
            RunEvent::DownloadingOutput => self.line("Downloading output..."),
            RunEvent::DownloadStarted { path } => {
                self.line(&format!("File download path:  {}", path.display()))
            }
            RunEvent::DownloadProgress { file_name, percent } => {
                self.line(&format!("{file_name}: {percent:.0} % download progress."))
            }
            RunEvent::TranscriptWritten { path } => {
                self.line(&format!("Transcript written to {}", path.display()))
            }
            RunEvent::Done => self.line("Done."),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter  (test-only)
// ---------------------------------------------------------------------------

/// Keeps every event for later assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<RunEvent>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn report(&self, event: &RunEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
