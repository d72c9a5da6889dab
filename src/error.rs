//! Crate-wide error taxonomy.
//!
//! Every phase of a run maps its failures onto one [`Voice2TextError`]
//! variant.  Transport-level problems surface first as
//! [`AmsError`](crate::ams::AmsError) and are converted at the phase boundary
//! so the caller can tell *where* the run broke, not just *how*.
//!
//! [`JobExecutionError`] is special: it describes a remote task failure and is
//! normally carried inside [`JobOutcome::Failed`](crate::pipeline::JobOutcome)
//! rather than returned as an `Err`.

use thiserror::Error;

use crate::ams::AmsError;

// ---------------------------------------------------------------------------
// JobExecutionError
// ---------------------------------------------------------------------------

/// The first error reported by a failed processing task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error: {code}. {message}")]
pub struct JobExecutionError {
    /// Service error code (e.g. `"UserInput"`).
    pub code: String,
    /// Human-readable error text from the service.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Voice2TextError
// ---------------------------------------------------------------------------

/// All errors that can end a run.
#[derive(Debug, Error)]
pub enum Voice2TextError {
    /// Settings file, a required key, or the job configuration is absent.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// The identity provider rejected the credentials or was unreachable.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The input file could not be pushed to remote storage.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// No media processor with the requested name exists.
    #[error("unknown media processor '{0}'")]
    ProcessorNotFound(String),

    /// The remote processing task failed.
    #[error(transparent)]
    JobExecution(#[from] JobExecutionError),

    /// At least one output file could not be downloaded.
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// A remote call outside the phases above failed (submission, polling,
    /// cleanup).
    #[error("media service error: {0}")]
    Service(#[from] AmsError),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Voice2TextError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_execution_error_display_matches_console_format() {
        let e = JobExecutionError {
            code: "E1".into(),
            message: "bad input".into(),
        };
        assert_eq!(e.to_string(), "Error: E1. bad input");
    }

    #[test]
    fn processor_not_found_names_processor() {
        let e = Voice2TextError::ProcessorNotFound("Indexer".into());
        assert!(e.to_string().contains("Indexer"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: Voice2TextError = io.into();
        assert!(matches!(e, Voice2TextError::Io(_)));
    }
}
