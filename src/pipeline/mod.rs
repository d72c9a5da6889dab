//! Transcription pipeline for voice2text.
//!
//! This module wires the full upload → job → download → caption flow on top
//! of a [`MediaService`](crate::ams::MediaService).
//!
//! # Architecture
//!
//! ```text
//! TranscriptionPipeline::run()
//!        │
//!        ├─ Uploader::upload              → input asset
//!        ├─ JobOrchestrator::resolve_processor / submit
//!        ├─ JobOrchestrator::watch        ← CancellationToken (Esc)
//!        │     └─ JobOutcome::{Finished, Failed, Stopped}
//!        ├─ delete input asset (terminal outcomes)
//!        ├─ Downloader::download          → <dir>/<file>…
//!        ├─ delete output asset
//!        └─ caption::clean_caption_file   → <stem>_aud_SpReco.vtt.txt
//!
//! every phase ──RunEvent──► Reporter (console, or a recorder in tests)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use voice2text::ams::MediaServicesClient;
//! use voice2text::config::{AppConfig, JobFiles};
//! use voice2text::pipeline::{ConsoleReporter, TranscriptionPipeline};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::load()?;
//! let files = JobFiles::new("speech.mp4")?;
//! let job_configuration = files.load_job_configuration()?;
//!
//! let client = MediaServicesClient::from_config(&config)?;
//! client.authenticate().await?;
//!
//! let pipeline = TranscriptionPipeline::new(Arc::new(client), Arc::new(ConsoleReporter::new()), config);
//! let report = pipeline.run(&files, &job_configuration, CancellationToken::new()).await?;
//! println!("{report:?}");
//! # Ok(())
//! # }
//! ```

pub mod download;
pub mod job;
pub mod report;
pub mod runner;
pub mod upload;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use download::Downloader;
pub use job::{latest_processor, JobOrchestrator, JobOutcome, ProcessorVersion};
pub use report::{ConsoleReporter, Reporter, RunEvent};
pub use runner::{RunReport, TranscriptionPipeline};
pub use upload::Uploader;
