//! Configuration module for voice2text.
//!
//! Provides `AppConfig` (service endpoint, credentials and tuning),
//! `AppPaths` for the settings file search order, and `JobFiles`, the
//! per-input layout including the opaque `config.json` job configuration.

pub mod job;
pub mod paths;
pub mod settings;

pub use job::{JobFiles, JOB_CONFIG_FILE};
pub use paths::AppPaths;
pub use settings::{AppConfig, AzureEnvironment, JobConfig, ServiceConfig, TransferConfig};
