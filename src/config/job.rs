//! Per-input file layout: the media file, its directory and the job
//! configuration that sits next to it.

use std::path::{Path, PathBuf};

use crate::caption;
use crate::error::{Result, Voice2TextError};

/// File name of the processor configuration expected beside the input.
pub const JOB_CONFIG_FILE: &str = "config.json";

/// Every local path a run touches, derived from the input media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFiles {
    /// Absolute path of the media file.
    pub input_file: PathBuf,
    /// Directory holding the input; downloads land here too.
    pub directory: PathBuf,
    /// `<directory>/config.json`.
    pub job_config_file: PathBuf,
}

impl JobFiles {
    /// Resolve `input` to an absolute path and derive the sibling paths.
    ///
    /// Does not touch the filesystem beyond reading the working directory.
    pub fn new(input: impl AsRef<Path>) -> Result<Self> {
        let input_file = std::path::absolute(input.as_ref())?;
        let directory = input_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let job_config_file = directory.join(JOB_CONFIG_FILE);

        Ok(Self {
            input_file,
            directory,
            job_config_file,
        })
    }

    /// `<stem>_aud_SpReco.vtt` in the input directory.
    pub fn caption_file(&self) -> PathBuf {
        caption::caption_path(&self.input_file)
    }

    /// `<stem>_aud_SpReco.vtt.txt` in the input directory.
    pub fn transcript_file(&self) -> PathBuf {
        caption::transcript_path(&self.caption_file())
    }

    /// Read the processor configuration verbatim.
    pub fn load_job_configuration(&self) -> Result<String> {
        if !self.job_config_file.is_file() {
            return Err(Voice2TextError::ConfigurationMissing(format!(
                "job configuration {} does not exist",
                self.job_config_file.display()
            )));
        }
        Ok(std::fs::read_to_string(&self.job_config_file)?)
    }
}
