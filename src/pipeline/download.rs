//! Downloader: every file of an output asset → the local directory.
//!
//! All files start together; a semaphore keeps at most
//! `concurrent_transfers` of them moving at once.  The call returns when
//! every file is on disk or the first one fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::ams::{Asset, AssetFile, Locator, MediaService};
use crate::config::TransferConfig;
use crate::error::{Result, Voice2TextError};

use super::report::{Reporter, RunEvent};

/// Per-file progress is reported each time it crosses another step.
const PROGRESS_STEP: f64 = 10.0;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

pub struct Downloader {
    service: Arc<dyn MediaService>,
    reporter: Arc<dyn Reporter>,
    transfer: TransferConfig,
}

impl Downloader {
    pub fn new(service: Arc<dyn MediaService>, reporter: Arc<dyn Reporter>, transfer: TransferConfig) -> Self {
        Self {
            service,
            reporter,
            transfer,
        }
    }

    /// Download all files of `asset` into `destination`, returning the local
    /// paths in listing order.
    pub async fn download(&self, asset: &Asset, destination: &Path) -> Result<Vec<PathBuf>> {
        let duration = Duration::from_secs(u64::from(self.transfer.locator_duration_days) * SECONDS_PER_DAY);
        let locator = self
            .service
            .create_read_locator(&asset.id, duration)
            .await
            .map_err(|e| Voice2TextError::DownloadFailed(format!("read locator for {}: {e}", asset.id)))?;
        let files = self
            .service
            .asset_files(&asset.id)
            .await
            .map_err(|e| Voice2TextError::DownloadFailed(format!("listing files of {}: {e}", asset.id)))?;
        log::info!("downloading {} file(s) of asset {}", files.len(), asset.id);

        let limit = Arc::new(Semaphore::new(self.transfer.concurrent_transfers.max(1)));
        let transfers = files.iter().map(|file| {
            let limit = Arc::clone(&limit);
            let locator = &locator;
            async move {
                let _permit = limit
                    .acquire()
                    .await
                    .map_err(|e| Voice2TextError::DownloadFailed(e.to_string()))?;
                self.download_file(locator, file, destination).await
            }
        });

        futures::future::try_join_all(transfers).await
    }

    async fn download_file(&self, locator: &Locator, file: &AssetFile, destination: &Path) -> Result<PathBuf> {
        let dest = destination.join(local_name(&file.name)?);
        self.reporter.report(&RunEvent::DownloadStarted { path: dest.clone() });

        let reporter = Arc::clone(&self.reporter);
        let file_name = file.name.clone();
        let last_step = std::sync::Mutex::new(-1i64);
        let progress = move |percent: f64| {
            let step = (percent / PROGRESS_STEP).floor() as i64;
            let mut last = last_step.lock().unwrap_or_else(|e| e.into_inner());
            if step > *last {
                *last = step;
                reporter.report(&RunEvent::DownloadProgress {
                    file_name: file_name.clone(),
                    percent,
                });
            }
        };

        self.service
            .download_file(locator, file, &dest, &progress)
            .await
            .map_err(|e| Voice2TextError::DownloadFailed(format!("{}: {e}", file.name)))?;
        log::debug!("downloaded {} ({} bytes)", dest.display(), file.content_file_size);
        Ok(dest)
    }
}

/// Final path component of a remote file name, so a listing can never
/// write outside the destination directory.
fn local_name(remote: &str) -> Result<&str> {
    Path::new(remote)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Voice2TextError::DownloadFailed(format!("unusable file name '{remote}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ams::mock::{MockMediaService, OUTPUT_ASSET};
    use crate::pipeline::report::RecordingReporter;
    use tempfile::tempdir;

    fn output() -> Asset {
        Asset {
            id: OUTPUT_ASSET.into(),
            name: "Voice2Text Output".into(),
        }
    }

    #[tokio::test]
    async fn writes_every_file_into_destination() {
        let service = Arc::new(
            MockMediaService::new()
                .with_output_file("speech_aud_SpReco.vtt", "WEBVTT\n")
                .with_output_file("speech.ttml", "<tt/>"),
        );
        let reporter = Arc::new(RecordingReporter::default());
        let downloader = Downloader::new(service.clone(), reporter.clone(), TransferConfig::default());
        let dir = tempdir().expect("temp dir");

        let paths = downloader.download(&output(), dir.path()).await.expect("download");

        assert_eq!(
            paths,
            vec![dir.path().join("speech_aud_SpReco.vtt"), dir.path().join("speech.ttml")]
        );
        assert_eq!(std::fs::read_to_string(&paths[1]).expect("read"), "<tt/>");
        assert_eq!(service.locator_durations(), vec![Duration::from_secs(30 * 86_400)]);
        assert!(reporter.events().contains(&RunEvent::DownloadProgress {
            file_name: "speech.ttml".into(),
            percent: 100.0
        }));
    }

    #[tokio::test]
    async fn files_download_concurrently_within_limit() {
        let mut service = MockMediaService::new().with_download_delay(Duration::from_millis(50));
        for i in 0..6 {
            service = service.with_output_file(&format!("part{i}.bin"), "x");
        }
        let service = Arc::new(service);
        let transfer = TransferConfig {
            concurrent_transfers: 4,
            ..TransferConfig::default()
        };
        let downloader = Downloader::new(service.clone(), Arc::new(RecordingReporter::default()), transfer);
        let dir = tempdir().expect("temp dir");

        let paths = downloader.download(&output(), dir.path()).await.expect("download");

        assert_eq!(paths.len(), 6);
        assert!(paths.iter().all(|p| p.exists()));
        assert_eq!(service.max_active_downloads(), 4);
    }

    #[tokio::test]
    async fn any_failure_is_download_failed() {
        let service = Arc::new(
            MockMediaService::new()
                .with_output_file("a.vtt", "x")
                .failing_download(),
        );
        let downloader = Downloader::new(service, Arc::new(RecordingReporter::default()), TransferConfig::default());
        let dir = tempdir().expect("temp dir");

        let err = downloader.download(&output(), dir.path()).await.unwrap_err();
        assert!(matches!(err, Voice2TextError::DownloadFailed(m) if m.contains("a.vtt")));
    }

    #[test]
    fn remote_names_are_confined_to_destination() {
        assert_eq!(local_name("../../etc/passwd").expect("name"), "passwd");
        assert_eq!(local_name("speech.vtt").expect("name"), "speech.vtt");
        assert!(local_name("..").is_err());
    }
}
