//! Uploader: local media file → new input asset.

use std::path::Path;
use std::sync::Arc;

use crate::ams::{Asset, AssetCreationOptions, MediaService};
use crate::error::{Result, Voice2TextError};

use super::report::{Reporter, RunEvent};

pub struct Uploader {
    service: Arc<dyn MediaService>,
    reporter: Arc<dyn Reporter>,
}

impl Uploader {
    pub fn new(service: Arc<dyn MediaService>, reporter: Arc<dyn Reporter>) -> Self {
        Self { service, reporter }
    }

    /// Upload `path` as a plain (unencrypted) asset, reporting progress.
    ///
    /// Any failure, local or remote, becomes [`Voice2TextError::UploadFailed`].
    pub async fn upload(&self, path: &Path) -> Result<Asset> {
        self.reporter.report(&RunEvent::Uploading {
            path: path.to_path_buf(),
        });

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reporter = Arc::clone(&self.reporter);
        let progress = move |percent: f64| {
            reporter.report(&RunEvent::UploadProgress {
                file_name: file_name.clone(),
                percent,
            })
        };

        let asset = self
            .service
            .upload_asset(path, AssetCreationOptions::None, &progress)
            .await
            .map_err(|e| Voice2TextError::UploadFailed(format!("{}: {e}", path.display())))?;

        log::info!("uploaded {} as asset {}", path.display(), asset.id);
        self.reporter.report(&RunEvent::Uploaded {
            asset_name: asset.name.clone(),
        });
        Ok(asset)
    }
}
