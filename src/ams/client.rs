//! `MediaServicesClient`: the REST implementation of [`MediaService`].
//!
//! Every call carries a bearer token from [`AzureAdTokenProvider`] and the
//! OData v3 headers the v2 API requires.  Entity keys such as
//! `nb:cid:UUID:…` are quoted and escaped into the path:
//!
//! ```text
//! GET {endpoint}Assets('nb%3Acid%3AUUID%3A…')/Files
//!     Authorization: Bearer …
//!     x-ms-version: 2.19
//!     Accept: application/json;odata=verbose
//! ```
//!
//! File contents never pass through this API; they move through blob
//! storage with [`BlobTransferClient`] using SAS locators created here.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::auth::AzureAdTokenProvider;
use super::blob::{blob_url, BlobTransferClient, Progress};
use super::error::{ensure_success, AmsError};
use super::models::{
    AccessPermissions, AccessPolicy, Asset, AssetCreationOptions, AssetFile, Envelope, Job,
    JobRequest, JobTask, Locator, MediaProcessor, Results, LOCATOR_TYPE_SAS,
};
use super::service::MediaService;
use crate::config::AppConfig;

const API_VERSION: &str = "2.19";
const ODATA_VERBOSE: &str = "application/json;odata=verbose";

/// Lifetime of the write locator used while uploading.
const UPLOAD_LOCATOR_MINUTES: f64 = 60.0;

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `Set('key')` with the key escaped for use inside a URL path.
fn entity_path(set: &str, id: &str) -> String {
    format!("{set}('{}')", id.replace('\'', "''").replace(':', "%3A"))
}

/// OData string literal (without the surrounding quotes).
fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Task body binding the job's first input to a new output asset.
fn task_body(output_asset_name: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><taskBody>\
         <inputAsset>JobInputAsset(0)</inputAsset>\
         <outputAsset assetCreationOptions=\"0\" assetName=\"{}\">JobOutputAsset(0)</outputAsset>\
         </taskBody>",
        xml_escape(output_asset_name)
    )
}

// ---------------------------------------------------------------------------
// MediaServicesClient
// ---------------------------------------------------------------------------

/// Media Services v2 REST client.
pub struct MediaServicesClient {
    http: reqwest::Client,
    /// REST endpoint, always ending in `/`.
    endpoint: String,
    tokens: AzureAdTokenProvider,
    blobs: BlobTransferClient,
}

impl MediaServicesClient {
    /// Build a client from validated settings.  No network traffic happens
    /// until [`authenticate`](Self::authenticate) or the first call.
    pub fn from_config(config: &AppConfig) -> Result<Self, AmsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.transfer.timeout_secs))
            .build()?;
        let tokens = AzureAdTokenProvider::new(http.clone(), &config.service);
        Ok(Self::new(http, &config.service.rest_api_endpoint, tokens, &config.transfer))
    }

    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        tokens: AzureAdTokenProvider,
        transfer: &crate::config::TransferConfig,
    ) -> Self {
        let mut endpoint = endpoint.trim().to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            blobs: BlobTransferClient::new(http.clone(), transfer),
            http,
            endpoint,
            tokens,
        }
    }

    /// Fetch the first token so bad credentials fail before any upload.
    pub async fn authenticate(&self) -> Result<(), AmsError> {
        self.tokens.token().await.map(|_| ())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // -----------------------------------------------------------------------
    // OData plumbing
    // -----------------------------------------------------------------------

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AmsError> {
        let token = self.tokens.token().await?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.endpoint, path))
            .bearer_auth(token)
            .header("x-ms-version", API_VERSION)
            .header("DataServiceVersion", "3.0")
            .header("MaxDataServiceVersion", "3.0")
            .header(ACCEPT, ODATA_VERBOSE))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AmsError> {
        let response = ensure_success(request.send().await?).await?;
        let text = response.text().await?;
        serde_json::from_str::<Envelope<T>>(&text)
            .map(|envelope| envelope.d)
            .map_err(|e| AmsError::Parse(e.to_string()))
    }

    async fn get_entity<T: DeserializeOwned>(&self, path: &str) -> Result<T, AmsError> {
        let request = self.request(Method::GET, path).await?;
        self.send(request).await
    }

    async fn get_collection<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, AmsError> {
        let request = self.request(Method::GET, path).await?;
        self.send::<Results<T>>(request).await.map(|r| r.results)
    }

    async fn post_entity<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, AmsError> {
        let request = self
            .request(Method::POST, path)
            .await?
            .header(CONTENT_TYPE, ODATA_VERBOSE)
            .body(body.to_string());
        self.send(request).await
    }

    async fn delete(&self, path: &str) -> Result<(), AmsError> {
        let request = self.request(Method::DELETE, path).await?;
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Access policies and locators
    // -----------------------------------------------------------------------

    async fn create_locator(
        &self,
        asset_id: &str,
        policy_name: &str,
        minutes: f64,
        permissions: AccessPermissions,
    ) -> Result<Locator, AmsError> {
        let policy: AccessPolicy = self
            .post_entity(
                "AccessPolicies",
                &json!({
                    "Name": policy_name,
                    "DurationInMinutes": minutes,
                    "Permissions": permissions,
                }),
            )
            .await?;
        self.post_entity(
            "Locators",
            &json!({
                "AccessPolicyId": policy.id,
                "AssetId": asset_id,
                "Type": LOCATOR_TYPE_SAS,
            }),
        )
        .await
    }

    /// Remove a locator and its policy; failures are only logged.
    async fn release_locator(&self, locator: &Locator) {
        if let Err(e) = self.delete(&entity_path("Locators", &locator.id)).await {
            log::warn!("could not delete locator {}: {e}", locator.id);
        }
        if !locator.access_policy_id.is_empty() {
            if let Err(e) = self
                .delete(&entity_path("AccessPolicies", &locator.access_policy_id))
                .await
            {
                log::warn!("could not delete access policy {}: {e}", locator.access_policy_id);
            }
        }
    }

    async fn upload_into(
        &self,
        asset: &Asset,
        path: &Path,
        file_name: &str,
        progress: Progress<'_>,
    ) -> Result<(), AmsError> {
        let locator = self
            .create_locator(
                &asset.id,
                "Voice2Text Upload",
                UPLOAD_LOCATOR_MINUTES,
                AccessPermissions::WRITE,
            )
            .await?;

        let transferred = async {
            let url = blob_url(&locator.path, file_name)?;
            self.blobs.upload(&url, path, progress).await?;
            let request = self
                .request(Method::GET, "CreateFileInfos")
                .await?
                .query(&[("assetid", format!("'{}'", odata_literal(&asset.id)))]);
            ensure_success(request.send().await?).await?;
            Ok::<_, AmsError>(())
        }
        .await;

        self.release_locator(&locator).await;
        transferred
    }
}

// ---------------------------------------------------------------------------
// MediaService impl
// ---------------------------------------------------------------------------

#[async_trait]
impl MediaService for MediaServicesClient {
    async fn upload_asset(
        &self,
        path: &Path,
        options: AssetCreationOptions,
        progress: Progress<'_>,
    ) -> Result<Asset, AmsError> {
        if options != AssetCreationOptions::None {
            return Err(AmsError::Unsupported("storage-encrypted assets".into()));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AmsError::Parse(format!("{} has no file name", path.display())))?;

        let asset: Asset = self
            .post_entity(
                "Assets",
                &json!({ "Name": file_name, "Options": options.wire_value() }),
            )
            .await?;
        log::debug!("created asset {} ({})", asset.name, asset.id);

        if let Err(e) = self.upload_into(&asset, path, &file_name, progress).await {
            if let Err(cleanup) = self.delete_asset(&asset.id).await {
                log::warn!("could not delete partial asset {}: {cleanup}", asset.id);
            }
            return Err(e);
        }
        Ok(asset)
    }

    async fn media_processors(&self, name: &str) -> Result<Vec<MediaProcessor>, AmsError> {
        let request = self
            .request(Method::GET, "MediaProcessors")
            .await?
            .query(&[("$filter", format!("Name eq '{}'", odata_literal(name)))]);
        self.send::<Results<MediaProcessor>>(request)
            .await
            .map(|r| r.results)
    }

    async fn submit_job(&self, request: &JobRequest) -> Result<Job, AmsError> {
        let input_uri = format!(
            "{}{}",
            self.endpoint,
            entity_path("Assets", &request.input_asset_id)
        );
        let body = json!({
            "Name": request.name,
            "InputMediaAssets": [ { "__metadata": { "uri": input_uri } } ],
            "Tasks": [ {
                "Name": request.task_name,
                "Configuration": request.configuration,
                "MediaProcessorId": request.processor_id,
                "TaskBody": task_body(&request.output_asset_name),
            } ],
        });
        self.post_entity("Jobs", &body).await
    }

    async fn job(&self, job_id: &str) -> Result<Job, AmsError> {
        self.get_entity(&entity_path("Jobs", job_id)).await
    }

    async fn job_tasks(&self, job_id: &str) -> Result<Vec<JobTask>, AmsError> {
        self.get_collection(&format!("{}/Tasks", entity_path("Jobs", job_id)))
            .await
    }

    async fn job_output_assets(&self, job_id: &str) -> Result<Vec<Asset>, AmsError> {
        self.get_collection(&format!("{}/OutputMediaAssets", entity_path("Jobs", job_id)))
            .await
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), AmsError> {
        let request = self
            .request(Method::GET, "CancelJob")
            .await?
            .query(&[("jobid", format!("'{}'", odata_literal(job_id)))]);
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn delete_asset(&self, asset_id: &str) -> Result<(), AmsError> {
        self.delete(&entity_path("Assets", asset_id)).await
    }

    async fn create_read_locator(&self, asset_id: &str, duration: Duration) -> Result<Locator, AmsError> {
        self.create_locator(
            asset_id,
            "Voice2Text Download",
            duration.as_secs_f64() / 60.0,
            AccessPermissions::READ,
        )
        .await
    }

    async fn asset_files(&self, asset_id: &str) -> Result<Vec<AssetFile>, AmsError> {
        self.get_collection(&format!("{}/Files", entity_path("Assets", asset_id)))
            .await
    }

    async fn download_file(
        &self,
        locator: &Locator,
        file: &AssetFile,
        dest: &Path,
        progress: Progress<'_>,
    ) -> Result<(), AmsError> {
        let url = blob_url(&locator.path, &file.name)?;
        self.blobs
            .download(&url, file.content_file_size, dest, progress)
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
