//! Azure Media Services v2 client.
//!
//! This module provides:
//! * [`MediaService`]: async trait covering every remote operation a run
//!   needs (assets, processors, jobs, locators, file transfer).
//! * [`MediaServicesClient`]: REST implementation of that trait.
//! * [`AzureAdTokenProvider`]: client-credentials bearer tokens, cached.
//! * [`BlobTransferClient`]: SAS block upload and ranged parallel download.
//! * Wire entities ([`Asset`], [`Job`], [`JobTask`], …) and [`AmsError`].
//!
//! ```text
//! MediaServicesClient ──► Azure AD   (token)
//!        │            ──► REST API   (OData v3 verbose)
//!        └─ BlobTransferClient ──► Blob storage (SAS)
//! ```

pub mod auth;
pub mod blob;
pub mod client;
pub mod error;
pub mod models;
pub mod service;

#[cfg(test)]
pub mod mock;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use auth::{AzureAdCredentials, AzureAdTokenProvider};
pub use blob::{blob_url, BlobTransferClient, Progress};
pub use client::MediaServicesClient;
pub use error::AmsError;
pub use models::{
    AccessPermissions, AccessPolicy, Asset, AssetCreationOptions, AssetFile, ErrorDetail, Job,
    JobRequest, JobState, JobTask, Locator, MediaProcessor,
};
pub use service::MediaService;
