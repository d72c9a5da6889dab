//! Block-blob transfers against an asset container SAS URL.
//!
//! Uploads are split into fixed-size blocks that are sent with `Put Block`
//! and committed with one `Put Block List`.  Downloads of files larger than
//! one block are fetched as byte ranges in parallel and written in place:
//!
//! ```text
//! upload:   file ─┬─ block 0 ─┐
//!                 ├─ block 1 ─┼─► Put Block ×N ─► Put Block List
//!                 └─ block 2 ─┘
//!
//! download: GET Range 0..B ─┐
//!           GET Range B..2B ┼─► write at offset ─► file (pre-sized)
//!           GET Range 2B..  ┘
//! ```

use std::io::SeekFrom;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_TYPE, RANGE};
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::error::{ensure_success, AmsError};
use crate::config::TransferConfig;

/// Storage REST version sent with every blob request.
const STORAGE_VERSION: &str = "2019-12-12";

/// Progress callback, called with a percentage in `0.0..=100.0`.
pub type Progress<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Build the URL of `file_name` inside the container addressed by a SAS
/// locator path, keeping the SAS query string.
pub fn blob_url(container_sas: &str, file_name: &str) -> Result<Url, AmsError> {
    let mut url = Url::parse(container_sas)
        .map_err(|e| AmsError::Parse(format!("invalid locator path '{container_sas}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AmsError::Parse(format!("locator path '{container_sas}' has no path")))?
        .pop_if_empty()
        .push(file_name);
    Ok(url)
}

fn block_id(index: u64) -> String {
    BASE64.encode(format!("block-{index:08}"))
}

fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    }
}

/// Streams files to and from blob storage with bounded per-file parallelism.
#[derive(Clone)]
pub struct BlobTransferClient {
    http: reqwest::Client,
    block_size: u64,
    parallel_requests: usize,
}

impl BlobTransferClient {
    pub fn new(http: reqwest::Client, transfer: &TransferConfig) -> Self {
        Self {
            http,
            block_size: transfer.block_size_bytes.max(1),
            parallel_requests: transfer.parallel_transfer_threads.max(1),
        }
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    /// Upload `path` to the blob at `url`.  Returns the number of bytes sent.
    pub async fn upload(&self, url: &Url, path: &Path, progress: Progress<'_>) -> Result<u64, AmsError> {
        let total = tokio::fs::metadata(path).await?.len();
        let blocks = total.div_ceil(self.block_size);
        let sent = AtomicU64::new(0);
        progress(percent(0, total));

        futures::stream::iter(0..blocks)
            .map(|index| {
                let sent = &sent;
                async move {
                    let offset = index * self.block_size;
                    let len = self.block_size.min(total - offset);
                    self.put_block(url, path, index, offset, len).await?;
                    let done = sent.fetch_add(len, Ordering::Relaxed) + len;
                    progress(percent(done, total));
                    Ok::<_, AmsError>(())
                }
            })
            .buffer_unordered(self.parallel_requests)
            .try_collect::<Vec<()>>()
            .await?;

        self.put_block_list(url, blocks).await?;
        log::debug!("uploaded {} ({} bytes in {} blocks)", path.display(), total, blocks);
        Ok(total)
    }

    async fn put_block(&self, url: &Url, path: &Path, index: u64, offset: u64, len: u64) -> Result<(), AmsError> {
        let mut file = tokio::fs::File::open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf).await?;

        let mut block_url = url.clone();
        block_url
            .query_pairs_mut()
            .append_pair("comp", "block")
            .append_pair("blockid", &block_id(index));

        let response = self
            .http
            .put(block_url)
            .header("x-ms-version", STORAGE_VERSION)
            .body(buf)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn put_block_list(&self, url: &Url, blocks: u64) -> Result<(), AmsError> {
        let mut body = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList>");
        for index in 0..blocks {
            body.push_str("<Latest>");
            body.push_str(&block_id(index));
            body.push_str("</Latest>");
        }
        body.push_str("</BlockList>");

        let mut list_url = url.clone();
        list_url.query_pairs_mut().append_pair("comp", "blocklist");

        let response = self
            .http
            .put(list_url)
            .header("x-ms-version", STORAGE_VERSION)
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Download
    // -----------------------------------------------------------------------

    /// Download the blob at `url`, `size` bytes long, into `dest`.
    pub async fn download(&self, url: &Url, size: u64, dest: &Path, progress: Progress<'_>) -> Result<(), AmsError> {
        if size <= self.block_size {
            self.download_single(url, size, dest, progress).await
        } else {
            self.download_ranges(url, size, dest, progress).await
        }
    }

    async fn download_single(&self, url: &Url, size: u64, dest: &Path, progress: Progress<'_>) -> Result<(), AmsError> {
        let response = self
            .http
            .get(url.clone())
            .header("x-ms-version", STORAGE_VERSION)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut received = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress(percent(received.min(size), size));
        }
        file.flush().await?;
        progress(100.0);
        Ok(())
    }

    async fn download_ranges(&self, url: &Url, size: u64, dest: &Path, progress: Progress<'_>) -> Result<(), AmsError> {
        let file = tokio::fs::File::create(dest).await?;
        file.set_len(size).await?;
        drop(file);

        let ranges = size.div_ceil(self.block_size);
        let received = AtomicU64::new(0);

        futures::stream::iter(0..ranges)
            .map(|index| {
                let received = &received;
                async move {
                    let start = index * self.block_size;
                    let end = (start + self.block_size).min(size) - 1;
                    let len = self.get_range(url, dest, start, end).await?;
                    let done = received.fetch_add(len, Ordering::Relaxed) + len;
                    progress(percent(done.min(size), size));
                    Ok::<_, AmsError>(())
                }
            })
            .buffer_unordered(self.parallel_requests)
            .try_collect::<Vec<()>>()
            .await?;

        let total = received.load(Ordering::Relaxed);
        if total != size {
            return Err(AmsError::Parse(format!(
                "expected {size} bytes for {}, received {total}",
                dest.display()
            )));
        }
        Ok(())
    }

    async fn get_range(&self, url: &Url, dest: &Path, start: u64, end: u64) -> Result<u64, AmsError> {
        let response = self
            .http
            .get(url.clone())
            .header("x-ms-version", STORAGE_VERSION)
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await?;
        let bytes = ensure_success(response).await?.bytes().await?;

        let mut file = tokio::fs::OpenOptions::new().write(true).open(dest).await?;
        file.seek(SeekFrom::Start(start)).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(bytes.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
