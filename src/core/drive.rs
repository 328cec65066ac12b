//! Google Drive v3 implementation of the remote file service
//!
//! Content is fetched as a series of ranged `alt=media` requests so each
//! yielded chunk is bounded by the configured chunk size.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use once_cell::sync::Lazy;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::core::auth::Authenticator;
use crate::core::error::{Error, Result};
use crate::core::stream::{ContentChunk, ContentStream, FileMetadata, RemoteFileService};

/// Public Drive v3 endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Bytes requested per ranged content request
pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Global HTTP client shared by all Drive requests
static GLOBAL_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(format!("drive-dl/{}", env!("DRIVE_DL_VERSION")))
        .build()
        .expect("Failed to create HTTP client")
});

/// Configuration for the Drive API client
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Base URL of the Drive v3 API
    pub api_base_url: String,

    /// Size of each ranged content request
    pub chunk_size: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    name: Option<String>,
    /// Drive reports sizes as decimal strings; absent for native docs
    size: Option<String>,
}

/// Authenticated Drive API handle
pub struct DriveService {
    client: Client,
    auth: Arc<Authenticator>,
    config: DriveConfig,
}

impl DriveService {
    /// Create a service using the shared HTTP client
    pub fn new(auth: Authenticator, config: DriveConfig) -> Self {
        Self::with_client(GLOBAL_CLIENT.clone(), auth, config)
    }

    pub fn with_client(client: Client, auth: Authenticator, config: DriveConfig) -> Self {
        Self {
            client,
            auth: Arc::new(auth),
            config,
        }
    }

    fn file_url(&self, file_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| {
            Error::InvalidInput(format!("invalid API base URL '{}': {e}", self.config.api_base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidInput(format!("API base URL cannot take a path: {}", self.config.api_base_url)))?
            .pop_if_empty()
            .push("files")
            .push(file_id);
        url.query_pairs_mut().append_pair("supportsAllDrives", "true");
        Ok(url)
    }
}

#[async_trait]
impl RemoteFileService for DriveService {
    async fn metadata(&self, file_id: &str) -> Result<FileMetadata> {
        let metadata_error = |message: String| Error::MetadataFetch {
            file_id: file_id.to_string(),
            message,
        };

        let mut url = self.file_url(file_id)?;
        url.query_pairs_mut().append_pair("fields", "name,size");

        let token = self.auth.access_token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| metadata_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(metadata_error(format!("{status} {}", summarize_body(&body))));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| metadata_error(format!("malformed metadata: {e}")))?;

        let size = file
            .size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        debug!("Metadata for {file_id}: name={:?} size={size}", file.name);

        Ok(FileMetadata { name: file.name, size })
    }

    async fn stream_content(&self, file_id: &str) -> Result<ContentStream> {
        let mut url = self.file_url(file_id)?;
        url.query_pairs_mut().append_pair("alt", "media");

        let state = RangeState {
            client: self.client.clone(),
            auth: Arc::clone(&self.auth),
            url,
            chunk_size: self.config.chunk_size.max(1),
            offset: 0,
            total: None,
            done: false,
        };

        Ok(futures::stream::try_unfold(state, next_range).boxed())
    }
}

/// Cursor for successive ranged content requests
struct RangeState {
    client: Client,
    auth: Arc<Authenticator>,
    url: Url,
    chunk_size: u64,
    offset: u64,
    total: Option<u64>,
    done: bool,
}

async fn next_range(mut state: RangeState) -> Result<Option<(ContentChunk, RangeState)>> {
    if state.done || state.total.is_some_and(|total| state.offset >= total) {
        return Ok(None);
    }

    let end = state.offset + state.chunk_size - 1;
    let token = state.auth.access_token().await?;
    let response = state
        .client
        .get(state.url.clone())
        .bearer_auth(token)
        .header(RANGE, format!("bytes={}-{end}", state.offset))
        .send()
        .await
        .map_err(|e| Error::Transfer(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::RANGE_NOT_SATISFIABLE {
        // Requested past the end: the previous chunk was the last one
        return Ok(None);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Transfer(format!(
            "content request returned {status} {}",
            summarize_body(&body)
        )));
    }

    let partial = status == StatusCode::PARTIAL_CONTENT;
    if partial {
        state.total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);
    }

    let data = response
        .bytes()
        .await
        .map_err(|e| Error::Transfer(format!("stream read error: {e}")))?;
    state.offset += data.len() as u64;

    if !partial || (data.len() as u64) < state.chunk_size {
        state.done = true;
    }
    if data.is_empty() {
        return Ok(None);
    }

    let progress = state.offset;
    Ok(Some((ContentChunk { data, progress }, state)))
}

/// Total length from a `Content-Range: bytes 0-99/1000` header; `None` for `*`
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

/// First line of an error body, kept short for console output
fn summarize_body(body: &str) -> String {
    let line = body.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    line.chars().take(200).collect()
}
