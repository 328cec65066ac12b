//! Remote file service capability and download option types
//!
//! The downloader only talks to [`RemoteFileService`]; the Google Drive client
//! is one implementation of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::core::error::Result;

/// Metadata reported by the remote service for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Remote file name, if the service reported one
    pub name: Option<String>,
    /// Declared size in bytes; 0 means unknown
    pub size: u64,
}

/// One piece of file content with the cumulative byte count so far
#[derive(Debug, Clone)]
pub struct ContentChunk {
    pub data: Bytes,
    pub progress: u64,
}

/// Lazy, finite sequence of content chunks
pub type ContentStream = BoxStream<'static, Result<ContentChunk>>;

/// Capability to read file metadata and content from a remote store
#[async_trait]
pub trait RemoteFileService: Send + Sync {
    /// Fetch name and declared size for a file identifier
    async fn metadata(&self, file_id: &str) -> Result<FileMetadata>;

    /// Open a content stream for a file identifier
    async fn stream_content(&self, file_id: &str) -> Result<ContentStream>;
}

/// Progress notifications emitted during a single transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent<'a> {
    Started { name: &'a str, total: u64 },
    Advanced { downloaded: u64 },
    Finished,
}

/// Progress callback function type
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent<'_>) + Send + Sync>;

/// Default number of retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 3;

/// Default pause between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Options for single-file downloads
#[derive(Clone)]
pub struct DownloadOptions {
    /// Optional progress callback
    pub progress: Option<ProgressCallback>,

    /// Retries after the first failed attempt
    pub retries: u32,

    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            progress: None,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl DownloadOptions {
    pub(crate) fn report(&self, event: ProgressEvent<'_>) {
        if let Some(ref progress) = self.progress {
            progress(event);
        }
    }
}

impl std::fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("progress", &self.progress.is_some())
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}
