//! # drive-dl
//!
//! Batch downloader for Google Drive share links.
//!
//! Reads a list of share links or bare file identifiers, downloads each file
//! in order, skips files already complete on disk, retries failures a bounded
//! number of times and appends links that still fail to a log file.
//!
//! ```no_run
//! use std::path::Path;
//! use drive_dl::{download_from_list, AuthConfig, BatchOptions, DriveConfig};
//!
//! # async fn run() -> drive_dl::Result<()> {
//! let report = download_from_list(
//!     Path::new("links.txt"),
//!     &AuthConfig::default(),
//!     DriveConfig::default(),
//!     &BatchOptions::default(),
//! )
//! .await?;
//! println!("{} of {} failed", report.failed.len(), report.attempted);
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::auth::{authenticate, AuthConfig, Authenticator, DRIVE_READONLY_SCOPE};
pub use crate::core::batch::{
    append_failure_log, download_from_list, run_batch, BatchOptions, BatchReport, DEFAULT_FAILED_LOG,
    DEFAULT_OUTPUT_DIR,
};
pub use crate::core::container::{
    decrypt_container, decrypt_container_url, decrypt_paste, parse_decrypt_response, DEFAULT_DECRYPT_BASE_URL,
};
pub use crate::core::downloader::{download_file, DownloadOutcome};
pub use crate::core::drive::{DriveConfig, DriveService};
pub use crate::core::error::{Error, Result};
pub use crate::core::scan::{scan_once, watch, watch_until, ScanOptions, ScanSummary, LINKS_FILE_NAME};
pub use crate::core::source::{extract_file_id, parse_links, read_links};
pub use crate::core::stream::{
    ContentChunk, ContentStream, DownloadOptions, FileMetadata, ProgressCallback, ProgressEvent,
    RemoteFileService,
};
