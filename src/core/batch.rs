//! Batch driver: download every link of a list and log the failures
//!
//! Links are processed strictly in order, one at a time. A failing link never
//! stops the batch; it is recorded and appended to the failure log at the end.

use std::path::{Path, PathBuf};

use log::info;
use tokio::io::AsyncWriteExt;

use crate::core::auth::{authenticate, AuthConfig};
use crate::core::downloader::download_file;
use crate::core::drive::{DriveConfig, DriveService};
use crate::core::error::Result;
use crate::core::source::{extract_file_id, read_links};
use crate::core::stream::{DownloadOptions, RemoteFileService};

/// Default directory for downloaded files
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Default failure log path
pub const DEFAULT_FAILED_LOG: &str = "failed_downloads.txt";

/// Options for a batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub failed_log: PathBuf,
    pub download: DownloadOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            failed_log: PathBuf::from(DEFAULT_FAILED_LOG),
            download: DownloadOptions::default(),
        }
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of links attempted
    pub attempted: usize,
    /// Original links that did not complete, in processing order
    pub failed: Vec<String>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Download every link with an already-authenticated service.
///
/// Creates the output directory if needed. Only errors creating the directory
/// or writing the failure log are returned; per-link failures end up in the
/// report and the log.
pub async fn run_batch<S>(service: &S, links: &[String], options: &BatchOptions) -> Result<BatchReport>
where
    S: RemoteFileService + ?Sized,
{
    tokio::fs::create_dir_all(&options.output_dir).await?;

    let mut report = BatchReport {
        attempted: links.len(),
        failed: Vec::new(),
    };

    for (index, link) in links.iter().enumerate() {
        let file_id = extract_file_id(link);
        eprintln!("\n[{}/{}] Downloading file ID: {file_id}", index + 1, links.len());

        let outcome = download_file(service, &file_id, &options.output_dir, &options.download).await;

        if !outcome.is_complete() {
            let label = outcome.file_name.as_deref().unwrap_or(file_id.as_str());
            eprintln!("⚠️  Logged failed file: {label}");
            report.failed.push(link.clone());
        }
    }

    if report.all_succeeded() {
        eprintln!("\n✅ All missing files downloaded successfully!");
    } else {
        append_failure_log(&options.failed_log, &report.failed).await?;
        eprintln!(
            "\n⚠️  {} files failed and were deleted. Logged to '{}'",
            report.failed.len(),
            options.failed_log.display()
        );
    }

    Ok(report)
}

/// Authenticate, read the link list at `links_file` and download everything in it
pub async fn download_from_list(
    links_file: &Path,
    auth: &AuthConfig,
    drive: DriveConfig,
    options: &BatchOptions,
) -> Result<BatchReport> {
    tokio::fs::create_dir_all(&options.output_dir).await?;

    let service = DriveService::new(authenticate(auth).await?, drive);
    let links = read_links(links_file).await?;
    info!("Read {} links from {}", links.len(), links_file.display());

    run_batch(&service, &links, options).await
}

/// Append links to the failure log, one per line, creating it if absent
pub async fn append_failure_log(path: &Path, links: &[String]) -> Result<()> {
    if links.is_empty() {
        return Ok(());
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    let mut payload = links.join("\n");
    payload.push('\n');
    file.write_all(payload.as_bytes()).await?;
    file.flush().await?;

    info!("Appended {} links to {}", links.len(), path.display());
    Ok(())
}
