//! Single-file download with skip, verification and bounded retry
//!
//! [`download_file`] never returns an error: every per-file failure is retried
//! up to `options.retries` times and a terminal failure is reported through
//! [`DownloadOutcome`] after any partial file has been removed.

use std::path::{Path, PathBuf};

use futures::TryStreamExt;
use log::debug;
use tokio::io::AsyncWriteExt;

use crate::core::error::{Error, Result};
use crate::core::source::resolve_output_filename;
use crate::core::stream::{DownloadOptions, ProgressEvent, RemoteFileService};

/// Result of downloading one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub success: bool,
    /// Local file name, if metadata was ever resolved
    pub file_name: Option<String>,
    /// Declared size; 0 when unknown or after a terminal failure
    pub expected_size: u64,
    /// Size on disk; 0 after a terminal failure
    pub actual_size: u64,
}

impl DownloadOutcome {
    /// Whether the batch should count this file as done.
    ///
    /// A declared size of zero is treated as unknown and never makes a file short.
    pub fn is_complete(&self) -> bool {
        self.success && !(self.expected_size > 0 && self.actual_size < self.expected_size)
    }

    fn failed(file_name: Option<String>) -> Self {
        Self {
            success: false,
            file_name,
            expected_size: 0,
            actual_size: 0,
        }
    }
}

/// Destination resolved during an attempt, kept for cleanup after the last one
#[derive(Debug, Clone)]
struct Destination {
    name: String,
    path: PathBuf,
}

/// Download one file into `output_dir`, retrying on any failure.
///
/// Makes at most `options.retries + 1` attempts with `options.retry_delay`
/// between them. An existing local file at least as large as the declared size
/// is accepted without any transfer.
pub async fn download_file<S>(
    service: &S,
    file_id: &str,
    output_dir: &Path,
    options: &DownloadOptions,
) -> DownloadOutcome
where
    S: RemoteFileService + ?Sized,
{
    let mut destination = None;
    let mut retries_left = options.retries;

    loop {
        match attempt_download(service, file_id, output_dir, options, &mut destination).await {
            Ok(outcome) => return outcome,
            Err(e) => {
                eprintln!("❌ Error downloading {file_id}: {e}");
                if retries_left == 0 {
                    break;
                }
                eprintln!("⏳ Retrying... ({retries_left} retries left)");
                retries_left -= 1;
                tokio::time::sleep(options.retry_delay).await;
            }
        }
    }

    if let Some(ref dest) = destination {
        remove_partial(dest).await;
    }
    DownloadOutcome::failed(destination.map(|d| d.name))
}

async fn attempt_download<S>(
    service: &S,
    file_id: &str,
    output_dir: &Path,
    options: &DownloadOptions,
    destination: &mut Option<Destination>,
) -> Result<DownloadOutcome>
where
    S: RemoteFileService + ?Sized,
{
    let metadata = service.metadata(file_id).await?;
    let name = resolve_output_filename(metadata.name.as_deref(), file_id);
    let path = output_dir.join(&name);
    *destination = Some(Destination {
        name: name.clone(),
        path: path.clone(),
    });

    if let Some(existing) = local_size(&path).await {
        if existing >= metadata.size {
            eprintln!("✅ Skipping {name} (already complete)");
            return Ok(DownloadOutcome {
                success: true,
                file_name: Some(name),
                expected_size: metadata.size,
                actual_size: existing,
            });
        }
        debug!("{name} is short ({existing}/{}), downloading again", metadata.size);
    }

    eprintln!("⬇️  Downloading {}...", path.display());
    let mut file = tokio::fs::File::create(&path).await?;

    options.report(ProgressEvent::Started {
        name: &name,
        total: metadata.size,
    });
    let transfer = async {
        let mut stream = service.stream_content(file_id).await?;
        while let Some(chunk) = stream.try_next().await? {
            file.write_all(&chunk.data).await?;
            options.report(ProgressEvent::Advanced {
                downloaded: chunk.progress,
            });
        }
        file.flush().await?;
        Ok::<(), Error>(())
    }
    .await;
    options.report(ProgressEvent::Finished);
    transfer?;
    drop(file);

    let actual = tokio::fs::metadata(&path).await?.len();
    if metadata.size > 0 && actual < metadata.size {
        return Err(Error::IncompleteTransfer {
            expected: metadata.size,
            actual,
        });
    }

    eprintln!("✅ Downloaded: {name}");
    Ok(DownloadOutcome {
        success: true,
        file_name: Some(name),
        expected_size: metadata.size,
        actual_size: actual,
    })
}

async fn local_size(path: &Path) -> Option<u64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.is_file().then(|| metadata.len())
}

async fn remove_partial(dest: &Destination) {
    if local_size(&dest.path).await.is_none() {
        return;
    }
    match tokio::fs::remove_file(&dest.path).await {
        Ok(()) => eprintln!("🗑️  Deleted incomplete file: {}", dest.name),
        Err(e) => eprintln!("⚠️  Could not delete incomplete file {}: {e}", dest.path.display()),
    }
}
