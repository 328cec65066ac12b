//! Directory scanner for unattended operation
//!
//! Walks a directory tree, turns `.dlc` containers into `links.txt` files and
//! downloads every `links.txt` into the directory that holds it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};

use crate::core::batch::{run_batch, BatchOptions};
use crate::core::container::{decrypt_container, DEFAULT_DECRYPT_BASE_URL};
use crate::core::error::Result;
use crate::core::source::read_links;
use crate::core::stream::RemoteFileService;

/// Name of the per-directory link list
pub const LINKS_FILE_NAME: &str = "links.txt";

/// Default pause between scan passes
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Options for scanning a directory tree
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub interval: Duration,
    pub decrypt_base_url: String,
    /// Batch settings; `output_dir` is replaced by each scanned directory
    pub batch: BatchOptions,
}

impl ScanOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            interval: DEFAULT_SCAN_INTERVAL,
            decrypt_base_url: DEFAULT_DECRYPT_BASE_URL.to_string(),
            batch: BatchOptions::default(),
        }
    }
}

/// What one scan pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub directories: usize,
    pub containers_decrypted: usize,
    pub batches: usize,
    pub failed_links: usize,
}

/// Run a single pass over the tree, depth-first with subdirectories in name order
pub async fn scan_once<S>(service: &S, options: &ScanOptions) -> Result<ScanSummary>
where
    S: RemoteFileService + ?Sized,
{
    let mut summary = ScanSummary::default();
    let mut pending = vec![options.root.clone()];

    while let Some(directory) = pending.pop() {
        eprintln!("🔍 Scanning {}...", directory.display());
        let (files, mut subdirs) = match list_directory(&directory).await {
            Ok(listing) => listing,
            Err(e) => {
                eprintln!("❌ Failed to read directory {}: {e}", directory.display());
                continue;
            }
        };
        summary.directories += 1;

        process_directory(service, options, &directory, &files, &mut summary).await;

        subdirs.reverse();
        pending.extend(subdirs);
    }

    Ok(summary)
}

/// Scan repeatedly until Ctrl-C, sleeping `options.interval` between passes
pub async fn watch<S>(service: &S, options: &ScanOptions) -> Result<()>
where
    S: RemoteFileService + ?Sized,
{
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    watch_until(service, options, ctrl_c).await
}

/// Scan repeatedly until `shutdown` completes.
///
/// `shutdown` is polled during passes as well as between them, so a pass in
/// progress is abandoned as soon as it fires.
pub async fn watch_until<S, F>(service: &S, options: &ScanOptions, shutdown: F) -> Result<()>
where
    S: RemoteFileService + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = scan_pass(service, options) => result?,
            _ = &mut shutdown => {
                eprintln!("👋 Stopping scanner");
                return Ok(());
            }
        }

        eprintln!("{}", waiting_message(options.interval));
        tokio::select! {
            _ = tokio::time::sleep(options.interval) => {}
            _ = &mut shutdown => {
                eprintln!("👋 Stopping scanner");
                return Ok(());
            }
        }
    }
}

async fn scan_pass<S>(service: &S, options: &ScanOptions) -> Result<()>
where
    S: RemoteFileService + ?Sized,
{
    if tokio::fs::metadata(&options.root).await.is_ok_and(|m| m.is_dir()) {
        let summary = scan_once(service, options).await?;
        debug!("Scan pass finished: {summary:?}");
    } else {
        eprintln!("❌ Directory {} not found.", options.root.display());
    }
    Ok(())
}

fn waiting_message(interval: Duration) -> String {
    format!("⏱️  Waiting {} seconds before next scan...", interval.as_secs_f64())
}

async fn process_directory<S>(
    service: &S,
    options: &ScanOptions,
    directory: &Path,
    files: &[PathBuf],
    summary: &mut ScanSummary,
) where
    S: RemoteFileService + ?Sized,
{
    let links_path = directory.join(LINKS_FILE_NAME);
    let container = files
        .iter()
        .find(|f| f.extension().is_some_and(|ext| ext == "dlc"));

    if let Some(container) = container {
        if links_path.exists() {
            eprintln!(
                "📄 {LINKS_FILE_NAME} already exists in {}, skipping decryption.",
                directory.display()
            );
        } else if write_links_from_container(container, &links_path, &options.decrypt_base_url).await {
            summary.containers_decrypted += 1;
        }
    }

    if !links_path.exists() {
        return;
    }

    let links = match read_links(&links_path).await {
        Ok(links) => links,
        Err(e) => {
            eprintln!("❌ Failed to read {}: {e}", links_path.display());
            return;
        }
    };
    if links.is_empty() {
        return;
    }

    eprintln!("📥 Processing {}", links_path.display());
    let batch = BatchOptions {
        output_dir: directory.to_path_buf(),
        ..options.batch.clone()
    };
    summary.batches += 1;
    match run_batch(service, &links, &batch).await {
        Ok(report) => summary.failed_links += report.failed.len(),
        Err(e) => eprintln!("❌ Batch in {} failed: {e}", directory.display()),
    }
}

/// Decrypt `container` and save its links; returns whether a list was written
async fn write_links_from_container(container: &Path, links_path: &Path, decrypt_base_url: &str) -> bool {
    eprintln!("🔓 Decrypting {}...", container.display());
    let links = match decrypt_container(container, decrypt_base_url).await {
        Ok(links) => links,
        Err(e) => {
            eprintln!("❌ Failed to decrypt {}: {e}", container.display());
            return false;
        }
    };

    if links.is_empty() {
        warn!("No links found in {}", container.display());
        return false;
    }

    match tokio::fs::write(links_path, links.join("\n")).await {
        Ok(()) => {
            eprintln!("💾 Saved {} links to {}", links.len(), links_path.display());
            true
        }
        Err(e) => {
            eprintln!("❌ Failed to write {}: {e}", links_path.display());
            false
        }
    }
}

/// Regular files and subdirectories of `directory`, each sorted by name.
/// Symlinks are not followed.
async fn list_directory(directory: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    let mut entries = tokio::fs::read_dir(directory).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    subdirs.sort();
    Ok((files, subdirs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::stream::{ContentChunk, ContentStream, FileMetadata};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Serves `<id>.bin` with the id's bytes as content
    struct EchoService;

    #[async_trait]
    impl RemoteFileService for EchoService {
        async fn metadata(&self, file_id: &str) -> Result<FileMetadata> {
            if file_id.starts_with("BAD") {
                return Err(Error::MetadataFetch {
                    file_id: file_id.to_string(),
                    message: "404".to_string(),
                });
            }
            Ok(FileMetadata {
                name: Some(format!("{file_id}.bin")),
                size: file_id.len() as u64,
            })
        }

        async fn stream_content(&self, file_id: &str) -> Result<ContentStream> {
            let chunk = ContentChunk {
                data: Bytes::from(file_id.to_string()),
                progress: file_id.len() as u64,
            };
            Ok(futures::stream::iter(vec![Ok(chunk)]).boxed())
        }
    }

    fn options(root: &Path, decrypt_base_url: String) -> ScanOptions {
        let mut options = ScanOptions::new(root);
        options.decrypt_base_url = decrypt_base_url;
        options.batch.failed_log = root.join("failed.txt");
        options.batch.download.retries = 0;
        options.batch.download.retry_delay = Duration::ZERO;
        options
    }

    #[tokio::test]
    async fn test_scan_decrypts_container_and_downloads_in_place() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"success": {"links": ["https://drive.google.com/file/d/GAME1/view"]}}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let root = tempdir().unwrap();
        let game = root.path().join("game");
        std::fs::create_dir(&game).unwrap();
        std::fs::write(game.join("pack.dlc"), b"container").unwrap();

        let opts = options(root.path(), mock_server.uri());
        let summary = scan_once(&EchoService, &opts).await.unwrap();

        assert_eq!(summary.directories, 2);
        assert_eq!(summary.containers_decrypted, 1);
        assert_eq!(summary.batches, 1);
        assert_eq!(summary.failed_links, 0);
        assert_eq!(
            std::fs::read_to_string(game.join(LINKS_FILE_NAME)).unwrap(),
            "https://drive.google.com/file/d/GAME1/view"
        );
        assert_eq!(std::fs::read(game.join("GAME1.bin")).unwrap(), b"GAME1");
    }

    #[tokio::test]
    async fn test_existing_links_file_skips_decryption() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let root = tempdir().unwrap();
        std::fs::write(root.path().join("pack.dlc"), b"container").unwrap();
        std::fs::write(root.path().join(LINKS_FILE_NAME), "OK1\nBAD1\n").unwrap();

        let opts = options(root.path(), mock_server.uri());
        let summary = scan_once(&EchoService, &opts).await.unwrap();

        assert_eq!(summary.containers_decrypted, 0);
        assert_eq!(summary.failed_links, 1);
        assert!(root.path().join("OK1.bin").exists());
        assert_eq!(
            std::fs::read_to_string(root.path().join("failed.txt")).unwrap(),
            "BAD1\n"
        );
    }

    /// Records the ids it is asked about and fails them all
    #[derive(Default)]
    struct RecordingService {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteFileService for RecordingService {
        async fn metadata(&self, file_id: &str) -> Result<FileMetadata> {
            self.seen.lock().unwrap().push(file_id.to_string());
            Err(Error::MetadataFetch {
                file_id: file_id.to_string(),
                message: "404".to_string(),
            })
        }

        async fn stream_content(&self, file_id: &str) -> Result<ContentStream> {
            Err(Error::Transfer(format!("no content for {file_id}")))
        }
    }

    #[tokio::test]
    async fn test_subdirectories_visited_in_name_order() {
        let root = tempdir().unwrap();
        // Created out of order so the walk cannot rely on creation order
        for (dir, id) in [("b", "B"), ("a/inner", "INNER"), ("a", "A"), ("", "ROOT")] {
            let dir = root.path().join(dir);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(LINKS_FILE_NAME), format!("{id}\n")).unwrap();
        }
        let opts = options(root.path(), "http://127.0.0.1:9/".to_string());
        let service = RecordingService::default();

        let summary = scan_once(&service, &opts).await.unwrap();

        assert_eq!(summary.directories, 4);
        assert_eq!(summary.batches, 4);
        assert_eq!(*service.seen.lock().unwrap(), vec!["ROOT", "A", "INNER", "B"]);
        assert_eq!(
            std::fs::read_to_string(root.path().join("failed.txt")).unwrap(),
            "ROOT\nA\nINNER\nB\n"
        );
    }

    /// First metadata lookup answers at once; later ones hang
    #[derive(Default)]
    struct StallingService {
        metadata_calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteFileService for StallingService {
        async fn metadata(&self, file_id: &str) -> Result<FileMetadata> {
            if self.metadata_calls.fetch_add(1, Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(FileMetadata {
                name: Some(format!("{file_id}.bin")),
                size: 0,
            })
        }

        async fn stream_content(&self, file_id: &str) -> Result<ContentStream> {
            EchoService.stream_content(file_id).await
        }
    }

    #[tokio::test]
    async fn test_watch_stops_during_a_later_pass() {
        let root = tempdir().unwrap();
        std::fs::write(root.path().join(LINKS_FILE_NAME), "SLOW\n").unwrap();
        let mut opts = options(root.path(), "http://127.0.0.1:9/".to_string());
        opts.interval = Duration::from_millis(20);
        let service = StallingService::default();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async {
            let _ = stopped.await;
        };
        let trigger = async {
            // Wait until the second pass is stuck on its lookup
            while service.metadata_calls.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = stop.send(());
        };

        let (result, ()) = tokio::time::timeout(
            Duration::from_secs(5),
            async { tokio::join!(watch_until(&service, &opts, shutdown), trigger) },
        )
        .await
        .expect("scanner kept running after shutdown");

        assert!(result.is_ok());
        assert_eq!(service.metadata_calls.load(Ordering::SeqCst), 2);
        assert!(root.path().join("SLOW.bin").exists());
    }

    #[tokio::test]
    async fn test_watch_stops_while_waiting() {
        let root = tempdir().unwrap();
        let mut opts = options(&root.path().join("missing"), "http://127.0.0.1:9/".to_string());
        opts.interval = Duration::from_secs(3600);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            watch_until(&EchoService, &opts, tokio::time::sleep(Duration::from_millis(50))),
        )
        .await
        .expect("scanner kept waiting after shutdown");
        assert!(result.is_ok());
    }

    #[test]
    fn test_waiting_message_keeps_sub_second_intervals() {
        assert!(waiting_message(Duration::from_millis(200)).contains("Waiting 0.2 seconds"));
        assert!(waiting_message(Duration::from_secs(60)).contains("Waiting 60 seconds"));
    }

    #[tokio::test]
    async fn test_list_directory_separates_files_and_dirs() {
        let root = tempdir().unwrap();
        std::fs::write(root.path().join("z.txt"), b"").unwrap();
        std::fs::write(root.path().join("a.dlc"), b"").unwrap();
        std::fs::create_dir(root.path().join("sub")).unwrap();

        let (files, dirs) = list_directory(root.path()).await.unwrap();
        assert_eq!(files, vec![root.path().join("a.dlc"), root.path().join("z.txt")]);
        assert_eq!(dirs, vec![root.path().join("sub")]);
    }

    #[tokio::test]
    async fn test_unreadable_root_is_skipped() {
        let root = tempdir().unwrap();
        let opts = options(&root.path().join("missing"), "http://127.0.0.1:9/".to_string());
        let summary = scan_once(&EchoService, &opts).await.unwrap();
        assert_eq!(summary, ScanSummary::default());
    }
}
