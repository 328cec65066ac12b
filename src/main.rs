//! # drive-dl CLI
//!
//! Command-line interface for the drive-dl library.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use drive_dl::{
    AuthConfig, BatchOptions, DownloadOptions, DriveConfig, DriveService, ScanOptions,
    DEFAULT_DECRYPT_BASE_URL, DEFAULT_FAILED_LOG, DEFAULT_OUTPUT_DIR,
};
use log::{debug, error};

mod cli;

/// Command-line interface for drive-dl
#[derive(Parser)]
#[command(name = "drive-dl")]
#[command(about = "Batch downloader for Google Drive share links")]
#[command(long_about = "Downloads every file listed in a link file from Google Drive:
  drive-dl download                    # Download links.txt into ./downloads
  drive-dl download list.txt -o out    # Custom list and output directory
  drive-dl scan --dir /mnt/games       # Watch a tree of links.txt / .dlc files
  drive-dl decrypt pack.dlc            # Print the links inside a container
  drive-dl decrypt --url URL           # ... of a container hosted elsewhere

Files already complete on disk are skipped. Links that still fail after
retrying are appended to failed_downloads.txt.")]
#[command(version = env!("DRIVE_DL_VERSION"))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// OAuth client secrets downloaded from the cloud console
    #[arg(long, global = true, env = "DRIVE_DL_CREDENTIALS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Cached OAuth token, written after the first login
    #[arg(long, global = true, env = "DRIVE_DL_TOKEN", default_value = "token.json")]
    token: PathBuf,

    /// Bearer token issued elsewhere; skips the OAuth flow
    #[arg(long, global = true, env = "DRIVE_DL_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every link of a list
    Download(DownloadArgs),
    /// Repeatedly scan a directory tree for links.txt and .dlc files
    Scan(ScanArgs),
    /// Decrypt a .dlc container and print its links
    Decrypt(DecryptArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct DecryptArgs {
    /// Container file to upload
    file: Option<PathBuf>,

    /// Link to a container the service downloads itself
    #[arg(long)]
    url: Option<String>,

    /// File whose text content is pasted to the service
    #[arg(long)]
    paste: Option<PathBuf>,
}

#[derive(Args)]
struct DownloadArgs {
    /// Newline-delimited list of share links or file IDs
    #[arg(default_value = "links.txt")]
    links_file: PathBuf,

    /// Directory for downloaded files
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    #[command(flatten)]
    retry: RetryArgs,

    /// Show resolved file IDs without downloading
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct ScanArgs {
    /// Root directory to scan
    #[arg(long, env = "GAMES_DIR", default_value = "/mnt/games")]
    dir: PathBuf,

    /// Pause between scans in milliseconds
    #[arg(long, env = "SCAN_INTERVAL", default_value_t = 60_000)]
    interval_ms: u64,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    #[command(flatten)]
    retry: RetryArgs,
}

#[derive(Args)]
struct RetryArgs {
    /// Log of links that failed after all retries (appended)
    #[arg(long, default_value = DEFAULT_FAILED_LOG)]
    failed_log: PathBuf,

    /// Retries per file after the first attempt
    #[arg(long, default_value_t = 3)]
    retries: u32,
}

impl RetryArgs {
    fn batch_options(&self, output_dir: PathBuf) -> BatchOptions {
        let progress = cli::ProgressManager::new();
        BatchOptions {
            output_dir,
            failed_log: self.failed_log.clone(),
            download: DownloadOptions {
                progress: Some(progress.callback()),
                retries: self.retries,
                ..Default::default()
            },
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    if cli.verbose {
        eprintln!("📂 drive-dl v{} starting...", env!("DRIVE_DL_VERSION"));
    }

    let auth = AuthConfig {
        credentials_path: cli.credentials,
        token_path: cli.token,
        access_token: cli.access_token,
        ..Default::default()
    };

    match cli.command {
        Command::Download(args) => download(args, &auth).await,
        Command::Scan(args) => scan(args, &auth).await,
        Command::Decrypt(args) => decrypt(args).await,
    }
}

async fn download(args: DownloadArgs, auth: &AuthConfig) -> anyhow::Result<()> {
    if args.dry_run {
        let links = drive_dl::read_links(&args.links_file)
            .await
            .with_context(|| format!("reading {}", args.links_file.display()))?;
        for link in &links {
            let file_id = drive_dl::extract_file_id(link);
            eprintln!("🔍 [DRY RUN] Would download {file_id} ({link}) to {}", args.output.display());
        }
        return Ok(());
    }

    let options = args.retry.batch_options(args.output);
    debug!("Batch options: {options:?}");
    drive_dl::download_from_list(&args.links_file, auth, DriveConfig::default(), &options)
        .await
        .with_context(|| format!("downloading links from {}", args.links_file.display()))?;
    Ok(())
}

async fn scan(args: ScanArgs, auth: &AuthConfig) -> anyhow::Result<()> {
    let authenticator = drive_dl::authenticate(auth).await?;
    let service = DriveService::new(authenticator, DriveConfig::default());

    let options = ScanOptions {
        interval: Duration::from_millis(args.interval_ms),
        decrypt_base_url: DEFAULT_DECRYPT_BASE_URL.to_string(),
        batch: args.retry.batch_options(args.dir.clone()),
        root: args.dir,
    };

    if args.once {
        let summary = drive_dl::scan_once(&service, &options).await?;
        eprintln!(
            "✅ Scanned {} directories, ran {} batches, {} links failed",
            summary.directories, summary.batches, summary.failed_links
        );
        return Ok(());
    }

    drive_dl::watch(&service, &options).await?;
    Ok(())
}

async fn decrypt(args: DecryptArgs) -> anyhow::Result<()> {
    let (source, links) = match (args.file, args.url, args.paste) {
        (Some(file), _, _) => {
            eprintln!("🔓 Decrypting {}...", file.display());
            let links = drive_dl::decrypt_container(&file, DEFAULT_DECRYPT_BASE_URL).await?;
            (file.display().to_string(), links)
        }
        (None, Some(url), _) => {
            eprintln!("🔓 Decrypting container at {url}...");
            let links = drive_dl::decrypt_container_url(&url, DEFAULT_DECRYPT_BASE_URL).await?;
            (url, links)
        }
        (None, None, Some(paste)) => {
            let content = tokio::fs::read_to_string(&paste)
                .await
                .with_context(|| format!("reading {}", paste.display()))?;
            eprintln!("🔓 Decrypting pasted content of {}...", paste.display());
            let links = drive_dl::decrypt_paste(&content, DEFAULT_DECRYPT_BASE_URL).await?;
            (paste.display().to_string(), links)
        }
        (None, None, None) => anyhow::bail!("nothing to decrypt"),
    };

    if links.is_empty() {
        eprintln!("⚠️  No links found in {source}");
    }
    for link in links {
        println!("{link}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_download_defaults() {
        let cli = Cli::try_parse_from(["drive-dl", "download"]).unwrap();
        match cli.command {
            Command::Download(args) => {
                assert_eq!(args.links_file, PathBuf::from("links.txt"));
                assert_eq!(args.output, PathBuf::from(DEFAULT_OUTPUT_DIR));
                assert_eq!(args.retry.failed_log, PathBuf::from(DEFAULT_FAILED_LOG));
                assert_eq!(args.retry.retries, 3);
                assert!(!args.dry_run);
            }
            _ => panic!("Expected download command"),
        }
    }

    #[test]
    fn test_download_custom_paths() {
        let cli = Cli::try_parse_from([
            "drive-dl", "download", "list.txt", "-o", "out", "--retries", "1", "--failed-log", "bad.txt",
        ])
        .unwrap();
        match cli.command {
            Command::Download(args) => {
                assert_eq!(args.links_file, PathBuf::from("list.txt"));
                assert_eq!(args.output, PathBuf::from("out"));
                assert_eq!(args.retry.retries, 1);
                assert_eq!(args.retry.failed_log, PathBuf::from("bad.txt"));
            }
            _ => panic!("Expected download command"),
        }
    }

    #[test]
    fn test_scan_flags() {
        let cli = Cli::try_parse_from(["drive-dl", "scan", "--dir", "/data", "--interval-ms", "500", "--once"])
            .unwrap();
        match cli.command {
            Command::Scan(args) => {
                assert_eq!(args.dir, PathBuf::from("/data"));
                assert_eq!(args.interval_ms, 500);
                assert!(args.once);
            }
            _ => panic!("Expected scan command"),
        }
    }

    #[test]
    fn test_decrypt_sources() {
        let cli = Cli::try_parse_from(["drive-dl", "decrypt", "pack.dlc"]).unwrap();
        match cli.command {
            Command::Decrypt(args) => assert_eq!(args.file, Some(PathBuf::from("pack.dlc"))),
            _ => panic!("Expected decrypt command"),
        }

        let cli = Cli::try_parse_from(["drive-dl", "decrypt", "--url", "https://host.test/a.dlc"]).unwrap();
        match cli.command {
            Command::Decrypt(args) => {
                assert_eq!(args.url.as_deref(), Some("https://host.test/a.dlc"));
                assert!(args.file.is_none());
            }
            _ => panic!("Expected decrypt command"),
        }

        let cli = Cli::try_parse_from(["drive-dl", "decrypt", "--paste", "container.txt"]).unwrap();
        match cli.command {
            Command::Decrypt(args) => assert_eq!(args.paste, Some(PathBuf::from("container.txt"))),
            _ => panic!("Expected decrypt command"),
        }
    }

    #[test]
    fn test_decrypt_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["drive-dl", "decrypt"]).is_err());
        assert!(Cli::try_parse_from(["drive-dl", "decrypt", "a.dlc", "--url", "https://host.test/b.dlc"]).is_err());
    }

    #[test]
    fn test_access_token_flag() {
        let cli = Cli::try_parse_from(["drive-dl", "--access-token", "abc", "download"]).unwrap();
        assert_eq!(cli.access_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_retry_args_build_batch_options() {
        let args = RetryArgs {
            failed_log: PathBuf::from("bad.txt"),
            retries: 5,
        };
        let options = args.batch_options(PathBuf::from("out"));
        assert_eq!(options.output_dir, PathBuf::from("out"));
        assert_eq!(options.download.retries, 5);
        assert!(options.download.progress.is_some());
    }
}
