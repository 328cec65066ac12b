//! Core library modules for drive-dl
//!
//! This module contains the internal implementation details of the drive-dl library.

pub mod auth;
pub mod batch;
pub mod container;
pub mod downloader;
pub mod drive;
pub mod error;
pub mod scan;
pub mod source;
pub mod stream;

// Re-export main types for internal use
pub use downloader::{download_file, DownloadOutcome};
pub use source::{extract_file_id, resolve_output_filename};
