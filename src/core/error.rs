//! Error types for drive-dl
//!
//! Per-file kinds (`MetadataFetch`, `Transfer`, `IncompleteTransfer`, I/O) are
//! absorbed by the single-file downloader and turned into retries. Only
//! `Authentication` and errors reading the link list reach the caller of a batch.

use std::fmt;

/// Main error type for drive-dl operations
#[derive(Debug)]
pub enum Error {
    /// OAuth credentials missing, rejected, or consent flow failed
    Authentication(String),

    /// File metadata could not be fetched (bad identifier, no access)
    MetadataFetch { file_id: String, message: String },

    /// Content transfer failed mid-stream
    Transfer(String),

    /// Transfer finished but the local file is shorter than declared
    IncompleteTransfer { expected: u64, actual: u64 },

    /// HTTP-specific error
    HttpError(String),

    /// File I/O error
    IoError(std::io::Error),

    /// Invalid configuration or parameters
    InvalidInput(String),

    /// Network connectivity issues
    NetworkError(String),

    /// Link container could not be decrypted
    Decrypt(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authentication(msg) => {
                write!(f, "Authentication failed: {}", msg)
            }
            Error::MetadataFetch { file_id, message } => {
                write!(f, "Could not fetch metadata for '{}': {}", file_id, message)
            }
            Error::Transfer(msg) => {
                write!(f, "Transfer failed: {}", msg)
            }
            Error::IncompleteTransfer { expected, actual } => {
                write!(f, "Incomplete download ({}/{})", actual, expected)
            }
            Error::HttpError(msg) => {
                write!(f, "HTTP error: {}", msg)
            }
            Error::IoError(err) => {
                write!(f, "I/O error: {}", err)
            }
            Error::InvalidInput(msg) => {
                write!(f, "Invalid input: {}", msg)
            }
            Error::NetworkError(msg) => {
                write!(f, "Network error: {}", msg)
            }
            Error::Decrypt(msg) => {
                write!(f, "Container decryption failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Error::NetworkError(err.to_string())
        } else {
            Error::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(format!("malformed JSON: {err}"))
    }
}

/// Convenience result type for drive-dl operations
pub type Result<T> = std::result::Result<T, Error>;
