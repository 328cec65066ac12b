//! Link resolution for drive-dl
//!
//! Turns entries of a link list into Drive file identifiers and local file names.

use std::path::Path;

use crate::core::error::Result;

/// Domain marker identifying a Drive share link
const DRIVE_DOMAIN: &str = "drive.google.com";

/// Extracts the file identifier from a share link, or returns a bare identifier as-is.
///
/// Handles `.../file/d/<ID>/view` and `...open?id=<ID>&...` forms. Anything
/// unrecognised is returned unchanged and will fail at metadata fetch.
pub fn extract_file_id(link: &str) -> String {
    if link.contains(DRIVE_DOMAIN) {
        let parts: Vec<&str> = link.split('/').collect();
        if let Some(pos) = parts.iter().position(|part| *part == "d") {
            if let Some(id) = parts.get(pos + 1) {
                return (*id).to_string();
            }
        }
        if link.contains("id=") {
            if let Some(after) = link.rsplit("id=").next() {
                return after.split('&').next().unwrap_or(after).to_string();
            }
        }
    }
    link.to_string()
}

/// Reads a newline-delimited link list, trimming entries and dropping blank lines
pub async fn read_links(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_links(&content))
}

/// Splits link list text into trimmed, non-empty entries in order
pub fn parse_links(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Local file name for a remote file, falling back to `file_<id>` when the name is missing
pub fn resolve_output_filename(name: Option<&str>, file_id: &str) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.replace(['/', '\\'], "_"),
        _ => format!("file_{file_id}"),
    }
}
