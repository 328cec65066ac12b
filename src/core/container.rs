//! Link container (`.dlc`) decryption through the dcrypt.it service

use std::path::Path;

use log::debug;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::core::error::{Error, Result};

/// Public decryption service
pub const DEFAULT_DECRYPT_BASE_URL: &str = "http://dcrypt.it";

const UPLOAD_PATH: &str = "/decrypt/upload";
const CONTAINER_PATH: &str = "/decrypt/container";
const PASTE_PATH: &str = "/decrypt/paste";

/// Hosts whose links are page boilerplate rather than container content
const IGNORED_HOSTS: &[&str] = &["dcrypt.it", "w3.org", "jquery"];

/// Characters that terminate a scraped URL
const URL_TERMINATORS: &[char] = &['<', '>', '"', '\''];

/// Decrypt a `.dlc` container file into the links it holds.
///
/// An empty list means the service answered but found no links.
pub async fn decrypt_container(path: &Path, base_url: &str) -> Result<Vec<String>> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        Error::InvalidInput(format!("cannot read container {}: {e}", path.display()))
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "container.dlc".to_string());

    let part = Part::bytes(data)
        .file_name(file_name)
        .mime_str("application/octet-stream")?;
    submit(base_url, UPLOAD_PATH, Form::new().part("dlcfile", part)).await
}

/// Decrypt a container the service fetches itself from `link`
pub async fn decrypt_container_url(link: &str, base_url: &str) -> Result<Vec<String>> {
    submit(base_url, CONTAINER_PATH, Form::new().text("link", link.to_string())).await
}

/// Decrypt container content pasted as text
pub async fn decrypt_paste(content: &str, base_url: &str) -> Result<Vec<String>> {
    submit(base_url, PASTE_PATH, Form::new().text("content", content.to_string())).await
}

async fn submit(base_url: &str, endpoint: &str, form: Form) -> Result<Vec<String>> {
    let url = format!("{}{endpoint}", base_url.trim_end_matches('/'));
    debug!("Posting container to {url}");
    let response = reqwest::Client::new().post(&url).multipart(form).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Decrypt(format!("service returned {status}")));
    }

    let body = response.text().await?;
    debug!("Decryption response: {} bytes", body.len());
    parse_decrypt_response(&body)
}

/// Extract links from a decryption response body
pub fn parse_decrypt_response(body: &str) -> Result<Vec<String>> {
    let clean = body.replace("<textarea>", "").replace("</textarea>", "");

    if let Ok(json) = serde_json::from_str::<Value>(clean.trim()) {
        if let Some(links) = json.pointer("/success/links").and_then(Value::as_array) {
            return Ok(string_values(links));
        }
        if let Some(message) = form_error(&json) {
            return Err(Error::Decrypt(message.to_string()));
        }
        if let Some(links) = json.get("links").and_then(Value::as_array) {
            return Ok(string_values(links));
        }
        if let Some(content) = json.pointer("/success/content").and_then(Value::as_str) {
            return Ok(crate::core::source::parse_links(content));
        }
    }

    Ok(scrape_links(&clean))
}

/// First message under `form_errors`, whichever field (`dlcfile`, `link`, `content`) it names
fn form_error(json: &Value) -> Option<&str> {
    json.get("form_errors")?
        .as_object()?
        .values()
        .find_map(|errors| errors.get(0).and_then(Value::as_str))
}

fn string_values(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Find http(s) URLs in free text, skipping service and boilerplate links
fn scrape_links(text: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for token in text.split(|c: char| c.is_whitespace() || URL_TERMINATORS.contains(&c)) {
        let Some(start) = token.find("https://").or_else(|| token.find("http://")) else {
            continue;
        };
        let link = &token[start..];
        if IGNORED_HOSTS.iter().any(|host| link.contains(host)) || links.iter().any(|l| l == link) {
            continue;
        }
        links.push(link.to_string());
    }
    links
}
