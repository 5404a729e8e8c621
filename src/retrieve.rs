//! Retrieval of Markdown documents by URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;
use tokio::fs;
use url::Url;

/// Accept header sent with every HTTP request: plain text preferred.
const ACCEPT_TEXT: &str = "text/plain, */*; q=0.01";

/// Ways a retrieval can fail besides transport and I/O errors.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("unsupported URL scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("{location} responded with {status}")]
    Status { location: Url, status: StatusCode },

    #[error("{0} does not name a local file")]
    NotAFilePath(Url),

    #[error("{location} is not a text document: {reason}")]
    NotText { location: Url, reason: String },
}

/// Fetches the text content behind a URL.
#[async_trait]
pub trait Retrieve: Send + Sync {
    /// Returns the body at `location` decoded as text.
    async fn retrieve(&self, location: &Url) -> Result<String>;
}

/// Default retriever for `http`, `https` and `file` URLs.
///
/// HTTP requests are plain `GET`s asking for text, without credentials or
/// custom headers. Any non-success status counts as a failure, and so does a
/// body that is not UTF-8 text: a non-`text/*` content type, another
/// charset, or undecodable bytes.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    http: reqwest::Client,
}

impl Retriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured HTTP client, e.g. one with proxy settings.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn retrieve_http(&self, location: &Url) -> Result<String> {
        let response = self
            .http
            .get(location.clone())
            .header(ACCEPT, ACCEPT_TEXT)
            .send()
            .await
            .with_context(|| format!("Failed to request {location}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Status {
                location: location.clone(),
                status,
            }
            .into());
        }

        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if let Some(reason) = non_text_reason(content_type) {
                return Err(RetrievalError::NotText {
                    location: location.clone(),
                    reason,
                }
                .into());
            }
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {location}"))?;
        decode_utf8(location, body.to_vec())
    }

    async fn retrieve_file(location: &Url) -> Result<String> {
        let path = location
            .to_file_path()
            .map_err(|()| RetrievalError::NotAFilePath(location.clone()))?;

        let bytes = fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        decode_utf8(location, bytes)
    }
}

/// Explains why a `Content-Type` value does not announce UTF-8 text.
fn non_text_reason(content_type: &str) -> Option<String> {
    let mut parts = content_type.split(';');
    let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    if !mime.starts_with("text/") {
        return Some(format!("content type `{mime}`"));
    }

    let charset = parts
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase());

    match charset.as_deref() {
        None | Some("utf-8" | "utf8" | "us-ascii") => None,
        Some(other) => Some(format!("charset `{other}`")),
    }
}

fn decode_utf8(location: &Url, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        RetrievalError::NotText {
            location: location.clone(),
            reason: e.utf8_error().to_string(),
        }
        .into()
    })
}

#[async_trait]
impl Retrieve for Retriever {
    async fn retrieve(&self, location: &Url) -> Result<String> {
        match location.scheme() {
            "http" | "https" => self.retrieve_http(location).await,
            "file" => Self::retrieve_file(location).await,
            other => Err(RetrievalError::UnsupportedScheme(other.to_string()).into()),
        }
    }
}
