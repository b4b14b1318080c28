//! HTTP client for the study-buddy backend.
//!
//! The backend owns everything interesting (PDF chunking, summaries, search);
//! this side only marshals three calls:
//!
//! - `POST /api/new_chat/` -> `{ "session_id": ... }`
//! - `POST /api/query/` with `{ "query", "session_id" }` -> tagged envelope
//! - `POST /api/upload-pdf` multipart `pdf` + `session_id` -> upload receipt

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::Envelope;

pub const PDF_MIME: &str = "application/pdf";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Opaque backend-issued conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content type a file claims by its extension.
pub fn declared_type(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => Some(PDF_MIME),
        _ => None,
    }
}

/// A file the user picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfUpload {
    pub path: PathBuf,
    pub filename: String,
}

impl PdfUpload {
    pub fn new(path: PathBuf) -> Self {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        PdfUpload { path, filename }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    #[serde(default)]
    pub pages_extracted: u64,
    #[serde(default)]
    pub chunks_created: u64,
}

#[derive(Debug, Deserialize)]
struct NewChatResponse {
    session_id: SessionId,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    session_id: &'a SessionId,
}

#[async_trait]
pub trait StudyBackend: Send + Sync {
    /// Starts a fresh backend session.
    async fn new_chat(&self) -> ApiResult<SessionId>;

    async fn query(&self, session: &SessionId, query: &str) -> ApiResult<Envelope>;

    async fn upload_pdf(
        &self,
        session: &SessionId,
        upload: &PdfUpload,
    ) -> ApiResult<UploadReceipt>;
}

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn with_config(base_url: impl Into<String>) -> Self {
        HttpBackend {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn ensure_success(response: reqwest::Response) -> ApiResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status, body })
}

#[async_trait]
impl StudyBackend for HttpBackend {
    async fn new_chat(&self) -> ApiResult<SessionId> {
        let response = self.client.post(self.url("/api/new_chat/")).send().await?;
        let body: NewChatResponse = ensure_success(response).await?.json().await?;
        tracing::info!(session = %body.session_id, "session created");
        Ok(body.session_id)
    }

    async fn query(&self, session: &SessionId, query: &str) -> ApiResult<Envelope> {
        let request = QueryRequest {
            query,
            session_id: session,
        };
        let response = self
            .client
            .post(self.url("/api/query/"))
            .json(&request)
            .send()
            .await?;
        let value: Value = ensure_success(response).await?.json().await?;
        let envelope = Envelope::from_value(value);
        tracing::debug!(kind = envelope.kind(), "query answered");
        Ok(envelope)
    }

    async fn upload_pdf(
        &self,
        session: &SessionId,
        upload: &PdfUpload,
    ) -> ApiResult<UploadReceipt> {
        let bytes = tokio::fs::read(&upload.path).await?;
        tracing::debug!(file = %upload.filename, size = bytes.len(), "uploading pdf");

        let part = Part::bytes(bytes)
            .file_name(upload.filename.clone())
            .mime_str(PDF_MIME)?;
        let form = Form::new()
            .part("pdf", part)
            .text("session_id", session.as_str().to_string());

        let response = self
            .client
            .post(self.url("/api/upload-pdf"))
            .multipart(form)
            .send()
            .await?;
        let receipt: UploadReceipt = ensure_success(response).await?.json().await?;
        Ok(receipt)
    }
}
