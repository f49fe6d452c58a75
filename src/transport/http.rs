//! `reqwest` implementation of [`JobTransport`].

use super::{JobTransport, StatusResponse};
use crate::config::{ApiRoutes, ClientConfig};
use crate::error::OratorError;
use crate::input::DocumentFile;
use crate::job::{JobId, SourceRef};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// HTTP client for the conversion service.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    routes: ApiRoutes,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, OratorError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| OratorError::Network {
                context: "Failed to build HTTP client".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            routes: config.routes(),
        })
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn routes(&self) -> &ApiRoutes {
        &self.routes
    }

    /// Download a result locator into memory.
    pub async fn fetch(&self, locator: &str) -> Result<Vec<u8>, OratorError> {
        let resp = self
            .http
            .get(locator)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = ensure_success(resp).await?;
        let bytes = resp.bytes().await.map_err(|e| OratorError::Network {
            context: format!("Failed to read body of {locator}"),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }

    /// Download a result locator and write it to `path`. Returns the byte count.
    pub async fn fetch_to_file(&self, locator: &str, path: &Path) -> Result<u64, OratorError> {
        let bytes = self.fetch(locator).await?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|source| OratorError::OutputWriteFailed {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(bytes.len() as u64)
    }

    fn unreachable(&self, e: reqwest::Error) -> OratorError {
        OratorError::Network {
            context: format!(
                "Cannot reach the conversion service at {} (is it running?)",
                self.routes.base()
            ),
            source: e,
        }
    }

    async fn read_json(&self, resp: Response, what: &str) -> Result<Value, OratorError> {
        resp.json().await.map_err(|e| OratorError::Network {
            context: format!("Failed to parse {what} response"),
            source: e,
        })
    }
}

#[async_trait]
impl JobTransport for HttpTransport {
    async fn upload(&self, file: &DocumentFile) -> Result<SourceRef, OratorError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(file.effective_content_type())
            .map_err(|e| OratorError::Network {
                context: format!("Invalid content type for '{}'", file.name),
                source: e,
            })?;
        let form = Form::new().part("file", part);

        debug!("Uploading '{}' ({} bytes)", file.name, file.bytes.len());
        let resp = self
            .http
            .post(self.routes.upload())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = ensure_success(resp).await?;
        let json = self.read_json(resp, "upload").await?;
        parse_upload_response(&json)
    }

    async fn create_job(&self, source: &SourceRef) -> Result<JobId, OratorError> {
        let resp = self
            .http
            .post(self.routes.create_job())
            .query(&[("file_id", source.as_str())])
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = ensure_success(resp).await?;
        let json = self.read_json(resp, "job creation").await?;
        parse_create_response(&json)
    }

    async fn job_status(&self, job: &JobId) -> Result<StatusResponse, OratorError> {
        let resp = self
            .http
            .get(self.routes.job_status(job))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = ensure_success(resp).await?;
        let json = self.read_json(resp, "job status").await?;
        Ok(serde_json::from_value(json)?)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, OratorError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(OratorError::Http { status, body })
}

fn parse_upload_response(json: &Value) -> Result<SourceRef, OratorError> {
    json.get("file_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(SourceRef::new)
        .ok_or_else(|| OratorError::InvalidResponse("upload response has no file_id".into()))
}

fn parse_create_response(json: &Value) -> Result<JobId, OratorError> {
    json.get("task_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(JobId::new)
        .ok_or_else(|| OratorError::InvalidResponse("job creation response has no task_id".into()))
}
