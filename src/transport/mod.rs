//! The seam between the job coordinator and the conversion service.
//!
//! The coordinator and the polling engine only ever talk to a
//! [`JobTransport`]. [`HttpTransport`] is the `reqwest` implementation of the
//! service's REST contract:
//!
//! ```text
//! POST /api/files              multipart "file"  ──▶ { "file_id": … }
//! POST /api/tasks?file_id=…                      ──▶ { "task_id": … }
//! GET  /api/tasks/{task_id}                      ──▶ { "state": …, "progress"?: …, "error"?: … }
//! ```
//!
//! Tests plug in scripted transports to drive the state machine
//! deterministically.

pub mod http;

use crate::error::OratorError;
use crate::input::DocumentFile;
use crate::job::{JobId, Progress, SourceRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http::HttpTransport;

/// Remote operations the coordinator depends on.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Store the document on the service; returns its source reference.
    async fn upload(&self, file: &DocumentFile) -> Result<SourceRef, OratorError>;

    /// Ask the service to start converting an uploaded document.
    async fn create_job(&self, source: &SourceRef) -> Result<JobId, OratorError>;

    /// Query the current state of a conversion job.
    async fn job_status(&self, job: &JobId) -> Result<StatusResponse, OratorError>;
}

/// State reported by the remote job queue.
///
/// Anything outside the five known states (e.g. `RETRY`, `REVOKED`) is kept
/// verbatim in [`RemoteState::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteState {
    Pending,
    Started,
    Progress,
    Success,
    Failure,
    Other(String),
}

impl From<String> for RemoteState {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => RemoteState::Pending,
            "STARTED" => RemoteState::Started,
            "PROGRESS" => RemoteState::Progress,
            "SUCCESS" => RemoteState::Success,
            "FAILURE" => RemoteState::Failure,
            _ => RemoteState::Other(s),
        }
    }
}

impl From<RemoteState> for String {
    fn from(s: RemoteState) -> Self {
        match s {
            RemoteState::Pending => "PENDING".into(),
            RemoteState::Started => "STARTED".into(),
            RemoteState::Progress => "PROGRESS".into(),
            RemoteState::Success => "SUCCESS".into(),
            RemoteState::Failure => "FAILURE".into(),
            RemoteState::Other(s) => s,
        }
    }
}

/// Body of a job status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: RemoteState,
    /// Whatever the worker attached to the job; a `{current, total}` map
    /// while converting, arbitrary data otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn new(state: RemoteState) -> Self {
        Self {
            state,
            progress: None,
            error: None,
        }
    }

    pub fn pending() -> Self {
        Self::new(RemoteState::Pending)
    }

    pub fn converting(current: u64, total: u64) -> Self {
        Self {
            progress: Some(serde_json::json!({ "current": current, "total": total })),
            ..Self::new(RemoteState::Progress)
        }
    }

    pub fn success() -> Self {
        Self::new(RemoteState::Success)
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(RemoteState::Failure)
        }
    }

    /// The `{current, total}` pair, if the payload carries one.
    ///
    /// Numbers may arrive as integers or floats; negatives clamp to zero.
    pub fn progress_pair(&self) -> Option<Progress> {
        let map = self.progress.as_ref()?.as_object()?;
        let current = non_negative(map.get("current")?)?;
        let total = non_negative(map.get("total")?)?;
        Some(Progress::new(current, total))
    }
}

fn non_negative(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_f64().map(|f| if f.is_finite() { f.max(0.0).round() as u64 } else { 0 }))
}
