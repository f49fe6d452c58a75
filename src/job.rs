//! The tracked unit of work: [`Job`] and the types it is made of.
//!
//! Status and its payload live in one enum, [`JobPhase`], so "progress only
//! while converting", "result only when completed" and "error only when
//! failed" hold by construction. [`Job::status`], [`Job::progress`],
//! [`Job::error`] and [`Job::result`] give the flat view; [`JobView`] is the
//! same view as a serialisable record.

use crate::error::JobError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque job identifier assigned by the conversion service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of an uploaded input document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversion progress as reported by the remote worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(current: u64, total: u64) -> Self {
        Self { current, total }
    }

    /// `round(current / total * 100)` clamped to `0..=100`.
    ///
    /// A zero `total` yields `0`.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let ratio = self.current as f64 / self.total as f64;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// Locators for the output of a completed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Streaming URL of the generated audio.
    pub audio_ref: String,
    /// Attachment-style download URL of the same audio.
    pub download_ref: String,
    /// Read-along text segments with timestamps.
    pub segments_ref: String,
    /// The original document as served back by the service.
    pub document_ref: String,
}

/// Local job status, ordered along the lifecycle lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Uploading,
    Queued,
    Converting,
    Completed,
    Failed,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            JobStatus::Idle => 0,
            JobStatus::Uploading => 1,
            JobStatus::Queued => 2,
            JobStatus::Converting => 3,
            JobStatus::Completed | JobStatus::Failed => 4,
        }
    }

    /// `Completed` and `Failed` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward-only transition check.
    ///
    /// Self-transitions are allowed (a converting job receives repeated
    /// progress updates); `Failed` is reachable from every non-terminal
    /// status; nothing leaves a terminal status.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobStatus::Failed || next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Idle => "idle",
            JobStatus::Uploading => "uploading",
            JobStatus::Queued => "queued",
            JobStatus::Converting => "converting",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A status together with the data that only exists in that status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Uploading,
    Queued,
    Converting(Progress),
    Completed(ConversionResult),
    Failed(JobError),
}

impl JobPhase {
    pub fn status(&self) -> JobStatus {
        match self {
            JobPhase::Idle => JobStatus::Idle,
            JobPhase::Uploading => JobStatus::Uploading,
            JobPhase::Queued => JobStatus::Queued,
            JobPhase::Converting(_) => JobStatus::Converting,
            JobPhase::Completed(_) => JobStatus::Completed,
            JobPhase::Failed(_) => JobStatus::Failed,
        }
    }
}

/// The single unit of work tracked by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Assigned once the conversion job is created; `None` while uploading
    /// and for submissions that failed before a job existed.
    pub id: Option<JobId>,
    pub source_ref: Option<SourceRef>,
    pub original_name: String,
    pub phase: JobPhase,
}

impl Job {
    pub fn idle(original_name: impl Into<String>) -> Self {
        Self {
            id: None,
            source_ref: None,
            original_name: original_name.into(),
            phase: JobPhase::Idle,
        }
    }

    pub fn uploading(original_name: impl Into<String>) -> Self {
        Self {
            phase: JobPhase::Uploading,
            ..Self::idle(original_name)
        }
    }

    /// The job as written right after the service accepted it.
    pub fn queued(id: JobId, source_ref: SourceRef, original_name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            source_ref: Some(source_ref),
            original_name: original_name.into(),
            phase: JobPhase::Queued,
        }
    }

    /// Copy of this job in a different phase, without transition checks.
    pub fn with_phase(&self, phase: JobPhase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    /// Copy of this job moved to `phase`, or `None` when the move would be a
    /// regression, would leave a terminal status, or changes nothing.
    pub fn advance(&self, phase: JobPhase) -> Option<Self> {
        if phase == self.phase || !self.status().can_advance_to(phase.status()) {
            return None;
        }
        Some(self.with_phase(phase))
    }

    pub fn status(&self) -> JobStatus {
        self.phase.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn progress(&self) -> Option<&Progress> {
        match &self.phase {
            JobPhase::Converting(p) => Some(p),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match &self.phase {
            JobPhase::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        match &self.phase {
            JobPhase::Completed(r) => Some(r),
            _ => None,
        }
    }

    /// Progress percentage: live while converting, 100 once completed.
    pub fn percent(&self) -> u8 {
        match &self.phase {
            JobPhase::Converting(p) => p.percent(),
            JobPhase::Completed(_) => 100,
            _ => 0,
        }
    }

    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            source_ref: self.source_ref.clone(),
            original_name: self.original_name.clone(),
            status: self.status(),
            percent: self.percent(),
            progress: self.progress().copied(),
            error: self.error().cloned(),
            result: self.result().cloned(),
        }
    }
}

/// Flat, serialisable snapshot of a [`Job`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    pub id: Option<JobId>,
    pub source_ref: Option<SourceRef>,
    pub original_name: String,
    pub status: JobStatus,
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ConversionResult>,
}
