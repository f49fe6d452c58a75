//! Error types for the orator-client library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OratorError`]: **Fatal / plumbing**: a configuration is invalid, a
//!   file cannot be read, or a single HTTP exchange with the conversion
//!   service failed. Returned as `Err(OratorError)` from the config builder,
//!   [`crate::input::DocumentFile::from_path`] and every
//!   [`crate::transport::JobTransport`] call.
//!
//! * [`JobError`]: **Job outcome**: why a tracked job ended up `Failed`
//!   (or why a submission was abandoned). Stored inside
//!   [`crate::job::JobPhase::Failed`] so subscribers see the cause together
//!   with the snapshot, which is why it is `Clone` and serialisable.
//!
//! Transport errors never reach subscribers directly: the coordinator and the
//! polling engine translate them into the matching [`JobError`] variant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal and transport-level errors returned by the orator-client library.
#[derive(Debug, Error)]
pub enum OratorError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Could not read the document from disk.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document on disk is larger than the configured cap; it was not read.
    #[error("'{path}' is {size} bytes, larger than the {limit} byte limit")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Could not write a fetched resource to disk.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The conversion service returned a non-success HTTP status.
    #[error("Conversion service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response was missing expected fields.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OratorError {
    /// Short, single-line description used when the error is folded into a
    /// [`JobError`] and shown to a user.
    pub fn detail(&self) -> String {
        match self {
            OratorError::Http { status, body } if body.trim().is_empty() => {
                format!("HTTP {status}")
            }
            OratorError::Http { status, body } => format!("HTTP {status}: {}", body.trim()),
            other => other.to_string(),
        }
    }
}

/// Why a job failed, was abandoned, or why a single poll did not count.
///
/// Only [`JobError::Timeout`], [`JobError::Remote`] and the submission-phase
/// variants end up inside a `Failed` job. [`JobError::PollTransient`] is
/// reported to tracking callbacks and absorbed by the attempt budget;
/// [`JobError::Cancelled`] is returned to the superseded caller and never
/// written anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// Missing file, empty file, disallowed type or oversized input.
    /// Detected locally; no network call was made.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The upload request failed or returned a non-success response.
    #[error("Upload failed: {detail}")]
    Upload { detail: String },

    /// The job-creation request failed or returned a non-success response.
    #[error("Failed to start conversion: {detail}")]
    ConversionStart { detail: String },

    /// A single status query failed (network, HTTP or parse error).
    #[error("Status check {attempt} failed: {detail}")]
    PollTransient { attempt: u32, detail: String },

    /// The attempt budget ran out before the remote job reached a terminal state.
    #[error("Timed out waiting for conversion after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// The remote service reported the job as failed.
    #[error("Conversion failed: {message}")]
    Remote { message: String },

    /// The operation was superseded by a newer one or explicitly cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl JobError {
    /// Whether this error should ever be presented as a job failure.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, JobError::Cancelled | JobError::PollTransient { .. })
    }
}
