//! # orator-client
//!
//! Submit a PDF or EPUB document to a text-to-speech conversion service and
//! track the resulting job until it completes or fails.
//!
//! ## Lifecycle
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Validate  type, content type, size (no network on failure)
//!  ├─ 2. Upload    POST /api/files          → SourceRef
//!  ├─ 3. Create    POST /api/tasks?file_id  → JobId
//!  ├─ 4. Poll      GET  /api/tasks/{id}     every interval, bounded attempts
//!  └─ 5. Resolve   audio / download / segments / document locators
//! ```
//!
//! Every step is written to a single [`StateStore`] as a [`Job`] snapshot.
//! Statuses only move forward
//! (`Idle → Uploading → Queued → Converting → Completed | Failed`), and a
//! new submission cancels whatever the previous one still had in flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orator_client::{wait_for_terminal, ClientConfig, DocumentFile, SubmissionCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Base URL from API_BASE_URL, defaults to http://localhost:8000
//!     let config = ClientConfig::from_env()?;
//!     let client = SubmissionCoordinator::from_config(config)?;
//!
//!     let doc = DocumentFile::from_path("book.epub").await?;
//!     let job_id = client.submit(Some(doc)).await?;
//!
//!     let job = wait_for_terminal(client.store(), Some(&job_id)).await;
//!     if let Some(result) = job.as_ref().and_then(|j| j.result()) {
//!         println!("{}", result.audio_ref);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `orator` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! orator-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod config;
pub mod error;
pub mod input;
pub mod job;
pub mod polling;
pub mod progress;
pub mod resolver;
pub mod store;
pub mod stream;
pub mod submit;
pub mod timer;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::{CancelToken, CancellationController};
pub use config::{ApiRoutes, ClientConfig, ClientConfigBuilder};
pub use error::{JobError, OratorError};
pub use input::{validate_document, DocumentFile};
pub use job::{ConversionResult, Job, JobId, JobPhase, JobStatus, JobView, Progress, SourceRef};
pub use polling::{PollOutcome, PollingEngine};
pub use progress::{NoopTrackingCallback, SharedCallback, TrackingCallback};
pub use resolver::ResultResolver;
pub use store::{StateStore, Subscription};
pub use stream::{job_updates, wait_for_terminal, JobStream};
pub use submit::SubmissionCoordinator;
pub use timer::{Timer, TokioTimer};
pub use transport::{HttpTransport, JobTransport, RemoteState, StatusResponse};
