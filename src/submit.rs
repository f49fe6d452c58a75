//! Submission: validate, upload, create the conversion job, hand off to
//! polling.
//!
//! [`SubmissionCoordinator`] owns the [`StateStore`] and the
//! [`CancellationController`]. Every submission begins a new operation, so
//! anything still in flight for the previous one (an upload, a job creation,
//! a polling loop) can no longer write to the store.

use crate::cancel::{CancelToken, CancellationController};
use crate::config::ClientConfig;
use crate::error::{JobError, OratorError};
use crate::input::{validate_document, DocumentFile};
use crate::job::{Job, JobId, JobPhase, SourceRef};
use crate::polling::{PollOutcome, PollingEngine};
use crate::progress::{NoopTrackingCallback, SharedCallback};
use crate::store::StateStore;
use crate::timer::{Timer, TokioTimer};
use crate::transport::{HttpTransport, JobTransport};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Display name used for a rejected submission without a file.
const NO_FILE_NAME: &str = "(no file)";

/// Drives one submission at a time from document to tracked job.
pub struct SubmissionCoordinator {
    config: ClientConfig,
    transport: Arc<dyn JobTransport>,
    store: Arc<StateStore>,
    controller: CancellationController,
    engine: PollingEngine,
    callback: SharedCallback,
    tracking: Mutex<Option<JoinHandle<PollOutcome>>>,
}

impl SubmissionCoordinator {
    pub fn new(config: ClientConfig, transport: Arc<dyn JobTransport>) -> Self {
        let store = Arc::new(StateStore::new());
        let timer: Arc<dyn Timer> = Arc::new(TokioTimer);
        let engine = PollingEngine::from_config(&config, Arc::clone(&transport), Arc::clone(&store), timer);
        Self {
            config,
            transport,
            store,
            controller: CancellationController::new(),
            engine,
            callback: Arc::new(NoopTrackingCallback),
            tracking: Mutex::new(None),
        }
    }

    /// Coordinator talking to the configured service over HTTP.
    pub fn from_config(config: ClientConfig) -> Result<Self, OratorError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Replace the timer used between status queries.
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.engine = PollingEngine::from_config(
            &self.config,
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            timer,
        );
        self
    }

    pub fn with_callback(mut self, callback: SharedCallback) -> Self {
        self.callback = callback;
        self
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit a document for conversion.
    ///
    /// Resolves once the job exists remotely and polling has started; follow
    /// the job through [`Self::store`]. Any operation still running for a
    /// previous submission is cancelled first.
    ///
    /// # Errors
    ///
    /// * [`JobError::InvalidInput`] when local validation rejects the
    ///   document. No network call is made.
    /// * [`JobError::Upload`] / [`JobError::ConversionStart`] when the
    ///   service rejects the upload or the job creation.
    /// * [`JobError::Cancelled`] when a newer submission, [`Self::cancel`]
    ///   or [`Self::reset`] superseded this one while it was in flight.
    ///
    /// All but the last are also written to the store as a `Failed` job.
    pub async fn submit(&self, file: Option<DocumentFile>) -> Result<JobId, JobError> {
        if let Err(err) = validate_document(file.as_ref(), &self.config) {
            let name = file.as_ref().map_or(NO_FILE_NAME, |f| f.name.as_str());
            warn!("Rejected '{}': {}", name, err);
            self.controller.cancel();
            self.store
                .replace(Job::idle(name).with_phase(JobPhase::Failed(err.clone())));
            return Err(err);
        }
        let Some(file) = file else {
            return Err(JobError::InvalidInput {
                reason: "no file selected".into(),
            });
        };

        let token = self.controller.begin_operation();
        let name = file.name.clone();
        if !self.write(Job::uploading(&name), &token) {
            return Err(JobError::Cancelled);
        }

        info!("Uploading '{}' ({} bytes)", name, file.bytes.len());
        let source = match self.transport.upload(&file).await {
            Ok(source) => source,
            Err(e) => {
                let err = JobError::Upload { detail: e.detail() };
                return Err(self.fail(Job::uploading(&name), err, &token));
            }
        };
        if token.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let job_id = match self.transport.create_job(&source).await {
            Ok(id) => id,
            Err(e) => {
                let err = JobError::ConversionStart { detail: e.detail() };
                let uploaded = Job {
                    source_ref: Some(source),
                    ..Job::uploading(&name)
                };
                return Err(self.fail(uploaded, err, &token));
            }
        };

        if !self.write(Job::queued(job_id.clone(), source.clone(), &name), &token) {
            return Err(JobError::Cancelled);
        }
        info!("Job {}: queued '{}'", job_id, name);

        self.start_tracking(job_id.clone(), source, token);
        Ok(job_id)
    }

    /// Stop tracking the current job. The store keeps its last snapshot.
    ///
    /// A sleeping polling loop wakes up and exits with
    /// [`PollOutcome::Cancelled`]; a query already in flight is discarded.
    pub fn cancel(&self) {
        self.controller.cancel();
    }

    /// Cancel and clear the store.
    pub fn reset(&self) {
        self.cancel();
        self.store.clear();
    }

    /// Join handle of the most recently started polling loop, if any.
    pub fn take_tracking(&self) -> Option<JoinHandle<PollOutcome>> {
        self.tracking
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn start_tracking(&self, job_id: JobId, source: SourceRef, token: CancelToken) {
        let handle = self
            .engine
            .track(job_id, source, token, Arc::clone(&self.callback));
        *self.tracking.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Replace the active job unless `token` was superseded.
    fn write(&self, job: Job, token: &CancelToken) -> bool {
        self.store.replace_if(job, || !token.is_cancelled())
    }

    /// Write `job` as failed with `err`, or report cancellation if the
    /// operation was superseded meanwhile.
    fn fail(&self, job: Job, err: JobError, token: &CancelToken) -> JobError {
        if token.is_cancelled() {
            return JobError::Cancelled;
        }
        warn!("'{}': {}", job.original_name, err);
        if self.write(job.with_phase(JobPhase::Failed(err.clone())), token) {
            err
        } else {
            JobError::Cancelled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use crate::transport::StatusResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Rejecting {
        calls: AtomicU32,
        fail_upload: bool,
    }

    #[async_trait]
    impl JobTransport for Rejecting {
        async fn upload(&self, _file: &DocumentFile) -> Result<SourceRef, OratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_upload {
                Err(OratorError::Http {
                    status: 413,
                    body: "too large".into(),
                })
            } else {
                Ok(SourceRef::new("f1"))
            }
        }

        async fn create_job(&self, _source: &SourceRef) -> Result<JobId, OratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(OratorError::Http {
                status: 503,
                body: String::new(),
            })
        }

        async fn job_status(&self, _job: &JobId) -> Result<StatusResponse, OratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StatusResponse::pending())
        }
    }

    fn pdf() -> DocumentFile {
        DocumentFile::new("book.pdf", b"%PDF-1.7".to_vec())
    }

    #[tokio::test]
    async fn missing_file_is_rejected_locally() {
        let transport = Arc::new(Rejecting::default());
        let c = SubmissionCoordinator::new(ClientConfig::default(), transport.clone());

        let err = c.submit(None).await.unwrap_err();
        assert!(matches!(err, JobError::InvalidInput { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);

        let job = c.store().current().unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.original_name, NO_FILE_NAME);
        assert!(job.id.is_none());
    }

    #[tokio::test]
    async fn upload_failure_is_written() {
        let transport = Arc::new(Rejecting {
            fail_upload: true,
            ..Default::default()
        });
        let c = SubmissionCoordinator::new(ClientConfig::default(), transport);

        let err = c.submit(Some(pdf())).await.unwrap_err();
        assert_eq!(
            err,
            JobError::Upload {
                detail: "HTTP 413: too large".into()
            }
        );
        let job = c.store().current().unwrap();
        assert_eq!(job.error(), Some(&err));
        assert!(job.source_ref.is_none());
    }

    #[tokio::test]
    async fn create_failure_keeps_source_ref() {
        let c = SubmissionCoordinator::new(ClientConfig::default(), Arc::new(Rejecting::default()));

        let err = c.submit(Some(pdf())).await.unwrap_err();
        assert!(matches!(err, JobError::ConversionStart { .. }));
        let job = c.store().current().unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.source_ref, Some(SourceRef::new("f1")));
        assert!(c.take_tracking().is_none());
    }

    #[tokio::test]
    async fn reset_clears_the_store() {
        let c = SubmissionCoordinator::new(ClientConfig::default(), Arc::new(Rejecting::default()));
        let _ = c.submit(None).await;
        assert!(c.store().current().is_some());
        c.reset();
        assert!(c.store().current().is_none());
    }
}
