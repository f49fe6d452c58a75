//! Fixed-interval status polling for one conversion job.
//!
//! ## Attempt budget
//!
//! Every status query counts, whether it returned a non-terminal state or
//! failed outright. With the defaults (5 s interval, 120 attempts) a job
//! that never reaches `SUCCESS`/`FAILURE` is failed with
//! [`JobError::Timeout`] after roughly ten minutes, exactly on attempt 120.
//!
//! ## Remote → local mapping
//!
//! ```text
//! PENDING | STARTED  ──▶ Queued      (ignored once converting)
//! PROGRESS           ──▶ Converting  (progress from {current, total})
//! SUCCESS            ──▶ Completed   (locators from ResultResolver)
//! FAILURE            ──▶ Failed      (remote error or "Unknown error")
//! anything else      ──▶ no change, attempt still counted
//! ```
//!
//! ## Staleness
//!
//! The loop checks its [`CancelToken`] before each query, after each
//! response and before each sleep (the sleep itself is cut short on
//! cancellation). Every write is identity-checked by the store and
//! re-checks the token under the store's write gate, so a superseded loop
//! can never publish a snapshot.

use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::error::JobError;
use crate::job::{Job, JobId, JobPhase, SourceRef};
use crate::progress::{SharedCallback, TrackingCallback};
use crate::resolver::ResultResolver;
use crate::store::StateStore;
use crate::timer::Timer;
use crate::transport::{JobTransport, RemoteState, StatusResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Message used when the service reports `FAILURE` without an error text.
pub const DEFAULT_REMOTE_ERROR: &str = "Unknown error";

/// Why a polling loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job reached `Completed`.
    Completed,
    /// The job was written as `Failed` (remote failure or timeout).
    Failed(JobError),
    /// The loop's token was invalidated; nothing more was written.
    Cancelled,
    /// Another job replaced this one in the store; nothing more was written.
    Superseded,
}

enum Step {
    Continue,
    Stop(PollOutcome),
}

/// Polls the transport and reconciles responses into the [`StateStore`].
#[derive(Clone)]
pub struct PollingEngine {
    transport: Arc<dyn JobTransport>,
    store: Arc<StateStore>,
    resolver: ResultResolver,
    timer: Arc<dyn Timer>,
    interval: Duration,
    max_attempts: u32,
}

impl PollingEngine {
    pub fn new(
        transport: Arc<dyn JobTransport>,
        store: Arc<StateStore>,
        resolver: ResultResolver,
        timer: Arc<dyn Timer>,
        interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            transport,
            store,
            resolver,
            timer,
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(
        config: &ClientConfig,
        transport: Arc<dyn JobTransport>,
        store: Arc<StateStore>,
        timer: Arc<dyn Timer>,
    ) -> Self {
        Self::new(
            transport,
            store,
            ResultResolver::new(config.routes()),
            timer,
            config.poll_interval(),
            config.max_attempts,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Start tracking on a background task.
    ///
    /// The handle may be dropped; the loop stops on its own once the job is
    /// terminal, superseded or its token is cancelled.
    pub fn track(
        &self,
        job_id: JobId,
        source: SourceRef,
        token: CancelToken,
        callback: SharedCallback,
    ) -> JoinHandle<PollOutcome> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run(job_id, source, token, callback).await })
    }

    /// The polling loop, awaited in place.
    pub async fn run(
        &self,
        job_id: JobId,
        source: SourceRef,
        token: CancelToken,
        callback: SharedCallback,
    ) -> PollOutcome {
        let outcome = self
            .poll_loop(&job_id, &source, &token, callback.as_ref())
            .await;
        match &outcome {
            PollOutcome::Completed => info!("Job {}: conversion completed", job_id),
            PollOutcome::Failed(e) => warn!("Job {}: {}", job_id, e),
            PollOutcome::Cancelled => debug!("Job {}: tracking cancelled", job_id),
            PollOutcome::Superseded => debug!("Job {}: superseded by a newer job", job_id),
        }
        callback.on_tracking_finished(&job_id, &outcome);
        outcome
    }

    async fn poll_loop(
        &self,
        job_id: &JobId,
        source: &SourceRef,
        token: &CancelToken,
        callback: &dyn TrackingCallback,
    ) -> PollOutcome {
        let mut attempt: u32 = 0;

        loop {
            if token.is_cancelled() {
                return PollOutcome::Cancelled;
            }

            attempt += 1;
            callback.on_poll_attempt(job_id, attempt, self.max_attempts);
            debug!(
                "Job {}: status check {}/{}",
                job_id, attempt, self.max_attempts
            );

            let response = self.transport.job_status(job_id).await;
            if token.is_cancelled() {
                return PollOutcome::Cancelled;
            }

            match response {
                Ok(status) => {
                    if let Step::Stop(outcome) =
                        self.apply(job_id, source, token, &status, callback)
                    {
                        return outcome;
                    }
                }
                Err(e) => {
                    let err = JobError::PollTransient {
                        attempt,
                        detail: e.detail(),
                    };
                    warn!(
                        "Job {}: status check {}/{} failed: {}",
                        job_id,
                        attempt,
                        self.max_attempts,
                        e.detail()
                    );
                    callback.on_transient_error(job_id, &err);
                }
            }

            if attempt >= self.max_attempts {
                let err = JobError::Timeout { attempts: attempt };
                let failed = JobPhase::Failed(err.clone());
                return match self.write(job_id, token, callback, |_| failed) {
                    Ok(()) => PollOutcome::Failed(err),
                    Err(stopped) => stopped,
                };
            }

            if token.is_cancelled() {
                return PollOutcome::Cancelled;
            }
            tokio::select! {
                _ = token.cancelled() => return PollOutcome::Cancelled,
                _ = self.timer.sleep(self.interval) => {}
            }
        }
    }

    /// Reconcile one status response into the store.
    fn apply(
        &self,
        job_id: &JobId,
        source: &SourceRef,
        token: &CancelToken,
        status: &StatusResponse,
        callback: &dyn TrackingCallback,
    ) -> Step {
        let result = match &status.state {
            RemoteState::Pending | RemoteState::Started => {
                self.write(job_id, token, callback, |_| JobPhase::Queued)
            }
            RemoteState::Progress => {
                let reported = status.progress_pair();
                self.write(job_id, token, callback, |job| {
                    JobPhase::Converting(
                        reported
                            .or_else(|| job.progress().copied())
                            .unwrap_or_default(),
                    )
                })
            }
            RemoteState::Success => {
                let result = self.resolver.resolve(source);
                return match self.write(job_id, token, callback, |_| JobPhase::Completed(result)) {
                    Ok(()) => Step::Stop(PollOutcome::Completed),
                    Err(stopped) => Step::Stop(stopped),
                };
            }
            RemoteState::Failure => {
                let message = status
                    .error
                    .as_deref()
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_REMOTE_ERROR)
                    .to_string();
                let err = JobError::Remote { message };
                let failed = JobPhase::Failed(err.clone());
                return match self.write(job_id, token, callback, |_| failed) {
                    Ok(()) => Step::Stop(PollOutcome::Failed(err)),
                    Err(stopped) => Step::Stop(stopped),
                };
            }
            RemoteState::Other(state) => {
                debug!("Job {}: ignoring remote state '{}'", job_id, state);
                Ok(())
            }
        };

        match result {
            Ok(()) => Step::Continue,
            Err(stopped) => Step::Stop(stopped),
        }
    }

    /// Identity- and token-checked write of the phase computed by `next`.
    ///
    /// Regressions and no-op transitions are skipped without notification.
    fn write(
        &self,
        job_id: &JobId,
        token: &CancelToken,
        callback: &dyn TrackingCallback,
        next: impl FnOnce(&Job) -> JobPhase,
    ) -> Result<(), PollOutcome> {
        let mut written: Option<Job> = None;
        let active = self.store.update(job_id, |job| {
            if token.is_cancelled() {
                return None;
            }
            let advanced = job.advance(next(job))?;
            written = Some(advanced.clone());
            Some(advanced)
        });

        if token.is_cancelled() {
            return Err(PollOutcome::Cancelled);
        }
        if !active {
            return Err(PollOutcome::Superseded);
        }
        if let Some(job) = written {
            debug!(
                "Job {}: {} ({}%)",
                job_id,
                job.status(),
                job.percent()
            );
            callback.on_status(&job);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationController;
    use crate::config::ApiRoutes;
    use crate::error::OratorError;
    use crate::input::DocumentFile;
    use crate::job::JobStatus;
    use crate::progress::NoopTrackingCallback;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted status responses; repeats the last one when exhausted.
    struct Scripted {
        responses: Mutex<VecDeque<Result<StatusResponse, String>>>,
        last: Mutex<Option<Result<StatusResponse, String>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(script: Vec<Result<StatusResponse, String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl JobTransport for Scripted {
        async fn upload(&self, _file: &DocumentFile) -> Result<SourceRef, OratorError> {
            unreachable!("polling never uploads")
        }

        async fn create_job(&self, _source: &SourceRef) -> Result<JobId, OratorError> {
            unreachable!("polling never creates jobs")
        }

        async fn job_status(&self, _job: &JobId) -> Result<StatusResponse, OratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop_front();
            let reply = match next {
                Some(r) => {
                    *self.last.lock().unwrap() = Some(r.clone());
                    r
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| Ok(StatusResponse::pending())),
            };
            reply.map_err(OratorError::InvalidResponse)
        }
    }

    #[derive(Default)]
    struct Ticks(AtomicU32);

    #[async_trait]
    impl Timer for Ticks {
        async fn sleep(&self, _duration: Duration) {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    }

    struct Fixture {
        engine: PollingEngine,
        store: Arc<StateStore>,
        transport: Arc<Scripted>,
        ticks: Arc<Ticks>,
        controller: CancellationController,
    }

    fn fixture(script: Vec<Result<StatusResponse, String>>, max_attempts: u32) -> Fixture {
        let transport = Scripted::new(script);
        let store = Arc::new(StateStore::new());
        let ticks = Arc::new(Ticks::default());
        let engine = PollingEngine::new(
            transport.clone(),
            Arc::clone(&store),
            ResultResolver::new(ApiRoutes::new("http://svc")),
            ticks.clone(),
            Duration::from_millis(5000),
            max_attempts,
        );
        store.replace(Job::queued(JobId::new("job"), SourceRef::new("src"), "a.pdf"));
        Fixture {
            engine,
            store,
            transport,
            ticks,
            controller: CancellationController::new(),
        }
    }

    async fn run(f: &Fixture) -> PollOutcome {
        let token = f.controller.begin_operation();
        f.engine
            .run(
                JobId::new("job"),
                SourceRef::new("src"),
                token,
                Arc::new(NoopTrackingCallback),
            )
            .await
    }

    #[tokio::test]
    async fn success_on_first_query_does_not_sleep() {
        let f = fixture(vec![Ok(StatusResponse::success())], 10);
        assert_eq!(run(&f).await, PollOutcome::Completed);
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.ticks.0.load(Ordering::SeqCst), 0);

        let job = f.store.current().unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(
            job.result().unwrap().audio_ref,
            "http://svc/api/files/src/audio"
        );
    }

    #[tokio::test]
    async fn failure_without_message_uses_default() {
        let f = fixture(vec![Ok(StatusResponse::new(RemoteState::Failure))], 10);
        let outcome = run(&f).await;
        let expected = JobError::Remote {
            message: DEFAULT_REMOTE_ERROR.into(),
        };
        assert_eq!(outcome, PollOutcome::Failed(expected.clone()));
        assert_eq!(f.store.current().unwrap().error(), Some(&expected));
    }

    #[tokio::test]
    async fn transient_errors_share_the_budget() {
        let f = fixture(
            vec![
                Err("connection reset".into()),
                Ok(StatusResponse::pending()),
                Err("bad gateway".into()),
            ],
            3,
        );
        assert_eq!(
            run(&f).await,
            PollOutcome::Failed(JobError::Timeout { attempts: 3 })
        );
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 3);
        // Sleeps happen between queries only.
        assert_eq!(f.ticks.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn progress_without_payload_keeps_previous_progress() {
        let f = fixture(
            vec![
                Ok(StatusResponse::converting(2, 8)),
                Ok(StatusResponse::new(RemoteState::Progress)),
                Ok(StatusResponse::pending()),
                Ok(StatusResponse::success()),
            ],
            10,
        );
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&snapshots);
        let _sub = f
            .store
            .subscribe(move |job| sink.lock().unwrap().push((job.status(), job.percent())));

        assert_eq!(run(&f).await, PollOutcome::Completed);
        // The payload-less PROGRESS and the late PENDING change nothing.
        assert_eq!(
            *snapshots.lock().unwrap(),
            vec![(JobStatus::Converting, 25), (JobStatus::Completed, 100)]
        );
    }

    #[tokio::test]
    async fn first_progress_without_payload_starts_at_zero() {
        let f = fixture(vec![Ok(StatusResponse::new(RemoteState::Progress))], 1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = f.store.subscribe(move |job| {
            if let Some(p) = job.progress() {
                sink.lock().unwrap().push(*p);
            }
        });
        let _ = run(&f).await;
        assert_eq!(*seen.lock().unwrap(), vec![crate::job::Progress::default()]);
    }

    #[tokio::test]
    async fn unknown_states_count_as_attempts() {
        let f = fixture(
            vec![Ok(StatusResponse::new(RemoteState::Other("RETRY".into())))],
            4,
        );
        assert_eq!(
            run(&f).await,
            PollOutcome::Failed(JobError::Timeout { attempts: 4 })
        );
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_query() {
        let f = fixture(vec![Ok(StatusResponse::success())], 5);
        let token = f.controller.begin_operation();
        f.controller.cancel();
        let outcome = f
            .engine
            .run(
                JobId::new("job"),
                SourceRef::new("src"),
                token,
                Arc::new(NoopTrackingCallback),
            )
            .await;
        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.store.current().unwrap().status(), JobStatus::Queued);
    }

    #[tokio::test]
    async fn replaced_job_stops_the_loop() {
        let f = fixture(vec![Ok(StatusResponse::converting(1, 2))], 5);
        f.store
            .replace(Job::queued(JobId::new("other"), SourceRef::new("s2"), "b.pdf"));
        assert_eq!(run(&f).await, PollOutcome::Superseded);
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            f.store.current().unwrap().id,
            Some(JobId::new("other"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn real_timer_waits_the_interval() {
        let transport = Scripted::new(vec![
            Ok(StatusResponse::pending()),
            Ok(StatusResponse::success()),
        ]);
        let store = Arc::new(StateStore::new());
        store.replace(Job::queued(JobId::new("job"), SourceRef::new("src"), "a.pdf"));
        let engine = PollingEngine::new(
            transport,
            Arc::clone(&store),
            ResultResolver::new(ApiRoutes::new("http://svc")),
            Arc::new(crate::timer::TokioTimer),
            Duration::from_secs(5),
            120,
        );
        let controller = CancellationController::new();
        let start = tokio::time::Instant::now();
        let outcome = engine
            .track(
                JobId::new("job"),
                SourceRef::new("src"),
                controller.begin_operation(),
                Arc::new(NoopTrackingCallback),
            )
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::Completed);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
