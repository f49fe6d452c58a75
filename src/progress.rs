//! Callback trait for per-attempt tracking events.
//!
//! The [`crate::store::StateStore`] is the source of truth for job
//! snapshots. A [`TrackingCallback`] additionally sees what happens between
//! snapshots: every status query, transient failures that the attempt
//! budget absorbs, and why tracking stopped. Inject one via
//! [`crate::submit::SubmissionCoordinator::with_callback`].
//!
//! # Example
//!
//! ```rust
//! use orator_client::{JobError, JobId, TrackingCallback};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! struct RetryCounter(AtomicU32);
//!
//! impl TrackingCallback for RetryCounter {
//!     fn on_transient_error(&self, _job: &JobId, _error: &JobError) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::JobError;
use crate::job::{Job, JobId};
use crate::polling::PollOutcome;
use std::sync::Arc;

/// Called by the polling engine while it tracks a job.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`: the engine
/// runs on a spawned task.
pub trait TrackingCallback: Send + Sync {
    /// Called just before status query number `attempt` (1-indexed) is sent.
    fn on_poll_attempt(&self, job: &JobId, attempt: u32, max_attempts: u32) {
        let _ = (job, attempt, max_attempts);
    }

    /// Called after a status change was written to the store.
    fn on_status(&self, job: &Job) {
        let _ = job;
    }

    /// Called when a status query failed and the attempt was counted.
    fn on_transient_error(&self, job: &JobId, error: &JobError) {
        let _ = (job, error);
    }

    /// Called once when the polling loop exits, for whatever reason.
    fn on_tracking_finished(&self, job: &JobId, outcome: &PollOutcome) {
        let _ = (job, outcome);
    }
}

/// A no-op implementation for callers that don't need tracking events.
///
/// This is the default when no callback is configured.
pub struct NoopTrackingCallback;

impl TrackingCallback for NoopTrackingCallback {}

/// Convenience alias for the type held by the coordinator.
pub type SharedCallback = Arc<dyn TrackingCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SourceRef;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting {
        attempts: AtomicU32,
        statuses: AtomicU32,
        errors: AtomicU32,
        finished: AtomicU32,
    }

    impl TrackingCallback for Counting {
        fn on_poll_attempt(&self, _job: &JobId, _attempt: u32, _max: u32) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_status(&self, _job: &Job) {
            self.statuses.fetch_add(1, Ordering::SeqCst);
        }

        fn on_transient_error(&self, _job: &JobId, _error: &JobError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_tracking_finished(&self, _job: &JobId, _outcome: &PollOutcome) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopTrackingCallback;
        let id = JobId::new("t");
        cb.on_poll_attempt(&id, 1, 120);
        cb.on_status(&Job::queued(id.clone(), SourceRef::new("f"), "a.pdf"));
        cb.on_transient_error(&id, &JobError::Cancelled);
        cb.on_tracking_finished(&id, &PollOutcome::Cancelled);
    }

    #[test]
    fn arc_dyn_callback_dispatches() {
        let counting = Arc::new(Counting {
            attempts: AtomicU32::new(0),
            statuses: AtomicU32::new(0),
            errors: AtomicU32::new(0),
            finished: AtomicU32::new(0),
        });
        let cb: SharedCallback = counting.clone();
        let id = JobId::new("t");

        cb.on_poll_attempt(&id, 1, 3);
        cb.on_poll_attempt(&id, 2, 3);
        cb.on_transient_error(
            &id,
            &JobError::PollTransient {
                attempt: 2,
                detail: "reset".into(),
            },
        );
        cb.on_tracking_finished(&id, &PollOutcome::Completed);

        assert_eq!(counting.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
        assert_eq!(counting.statuses.load(Ordering::SeqCst), 0);
        assert_eq!(counting.finished.load(Ordering::SeqCst), 1);
    }
}
