//! The single canonical [`Job`] snapshot and its subscribers.
//!
//! All writes go through one gate, so a swap and the notifications it causes
//! are never interleaved with another write: subscribers see snapshots in
//! the order they were written, and always a fully-formed [`Job`].
//!
//! Two ways to observe:
//!
//! * [`StateStore::subscribe`]: synchronous callbacks, invoked in
//!   subscription order on every change. Callbacks run while the write gate
//!   is held, so they may read the store but must not write to it.
//! * [`StateStore::watch`]: a `tokio::sync::watch` receiver holding the
//!   latest snapshot (or `None` after [`StateStore::clear`]); used by
//!   [`crate::stream`].

use crate::job::{Job, JobId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::watch;
use tracing::debug;

type Observer = Arc<dyn Fn(&Job) + Send + Sync>;
type ObserverList = Mutex<Vec<(u64, Observer)>>;

/// Holds the active [`Job`] and notifies subscribers on change.
pub struct StateStore {
    write_gate: Mutex<()>,
    current: RwLock<Option<Job>>,
    subscribers: Arc<ObserverList>,
    next_subscriber: AtomicU64,
    watch_tx: watch::Sender<Option<Job>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(None);
        Self {
            write_gate: Mutex::new(()),
            current: RwLock::new(None),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscriber: AtomicU64::new(0),
            watch_tx,
        }
    }

    /// Snapshot of the active job, if any.
    pub fn current(&self) -> Option<Job> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new active job and notify subscribers.
    pub fn replace(&self, job: Job) {
        let _gate = lock(&self.write_gate);
        self.swap_and_notify(job);
    }

    /// Swap in `job` only if `still_live` holds at the moment of the swap.
    ///
    /// Returns whether the job was written.
    pub fn replace_if(&self, job: Job, still_live: impl FnOnce() -> bool) -> bool {
        let _gate = lock(&self.write_gate);
        if !still_live() {
            debug!(name = %job.original_name, status = %job.status(), "Dropping write for superseded operation");
            return false;
        }
        self.swap_and_notify(job);
        true
    }

    /// Identity-checked update of the active job.
    ///
    /// `f` runs only when the active job's id equals `job_id`; returning
    /// `None` from it means "nothing changed" and emits no notification.
    /// Returns `false` when the job is no longer the active one.
    pub fn update(&self, job_id: &JobId, f: impl FnOnce(&Job) -> Option<Job>) -> bool {
        let _gate = lock(&self.write_gate);
        let next = {
            let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
            match current.as_ref() {
                Some(job) if job.id.as_ref() == Some(job_id) => f(job),
                _ => {
                    debug!(job_id = %job_id, "Dropping update for a job that is no longer active");
                    return false;
                }
            }
        };
        if let Some(job) = next {
            self.swap_and_notify(job);
        }
        true
    }

    /// Drop the active job.
    pub fn clear(&self) {
        let _gate = lock(&self.write_gate);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.watch_tx.send_replace(None);
    }

    /// Register a callback invoked with every new snapshot, in subscription order.
    pub fn subscribe(&self, observer: impl Fn(&Job) + Send + Sync + 'static) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).push((id, Arc::new(observer)));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Receiver that always holds the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<Option<Job>> {
        self.watch_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Caller must hold the write gate.
    fn swap_and_notify(&self, job: Job) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(job.clone());
        self.watch_tx.send_replace(Some(job.clone()));

        let observers: Vec<Observer> = lock(&self.subscribers)
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in observers {
            observer(&job);
        }
    }
}

/// Handle returned by [`StateStore::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to stop receiving snapshots.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    subscribers: Weak<ObserverList>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(list) = self.subscribers.upgrade() {
            lock(&list).retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
