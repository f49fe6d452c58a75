//! Async views over the [`StateStore`]: a stream of snapshots and a
//! "wait until done" future.
//!
//! Both are built on the store's `watch` channel, which keeps only the
//! latest value: a slow consumer sees the most recent snapshot, not every
//! intermediate one. Use [`StateStore::subscribe`] when every transition
//! matters.

use crate::job::{Job, JobId};
use crate::store::StateStore;
use futures::StreamExt;
use std::pin::Pin;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of job snapshots.
pub type JobStream = Pin<Box<dyn Stream<Item = Job> + Send>>;

/// Snapshots written to the store from now on.
///
/// The current value is not replayed. The stream skips the empty store
/// state (after [`StateStore::clear`]) and ends when the store is dropped.
pub fn job_updates(store: &StateStore) -> JobStream {
    let s = WatchStream::from_changes(store.watch()).filter_map(|job| async move { job });
    Box::pin(s)
}

/// Resolve with the first terminal snapshot, the current one included.
///
/// With `job` set, only a terminal snapshot of that job counts; the future
/// resolves with `None` as soon as another job replaces it. Also `None` if
/// the store is dropped first.
pub async fn wait_for_terminal(store: &StateStore, job: Option<&JobId>) -> Option<Job> {
    let mut rx = store.watch();
    loop {
        {
            let current = rx.borrow_and_update();
            if let Some(snapshot) = current.as_ref() {
                if let Some(wanted) = job {
                    if snapshot.id.as_ref() != Some(wanted) {
                        return None;
                    }
                }
                if snapshot.is_terminal() {
                    return Some(snapshot.clone());
                }
            }
        }
        if rx.changed().await.is_err() {
            return None;
        }
    }
}
