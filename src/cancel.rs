//! Token-based cancellation: at most one operation is live at a time.
//!
//! Every [`CancellationController::begin_operation`] bumps a generation
//! counter and invalidates the previously issued [`CancelToken`]. Staleness
//! is decided by comparing generations, so a token can be checked long after
//! the operation that issued it was superseded.
//!
//! Each token also wraps a [`tokio_util::sync::CancellationToken`] so a loop
//! sleeping between polls can `select!` on [`CancelToken::cancelled`] and
//! wake as soon as it is superseded instead of finishing its sleep.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identifies one operation's validity window.
#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: u64,
    live: Arc<AtomicU64>,
    signal: CancellationToken,
}

impl CancelToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a newer operation began or the controller cancelled this one.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled() || self.live.load(Ordering::SeqCst) != self.generation
    }

    /// Resolves when this token is invalidated.
    pub async fn cancelled(&self) {
        self.signal.cancelled().await
    }
}

/// Owns the single live [`CancelToken`].
#[derive(Debug)]
pub struct CancellationController {
    live: Arc<AtomicU64>,
    next: AtomicU64,
    signal: Mutex<Option<CancellationToken>>,
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationController {
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicU64::new(0)),
            next: AtomicU64::new(1),
            signal: Mutex::new(None),
        }
    }

    /// Issue a fresh token, invalidating any previously issued one.
    pub fn begin_operation(&self) -> CancelToken {
        let mut slot = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.next.fetch_add(1, Ordering::SeqCst);
        self.live.store(generation, Ordering::SeqCst);
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        let signal = CancellationToken::new();
        *slot = Some(signal.clone());
        debug!(generation, "Began operation");

        CancelToken {
            generation,
            live: Arc::clone(&self.live),
            signal,
        }
    }

    /// Invalidate the live token without issuing a new one.
    pub fn cancel(&self) {
        let mut slot = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        // Generation 0 is never issued.
        let previous = self.live.swap(0, Ordering::SeqCst);
        if let Some(signal) = slot.take() {
            signal.cancel();
            debug!(generation = previous, "Cancelled operation");
        }
    }

    pub fn is_cancelled(&self, token: &CancelToken) -> bool {
        token.is_cancelled()
    }
}
