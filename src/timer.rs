//! Injectable sleep used between status queries.
//!
//! Production code uses [`TokioTimer`]. Tests substitute an implementation
//! that returns immediately and counts ticks, so a 120-attempt polling run
//! completes in microseconds and can be asserted tick by tick.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Timer: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Timer`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
