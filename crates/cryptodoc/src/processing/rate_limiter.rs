//! Process-wide admission gate for generative-text calls
//!
//! A single-slot permit bucket: the bucket starts full, and a background task
//! tops it up once per period but only when it is empty. A refill that finds
//! the bucket full is dropped, never banked, so at most one call is admitted
//! per period no matter how many callers are waiting.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Shared single-permit rate limiter
///
/// Cloning is cheap and every clone draws from the same bucket. The refill
/// task stops when the last clone is dropped.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    permits: Arc<Semaphore>,
    period: Duration,
    refill: JoinHandle<()>,
}

impl Drop for RateLimiterInner {
    fn drop(&mut self) {
        self.refill.abort();
    }
}

impl RateLimiter {
    /// Start a limiter admitting one call per `period`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(period: Duration) -> Self {
        let permits = Arc::new(Semaphore::new(1));

        let refill_permits = Arc::clone(&permits);
        let refill = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Only this task adds permits, so the check cannot race upward
                if refill_permits.available_permits() == 0 {
                    refill_permits.add_permits(1);
                }
            }
        });

        tracing::info!("Rate limiter started: 1 call per {:?}", period);

        Self {
            inner: Arc::new(RateLimiterInner {
                permits,
                period,
                refill,
            }),
        }
    }

    /// Wait for a permit and consume it
    ///
    /// Waiters are admitted in FIFO order. Under load this can stall for
    /// several periods; that is normal operation, not an error.
    pub async fn acquire(&self) {
        let waited = Instant::now();
        match self.inner.permits.acquire().await {
            Ok(permit) => permit.forget(),
            // The semaphore is never closed while the limiter is alive
            Err(_) => return,
        }

        let waited = waited.elapsed();
        if waited >= self.inner.period {
            tracing::debug!("Rate limiter admitted call after {:.1}s", waited.as_secs_f64());
        }
    }

    /// Whether a call would currently be admitted without waiting
    pub fn has_permit(&self) -> bool {
        self.inner.permits.available_permits() > 0
    }

    /// Refill period
    pub fn period(&self) -> Duration {
        self.inner.period
    }
}
