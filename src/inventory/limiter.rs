//! Shared token bucket bounding the aggregate request rate against the
//! inventory provider.
//!
//! Every page fetched from the provider consumes one token, regardless of
//! how many rules are running concurrently. Waiters honor the caller's
//! deadline and return `Canceled` without consuming a token when it fires.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::deadline::Deadline;
use crate::error::{AuditError, AuditResult};

/// Token bucket with a sustained refill rate and a burst capacity.
///
/// Held behind an `Arc` and shared by all concurrent rule tasks; the lock
/// is only taken for the refill arithmetic, never across a wait.
pub struct RateLimiter {
    rate_per_sec: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// A limiter that starts full: the first `burst` acquisitions do not
    /// wait.
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        Self {
            rate_per_sec: f64::from(rate_per_sec.max(1)),
            burst: f64::from(burst.max(1)),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst.max(1)),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token, waiting for a refill when the bucket is empty.
    ///
    /// Returns `Canceled` as soon as the deadline expires; the bucket is
    /// left untouched in that case.
    pub async fn acquire(&self, deadline: Deadline) -> AuditResult<()> {
        loop {
            deadline.check()?;

            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate_per_sec)
            };

            let token_due = Instant::now() + wait;
            match deadline.instant() {
                Some(at) if at <= token_due => {
                    sleep_until(at).await;
                    return Err(AuditError::Canceled);
                }
                _ => sleep_until(token_due).await,
            }
        }
    }
}
