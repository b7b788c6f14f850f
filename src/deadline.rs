//! Caller-supplied deadline propagated through every blocking sub-call.
//!
//! One `Deadline` flows from the CLI into `run_scan` and each `remediate`
//! call, and from there into limiter waits and network requests, so a
//! scan-level timeout terminates all outstanding work.

use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::error::{AuditError, AuditResult};

/// Absolute cutoff for a unit of work. `Deadline::none()` never expires.
///
/// Copy by design so it can be handed to every spawned task without
/// bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Deadline(None)
    }

    pub fn after(duration: Duration) -> Self {
        Deadline(Some(Instant::now() + duration))
    }

    pub fn at(instant: Instant) -> Self {
        Deadline(Some(instant))
    }

    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    pub fn expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Returns `Canceled` when the deadline has already passed.
    pub fn check(&self) -> AuditResult<()> {
        if self.expired() {
            Err(AuditError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Runs a future under this deadline, mapping expiry to `Canceled`.
    pub async fn run<F, T>(&self, fut: F) -> AuditResult<T>
    where
        F: Future<Output = T>,
    {
        match self.0 {
            None => Ok(fut.await),
            Some(at) => timeout_at(at, fut).await.map_err(|_| AuditError::Canceled),
        }
    }
}
