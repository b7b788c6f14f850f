//! Rate-limited inventory client.
//!
//! [`Inventory`] is the only way rules reach the resource provider: every
//! page fetched acquires one token from the shared [`RateLimiter`] first,
//! so aggregate request rate stays bounded no matter how many rules run
//! concurrently, and multi-page listings pay one token per page rather
//! than one per logical operation.

pub mod limiter;
pub mod provider;
pub mod rest;
pub mod snapshot;
pub mod types;

use std::sync::Arc;

pub use limiter::RateLimiter;
pub use provider::{Page, ResourceProvider};
pub use rest::RestInventoryProvider;
pub use snapshot::SnapshotProvider;

use crate::deadline::Deadline;
use crate::error::{AuditError, AuditResult};
use types::{Bucket, EbsSnapshot, Instance, PasswordPolicy, SecurityGroup, User, Volume};

/// Enumeration facade over a [`ResourceProvider`], draining cursors and
/// charging the shared limiter one token per page.
///
/// Provider errors are wrapped with the operation name; an expired
/// deadline surfaces as [`AuditError::Canceled`] before any further
/// request is issued.
pub struct Inventory {
    provider: Box<dyn ResourceProvider>,
    limiter: Arc<RateLimiter>,
}

impl Inventory {
    pub fn new(provider: Box<dyn ResourceProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self { provider, limiter }
    }

    pub async fn security_groups(
        &self,
        deadline: Deadline,
        region: &str,
    ) -> AuditResult<Vec<SecurityGroup>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            self.limiter.acquire(deadline).await?;
            let page = deadline
                .run(self.provider.security_groups(region, cursor.as_deref()))
                .await?
                .map_err(|e| AuditError::provider("security-groups", e))?;
            all.extend(page.items);
            match page.next_page_token {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }

    pub async fn instances(&self, deadline: Deadline, region: &str) -> AuditResult<Vec<Instance>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            self.limiter.acquire(deadline).await?;
            let page = deadline
                .run(self.provider.instances(region, cursor.as_deref()))
                .await?
                .map_err(|e| AuditError::provider("instances", e))?;
            all.extend(page.items);
            match page.next_page_token {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }

    pub async fn volumes(&self, deadline: Deadline, region: &str) -> AuditResult<Vec<Volume>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            self.limiter.acquire(deadline).await?;
            let page = deadline
                .run(self.provider.volumes(region, cursor.as_deref()))
                .await?
                .map_err(|e| AuditError::provider("volumes", e))?;
            all.extend(page.items);
            match page.next_page_token {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }

    pub async fn snapshots(
        &self,
        deadline: Deadline,
        region: &str,
    ) -> AuditResult<Vec<EbsSnapshot>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            self.limiter.acquire(deadline).await?;
            let page = deadline
                .run(self.provider.snapshots(region, cursor.as_deref()))
                .await?
                .map_err(|e| AuditError::provider("snapshots", e))?;
            all.extend(page.items);
            match page.next_page_token {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }

    pub async fn buckets(&self, deadline: Deadline, region: &str) -> AuditResult<Vec<Bucket>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            self.limiter.acquire(deadline).await?;
            let page = deadline
                .run(self.provider.buckets(region, cursor.as_deref()))
                .await?
                .map_err(|e| AuditError::provider("buckets", e))?;
            all.extend(page.items);
            match page.next_page_token {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }

    pub async fn users(&self, deadline: Deadline, region: &str) -> AuditResult<Vec<User>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            self.limiter.acquire(deadline).await?;
            let page = deadline
                .run(self.provider.users(region, cursor.as_deref()))
                .await?
                .map_err(|e| AuditError::provider("users", e))?;
            all.extend(page.items);
            match page.next_page_token {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }

    /// Single-call lookup; still pays one limiter token.
    pub async fn password_policy(
        &self,
        deadline: Deadline,
        region: &str,
    ) -> AuditResult<Option<PasswordPolicy>> {
        self.limiter.acquire(deadline).await?;
        deadline
            .run(self.provider.password_policy(region))
            .await?
            .map_err(|e| AuditError::provider("password-policy", e))
    }
}
