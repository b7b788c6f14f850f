//! Provider seam for resource enumeration.
//!
//! The audit core only requires list/describe semantics with a cursor:
//! each call returns one page plus an opaque token for the next one. Rate
//! limiting and cursor draining live above this trait, in `Inventory`.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{
    Bucket, EbsSnapshot, Instance, PasswordPolicy, SecurityGroup, User, Volume,
};

/// One page of an enumeration. `next_page_token` is absent on the last
/// page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// A single page holding everything, for adapters without cursors.
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// Capability-scoped enumeration against a concrete inventory source.
///
/// Implementations perform exactly one upstream request per call and never
/// drain cursors themselves; that keeps the one-token-per-page accounting
/// in `Inventory` honest.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn security_groups(
        &self,
        region: &str,
        page_token: Option<&str>,
    ) -> Result<Page<SecurityGroup>>;

    async fn instances(&self, region: &str, page_token: Option<&str>) -> Result<Page<Instance>>;

    async fn volumes(&self, region: &str, page_token: Option<&str>) -> Result<Page<Volume>>;

    async fn snapshots(&self, region: &str, page_token: Option<&str>)
        -> Result<Page<EbsSnapshot>>;

    async fn buckets(&self, region: &str, page_token: Option<&str>) -> Result<Page<Bucket>>;

    async fn users(&self, region: &str, page_token: Option<&str>) -> Result<Page<User>>;

    /// The account password policy, or `None` when no policy is set.
    async fn password_policy(&self, region: &str) -> Result<Option<PasswordPolicy>>;
}
