//! Offline provider backed by a JSON inventory export.
//!
//! Scanning a saved export exercises the same paging and rate-limiting
//! path as the live REST provider: results are served in fixed-size
//! pages with an offset cursor, so each page still costs one limiter
//! token upstream in [`super::Inventory`].

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::provider::{Page, ResourceProvider};
use super::types::{
    Bucket, EbsSnapshot, Instance, InventoryExport, PasswordPolicy, SecurityGroup, User, Volume,
};

const PAGE_SIZE: usize = 100;

/// Serves resources out of an in-memory [`InventoryExport`].
#[derive(Debug)]
pub struct SnapshotProvider {
    export: InventoryExport,
}

impl SnapshotProvider {
    /// Reads and deserializes an export file written by a previous run
    /// or an external collector.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot file {}", path.display()))?;
        let export: InventoryExport = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse snapshot file {}", path.display()))?;
        Ok(Self { export })
    }

    pub fn from_export(export: InventoryExport) -> Self {
        Self { export }
    }

    fn page_of<T: Clone>(items: &[T], token: Option<&str>) -> Result<Page<T>> {
        let offset: usize = match token {
            Some(t) => t
                .parse()
                .with_context(|| format!("Invalid page token {t:?}"))?,
            None => 0,
        };
        let end = offset.saturating_add(PAGE_SIZE).min(items.len());
        let slice = items.get(offset..end).unwrap_or(&[]).to_vec();
        Ok(Page {
            items: slice,
            next_page_token: (end < items.len()).then(|| end.to_string()),
        })
    }
}

#[async_trait]
impl ResourceProvider for SnapshotProvider {
    async fn security_groups(
        &self,
        _region: &str,
        page_token: Option<&str>,
    ) -> Result<Page<SecurityGroup>> {
        Self::page_of(&self.export.security_groups, page_token)
    }

    async fn instances(&self, _region: &str, page_token: Option<&str>) -> Result<Page<Instance>> {
        Self::page_of(&self.export.instances, page_token)
    }

    async fn volumes(&self, _region: &str, page_token: Option<&str>) -> Result<Page<Volume>> {
        Self::page_of(&self.export.volumes, page_token)
    }

    async fn snapshots(
        &self,
        _region: &str,
        page_token: Option<&str>,
    ) -> Result<Page<EbsSnapshot>> {
        Self::page_of(&self.export.snapshots, page_token)
    }

    async fn buckets(&self, _region: &str, page_token: Option<&str>) -> Result<Page<Bucket>> {
        Self::page_of(&self.export.buckets, page_token)
    }

    async fn users(&self, _region: &str, page_token: Option<&str>) -> Result<Page<User>> {
        Self::page_of(&self.export.users, page_token)
    }

    async fn password_policy(&self, _region: &str) -> Result<Option<PasswordPolicy>> {
        Ok(self.export.password_policy.clone())
    }
}
