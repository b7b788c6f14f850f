//! Security rule catalog.
//!
//! A rule is a stateless predicate over the inventory: `check` reads the
//! resource categories it cares about through the rate-limited
//! [`Inventory`] facade and emits zero or more findings. Severity is a
//! property of the rule, and finding ids are a pure function of rule tag
//! plus resource identity, so re-scans reproduce the same ids.

pub mod ec2;
pub mod iam;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;

use crate::deadline::Deadline;
use crate::engine::Scanner;
use crate::error::AuditResult;
use crate::inventory::Inventory;
use crate::model::{Severity, Vulnerability};

/// A named, stateless security check.
#[async_trait]
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Service group the rule belongs to ("EC2", "S3", "IAM"); the scan
    /// command filters the catalog on this tag.
    fn service(&self) -> &'static str;

    fn severity(&self) -> Severity;

    async fn check(
        &self,
        deadline: Deadline,
        inventory: &Inventory,
        region: &str,
    ) -> AuditResult<Vec<Vulnerability>>;
}

/// The built-in catalog, in registration order.
pub fn default_rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(ec2::OpenSshIngress),
        Arc::new(ec2::PublicInstance),
        Arc::new(ec2::UnencryptedVolume),
        Arc::new(ec2::PublicSnapshot),
        Arc::new(s3::PublicBucket),
        Arc::new(s3::VersioningDisabled),
        Arc::new(s3::EncryptionDisabled),
        Arc::new(iam::AdminAccessUser),
        Arc::new(iam::LongLivedAccessKey),
        Arc::new(iam::WeakPasswordPolicy),
    ]
}

/// Registers the full built-in catalog on a scanner.
pub fn register_default_rules(scanner: &mut Scanner) {
    for rule in default_rules() {
        scanner.register(rule);
    }
}
