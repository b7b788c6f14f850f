//! Object-storage checks.

use async_trait::async_trait;

use crate::deadline::Deadline;
use crate::error::AuditResult;
use crate::inventory::Inventory;
use crate::model::{finding_id, Severity, Vulnerability};

use super::Rule;

const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
const AUTHENTICATED_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

/// S3.1: buckets readable by the world through an ACL grant or a
/// wildcard-principal policy.
pub struct PublicBucket;

#[async_trait]
impl Rule for PublicBucket {
    fn name(&self) -> &'static str {
        "S3.1_PublicBucket"
    }

    fn description(&self) -> &'static str {
        "Checks for S3 buckets that are publicly accessible via ACLs or bucket policies"
    }

    fn service(&self) -> &'static str {
        "S3"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    async fn check(
        &self,
        deadline: Deadline,
        inventory: &Inventory,
        region: &str,
    ) -> AuditResult<Vec<Vulnerability>> {
        let mut findings = Vec::new();
        for bucket in inventory.buckets(deadline, region).await? {
            let mut finding = Vulnerability::new(
                finding_id("S3.1", &bucket.name, ""),
                self.name(),
                self.description(),
                self.service(),
                &bucket.name,
                region,
                self.severity(),
            );

            let public_grant = bucket.acl_grants.iter().find(|grant| {
                matches!(
                    grant.grantee_uri.as_deref(),
                    Some(ALL_USERS_URI) | Some(AUTHENTICATED_USERS_URI)
                )
            });

            if let Some(grant) = public_grant {
                // grantee_uri is Some by construction of the find above.
                let uri = grant.grantee_uri.clone().unwrap_or_default();
                finding = finding
                    .with_detail("ACL_Public_Grantee", uri)
                    .with_detail("ACL_Permission", grant.permission.clone());
            } else if bucket.policy.as_deref().is_some_and(policy_admits_anyone) {
                finding = finding.with_detail("Policy_Public_Principal", "*");
            } else {
                continue;
            }

            findings.push(finding);
        }
        Ok(findings)
    }
}

/// Substring match over the raw policy document; a structural parse is
/// not warranted for the two principal spellings that grant public
/// access.
fn policy_admits_anyone(policy: &str) -> bool {
    let compact: String = policy.chars().filter(|c| !c.is_whitespace()).collect();
    compact.contains(r#""Principal":"*""#) || compact.contains(r#""Principal":{"AWS":"*"}"#)
}

/// S3.2: buckets whose versioning is unset or suspended.
pub struct VersioningDisabled;

#[async_trait]
impl Rule for VersioningDisabled {
    fn name(&self) -> &'static str {
        "S3.2_VersioningDisabled"
    }

    fn description(&self) -> &'static str {
        "Checks for S3 buckets that have versioning disabled"
    }

    fn service(&self) -> &'static str {
        "S3"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    async fn check(
        &self,
        deadline: Deadline,
        inventory: &Inventory,
        region: &str,
    ) -> AuditResult<Vec<Vulnerability>> {
        let mut findings = Vec::new();
        for bucket in inventory.buckets(deadline, region).await? {
            if bucket.versioning_status.as_deref() == Some("Enabled") {
                continue;
            }
            let status = bucket
                .versioning_status
                .clone()
                .unwrap_or_else(|| "NotConfigured".to_string());
            findings.push(
                Vulnerability::new(
                    finding_id("S3.2", &bucket.name, ""),
                    self.name(),
                    self.description(),
                    self.service(),
                    &bucket.name,
                    region,
                    self.severity(),
                )
                .with_detail("VersioningStatus", status),
            );
        }
        Ok(findings)
    }
}

/// S3.3: buckets without a usable default-encryption configuration.
pub struct EncryptionDisabled;

#[async_trait]
impl Rule for EncryptionDisabled {
    fn name(&self) -> &'static str {
        "S3.3_EncryptionDisabled"
    }

    fn description(&self) -> &'static str {
        "Checks for S3 buckets that do not have default encryption enabled"
    }

    fn service(&self) -> &'static str {
        "S3"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    async fn check(
        &self,
        deadline: Deadline,
        inventory: &Inventory,
        region: &str,
    ) -> AuditResult<Vec<Vulnerability>> {
        let mut findings = Vec::new();
        for bucket in inventory.buckets(deadline, region).await? {
            let (id, status) = match &bucket.encryption {
                None => (finding_id("S3.3", &bucket.name, ""), "Disabled"),
                Some(config) if config.rules.is_empty() => (
                    finding_id("S3.3", &bucket.name, "Misconfigured"),
                    "Misconfigured or empty rules",
                ),
                Some(_) => continue,
            };
            findings.push(
                Vulnerability::new(
                    id,
                    self.name(),
                    self.description(),
                    self.service(),
                    &bucket.name,
                    region,
                    self.severity(),
                )
                .with_detail("EncryptionStatus", status),
            );
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::types::{
        AclGrant, Bucket, EncryptionConfig, EncryptionRule, InventoryExport,
    };
    use crate::inventory::{RateLimiter, SnapshotProvider};
    use std::sync::Arc;

    fn inventory_of(buckets: Vec<Bucket>) -> Inventory {
        Inventory::new(
            Box::new(SnapshotProvider::from_export(InventoryExport {
                buckets,
                ..InventoryExport::default()
            })),
            Arc::new(RateLimiter::new(1000, 1000)),
        )
    }

    fn bucket(name: &str) -> Bucket {
        Bucket {
            name: name.into(),
            acl_grants: vec![],
            policy: None,
            versioning_status: Some("Enabled".into()),
            encryption: Some(EncryptionConfig {
                rules: vec![EncryptionRule {
                    sse_algorithm: "AES256".into(),
                }],
            }),
        }
    }

    #[tokio::test]
    async fn flags_bucket_public_via_acl() {
        let mut public = bucket("logs");
        public.acl_grants = vec![AclGrant {
            grantee_uri: Some(ALL_USERS_URI.into()),
            permission: "READ".into(),
        }];
        let inventory = inventory_of(vec![public, bucket("private")]);

        let findings = PublicBucket
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "S3.1-logs");
        assert_eq!(findings[0].details["ACL_Public_Grantee"], ALL_USERS_URI);
        assert_eq!(findings[0].details["ACL_Permission"], "READ");
    }

    #[tokio::test]
    async fn flags_bucket_public_via_policy_principal() {
        let mut by_string = bucket("www");
        by_string.policy =
            Some(r#"{"Statement":[{"Effect":"Allow","Principal":"*","Action":"s3:GetObject"}]}"#.into());
        let mut by_aws_block = bucket("cdn");
        by_aws_block.policy = Some(
            r#"{"Statement":[{"Effect": "Allow", "Principal": {"AWS": "*"}, "Action": "s3:GetObject"}]}"#
                .into(),
        );
        let mut scoped = bucket("internal");
        scoped.policy = Some(
            r#"{"Statement":[{"Principal":{"AWS":"arn:aws:iam::123456789012:root"}}]}"#.into(),
        );
        let inventory = inventory_of(vec![by_string, by_aws_block, scoped]);

        let findings = PublicBucket
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        let mut ids: Vec<&str> = findings.iter().map(|f| f.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["S3.1-cdn", "S3.1-www"]);
        assert!(findings
            .iter()
            .all(|f| f.details["Policy_Public_Principal"] == "*"));
    }

    #[tokio::test]
    async fn acl_evidence_wins_over_policy_evidence() {
        let mut both = bucket("mixed");
        both.acl_grants = vec![AclGrant {
            grantee_uri: Some(AUTHENTICATED_USERS_URI.into()),
            permission: "FULL_CONTROL".into(),
        }];
        both.policy = Some(r#"{"Principal":"*"}"#.into());
        let inventory = inventory_of(vec![both]);

        let findings = PublicBucket
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].details.contains_key("ACL_Public_Grantee"));
        assert!(!findings[0].details.contains_key("Policy_Public_Principal"));
    }

    #[tokio::test]
    async fn flags_unset_and_suspended_versioning() {
        let mut unset = bucket("fresh");
        unset.versioning_status = None;
        let mut suspended = bucket("paused");
        suspended.versioning_status = Some("Suspended".into());
        let inventory = inventory_of(vec![unset, suspended, bucket("versioned")]);

        let findings = VersioningDisabled
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert_eq!(findings.len(), 2);
        let by_id = |id: &str| findings.iter().find(|f| f.id == id).unwrap();
        assert_eq!(by_id("S3.2-fresh").details["VersioningStatus"], "NotConfigured");
        assert_eq!(by_id("S3.2-paused").details["VersioningStatus"], "Suspended");
    }

    #[tokio::test]
    async fn distinguishes_missing_and_empty_encryption_config() {
        let mut missing = bucket("plain");
        missing.encryption = None;
        let mut empty = bucket("half-done");
        empty.encryption = Some(EncryptionConfig { rules: vec![] });
        let inventory = inventory_of(vec![missing, empty, bucket("sealed")]);

        let findings = EncryptionDisabled
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert_eq!(findings.len(), 2);
        let by_id = |id: &str| findings.iter().find(|f| f.id == id).unwrap();
        assert_eq!(by_id("S3.3-plain").details["EncryptionStatus"], "Disabled");
        assert_eq!(
            by_id("S3.3-half-done-Misconfigured").details["EncryptionStatus"],
            "Misconfigured or empty rules"
        );
    }
}
