//! Identity and credential checks.

use async_trait::async_trait;
use chrono::Utc;

use crate::deadline::Deadline;
use crate::error::AuditResult;
use crate::inventory::Inventory;
use crate::model::{finding_id, Severity, Vulnerability};

use super::Rule;

const MAX_KEY_AGE_DAYS: i64 = 90;

/// IAM.1: users holding the AdministratorAccess managed policy.
pub struct AdminAccessUser;

#[async_trait]
impl Rule for AdminAccessUser {
    fn name(&self) -> &'static str {
        "IAM.1_AdminAccessUser"
    }

    fn description(&self) -> &'static str {
        "Checks for IAM users with the AdministratorAccess managed policy"
    }

    fn service(&self) -> &'static str {
        "IAM"
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
        for user in inventory.users(deadline, region).await? {
            let admin = user
                .attached_policies
                .iter()
                .find(|p| p.policy_name == "AdministratorAccess");
            let Some(policy) = admin else { continue };

            let mut finding = Vulnerability::new(
                finding_id("IAM.1", &user.user_name, ""),
                self.name(),
                self.description(),
                self.service(),
                &user.user_name,
                region,
                self.severity(),
            )
            .with_detail("PolicyName", "AdministratorAccess")
            .with_detail("PolicyARN", policy.policy_arn.clone());
            if let Some(arn) = &user.arn {
                finding = finding.with_arn(arn);
            }
            findings.push(finding);
        }
        Ok(findings)
    }
}

/// IAM.2: active access keys that have outlived the rotation window.
pub struct LongLivedAccessKey;

#[async_trait]
impl Rule for LongLivedAccessKey {
    fn name(&self) -> &'static str {
        "IAM.2_LongLivedAccessKey"
    }

    fn description(&self) -> &'static str {
        "Checks for IAM users with long-lived access keys (that have not been rotated in the last 90 days)"
    }

    fn service(&self) -> &'static str {
        "IAM"
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
        let now = Utc::now();
        for user in inventory.users(deadline, region).await? {
            for key in &user.access_keys {
                // Inactive keys cannot be used; only live credentials age out.
                if key.status != "Active" {
                    continue;
                }
                let age_days = (now - key.create_date).num_days();
                if age_days <= MAX_KEY_AGE_DAYS {
                    continue;
                }
                let mut finding = Vulnerability::new(
                    finding_id("IAM.2", &user.user_name, ""),
                    self.name(),
                    self.description(),
                    self.service(),
                    &user.user_name,
                    region,
                    self.severity(),
                )
                .with_detail("AccessKeyId", key.access_key_id.clone())
                .with_detail("CreateDate", key.create_date.to_rfc3339())
                .with_detail("AgeDays", age_days.to_string());
                if let Some(arn) = &user.arn {
                    finding = finding.with_arn(arn);
                }
                findings.push(finding);
            }
        }
        Ok(findings)
    }
}

/// IAM.3: account password policy missing or weaker than the baseline
/// (length 14, symbols, numbers, mixed case, max age 90 days).
pub struct WeakPasswordPolicy;

#[async_trait]
impl Rule for WeakPasswordPolicy {
    fn name(&self) -> &'static str {
        "IAM.3_WeakPasswordPolicy"
    }

    fn description(&self) -> &'static str {
        "Checks for IAM account password policies that do not enforce strong password requirements"
    }

    fn service(&self) -> &'static str {
        "IAM"
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
        let Some(policy) = inventory.password_policy(deadline, region).await? else {
            return Ok(vec![Vulnerability::new(
                finding_id("IAM.3", "NoPolicy", ""),
                self.name(),
                "No password policy set for the IAM user",
                self.service(),
                "Account",
                region,
                self.severity(),
            )
            .with_detail("Reason", "No password policy set")]);
        };

        const MIN_LENGTH: u32 = 14;
        const MAX_AGE_DAYS: u32 = 90;

        let mut finding = Vulnerability::new(
            finding_id("IAM.3", "WeakPolicy", ""),
            self.name(),
            self.description(),
            self.service(),
            "Account",
            region,
            self.severity(),
        );
        let mut weak = false;

        if policy.minimum_password_length < MIN_LENGTH {
            weak = true;
            finding = finding.with_detail(
                "MinimumPasswordLength",
                format!(
                    "Current: {}, Recommended: {}",
                    policy.minimum_password_length, MIN_LENGTH
                ),
            );
        }
        if !policy.require_symbols {
            weak = true;
            finding = finding.with_detail("RequireSymbols", "Current: false, Recommended: true");
        }
        if !policy.require_numbers {
            weak = true;
            finding = finding.with_detail("RequireNumbers", "Current: false, Recommended: true");
        }
        if !policy.require_uppercase_characters {
            weak = true;
            finding = finding.with_detail(
                "RequireUppercaseCharacters",
                "Current: false, Recommended: true",
            );
        }
        if !policy.require_lowercase_characters {
            weak = true;
            finding = finding.with_detail(
                "RequireLowercaseCharacters",
                "Current: false, Recommended: true",
            );
        }
        match policy.max_password_age {
            Some(age) if age <= MAX_AGE_DAYS => {}
            Some(age) => {
                weak = true;
                finding = finding.with_detail(
                    "MaxPasswordAge",
                    format!("Current: {age} days, Recommended: {MAX_AGE_DAYS} days or less"),
                );
            }
            None => {
                weak = true;
                finding = finding.with_detail(
                    "MaxPasswordAge",
                    format!("Current: not set, Recommended: {MAX_AGE_DAYS} days or less"),
                );
            }
        }

        Ok(if weak { vec![finding] } else { vec![] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::types::{
        AccessKey, AttachedPolicy, InventoryExport, PasswordPolicy, User,
    };
    use crate::inventory::{RateLimiter, SnapshotProvider};
    use chrono::Duration;
    use std::sync::Arc;

    fn inventory_of(export: InventoryExport) -> Inventory {
        Inventory::new(
            Box::new(SnapshotProvider::from_export(export)),
            Arc::new(RateLimiter::new(1000, 1000)),
        )
    }

    fn strong_policy() -> PasswordPolicy {
        PasswordPolicy {
            minimum_password_length: 14,
            require_symbols: true,
            require_numbers: true,
            require_uppercase_characters: true,
            require_lowercase_characters: true,
            max_password_age: Some(90),
        }
    }

    fn key(id: &str, status: &str, age_days: i64) -> AccessKey {
        AccessKey {
            access_key_id: id.into(),
            status: status.into(),
            create_date: Utc::now() - Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn flags_administrator_access_users() {
        let inventory = inventory_of(InventoryExport {
            users: vec![
                User {
                    user_name: "root-like".into(),
                    arn: Some("arn:aws:iam::123456789012:user/root-like".into()),
                    access_keys: vec![],
                    attached_policies: vec![AttachedPolicy {
                        policy_name: "AdministratorAccess".into(),
                        policy_arn: "arn:aws:iam::aws:policy/AdministratorAccess".into(),
                    }],
                },
                User {
                    user_name: "reader".into(),
                    arn: None,
                    access_keys: vec![],
                    attached_policies: vec![AttachedPolicy {
                        policy_name: "ReadOnlyAccess".into(),
                        policy_arn: "arn:aws:iam::aws:policy/ReadOnlyAccess".into(),
                    }],
                },
            ],
            ..InventoryExport::default()
        });

        let findings = AdminAccessUser
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.id, "IAM.1-root-like");
        assert_eq!(
            finding.resource_arn.as_deref(),
            Some("arn:aws:iam::123456789012:user/root-like")
        );
        assert_eq!(finding.details["PolicyName"], "AdministratorAccess");
    }

    #[tokio::test]
    async fn flags_only_active_keys_past_the_rotation_window() {
        let inventory = inventory_of(InventoryExport {
            users: vec![User {
                user_name: "ops".into(),
                arn: None,
                access_keys: vec![
                    key("AKIAOLD", "Active", 120),
                    key("AKIAFRESH", "Active", 30),
                    key("AKIARETIRED", "Inactive", 400),
                ],
                attached_policies: vec![],
            }],
            ..InventoryExport::default()
        });

        let findings = LongLivedAccessKey
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.id, "IAM.2-ops");
        assert_eq!(finding.details["AccessKeyId"], "AKIAOLD");
        assert_eq!(finding.details["AgeDays"], "120");
    }

    #[tokio::test]
    async fn key_exactly_at_the_window_is_not_flagged() {
        let inventory = inventory_of(InventoryExport {
            users: vec![User {
                user_name: "ops".into(),
                arn: None,
                access_keys: vec![key("AKIAEDGE", "Active", 90)],
                attached_policies: vec![],
            }],
            ..InventoryExport::default()
        });

        let findings = LongLivedAccessKey
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn missing_password_policy_is_a_finding() {
        let inventory = inventory_of(InventoryExport::default());

        let findings = WeakPasswordPolicy
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.id, "IAM.3-NoPolicy");
        assert_eq!(finding.resource_id, "Account");
        assert_eq!(finding.description, "No password policy set for the IAM user");
        assert_eq!(finding.details["Reason"], "No password policy set");
    }

    #[tokio::test]
    async fn weak_policy_reports_each_failed_requirement() {
        let inventory = inventory_of(InventoryExport {
            password_policy: Some(PasswordPolicy {
                minimum_password_length: 8,
                require_symbols: false,
                require_numbers: true,
                require_uppercase_characters: true,
                require_lowercase_characters: true,
                max_password_age: None,
            }),
            ..InventoryExport::default()
        });

        let findings = WeakPasswordPolicy
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.id, "IAM.3-WeakPolicy");
        assert_eq!(
            finding.details["MinimumPasswordLength"],
            "Current: 8, Recommended: 14"
        );
        assert_eq!(
            finding.details["RequireSymbols"],
            "Current: false, Recommended: true"
        );
        assert_eq!(
            finding.details["MaxPasswordAge"],
            "Current: not set, Recommended: 90 days or less"
        );
        assert!(!finding.details.contains_key("RequireNumbers"));
    }

    #[tokio::test]
    async fn strong_policy_is_silent() {
        let inventory = inventory_of(InventoryExport {
            password_policy: Some(strong_policy()),
            ..InventoryExport::default()
        });

        let findings = WeakPasswordPolicy
            .check(Deadline::none(), &inventory, "us-east-1")
            .await
            .unwrap();
        assert!(findings.is_empty());
    }
}
