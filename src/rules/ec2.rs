//! Compute and block-storage checks.

use async_trait::async_trait;

use crate::deadline::Deadline;
use crate::error::AuditResult;
use crate::inventory::Inventory;
use crate::model::{finding_id, Severity, Vulnerability};

use super::Rule;

/// EC2.1: security groups that admit SSH from the whole internet.
pub struct OpenSshIngress;

#[async_trait]
impl Rule for OpenSshIngress {
    fn name(&self) -> &'static str {
        "EC2.1_OpenSSHToInternet"
    }

    fn description(&self) -> &'static str {
        "Checks for EC2 security groups allowing SSH (port 22) from anywhere (0.0.0.0/0)"
    }

    fn service(&self) -> &'static str {
        "EC2"
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
        for group in inventory.security_groups(deadline, region).await? {
            // One finding per group, keyed on the first offending rule.
            'group: for rule in &group.ingress_rules {
                if !rule.covers_tcp_port(22) {
                    continue;
                }
                for cidr in rule.cidr_blocks.iter().chain(&rule.ipv6_cidr_blocks) {
                    if cidr == "0.0.0.0/0" || cidr == "::/0" {
                        findings.push(
                            Vulnerability::new(
                                finding_id("EC2.1", &group.group_id, "SSH_Open_Internet"),
                                self.name(),
                                self.description(),
                                self.service(),
                                &group.group_id,
                                region,
                                self.severity(),
                            )
                            .with_detail("SecurityGroupName", group.group_name.clone())
                            .with_detail("Protocol", rule.protocol.clone())
                            .with_detail("Port", "22")
                            .with_detail("SourceCidr", cidr.clone()),
                        );
                        break 'group;
                    }
                }
            }
        }
        Ok(findings)
    }
}

/// EC2.2: running instances directly reachable from the internet.
pub struct PublicInstance;

#[async_trait]
impl Rule for PublicInstance {
    fn name(&self) -> &'static str {
        "EC2.2_PublicInstance"
    }

    fn description(&self) -> &'static str {
        "Checks for EC2 instances with a public IP address"
    }

    fn service(&self) -> &'static str {
        "EC2"
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
        for instance in inventory.instances(deadline, region).await? {
            let public_ip = match instance.public_ip_address.as_deref() {
                Some(ip) if !ip.is_empty() => ip,
                _ => continue,
            };
            if instance.state != "running" {
                continue;
            }
            findings.push(
                Vulnerability::new(
                    finding_id("EC2.2", &instance.instance_id, ""),
                    self.name(),
                    self.description(),
                    self.service(),
                    &instance.instance_id,
                    region,
                    self.severity(),
                )
                .with_detail("PublicIpAddress", public_ip)
                .with_detail("InstanceType", instance.instance_type.clone())
                .with_detail("State", instance.state.clone()),
            );
        }
        Ok(findings)
    }
}

/// EC2.3: EBS volumes stored without encryption.
pub struct UnencryptedVolume;

#[async_trait]
impl Rule for UnencryptedVolume {
    fn name(&self) -> &'static str {
        "EC2.3_EBSUnencrypted"
    }

    fn description(&self) -> &'static str {
        "Checks for unencrypted EBS volumes"
    }

    fn service(&self) -> &'static str {
        "EC2"
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
        for volume in inventory.volumes(deadline, region).await? {
            if volume.encrypted {
                continue;
            }
            findings.push(
                Vulnerability::new(
                    finding_id("EC2.3", &volume.volume_id, ""),
                    self.name(),
                    self.description(),
                    "EBS",
                    &volume.volume_id,
                    region,
                    self.severity(),
                )
                .with_detail("VolumeState", volume.state.clone())
                .with_detail("VolumeType", volume.volume_type.clone())
                .with_detail("SizeGB", volume.size_gb.to_string()),
            );
        }
        Ok(findings)
    }
}

/// EC2.4: EBS snapshots shared with everyone via the `all` permission
/// group.
pub struct PublicSnapshot;

#[async_trait]
impl Rule for PublicSnapshot {
    fn name(&self) -> &'static str {
        "EC2.4_EBSSnapshotPublic"
    }

    fn description(&self) -> &'static str {
        "Checks for EBS snapshots that are publicly accessible"
    }

    fn service(&self) -> &'static str {
        "EC2"
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
        for snapshot in inventory.snapshots(deadline, region).await? {
            // Pending or errored snapshots are not shareable yet.
            if snapshot.state != "completed" {
                continue;
            }
            if !snapshot
                .create_volume_permission_groups
                .iter()
                .any(|g| g == "all")
            {
                continue;
            }
            findings.push(
                Vulnerability::new(
                    finding_id("EC2.4", &snapshot.snapshot_id, ""),
                    self.name(),
                    self.description(),
                    "EBS",
                    &snapshot.snapshot_id,
                    region,
                    self.severity(),
                )
                .with_detail("SnapshotId", snapshot.snapshot_id.clone())
                .with_detail("State", snapshot.state.clone())
                .with_detail("Encrypted", snapshot.encrypted.to_string())
                .with_detail("SnapshotOwnerId", snapshot.owner_id.clone()),
            );
        }
        Ok(findings)
    }
}
