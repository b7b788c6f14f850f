//! Typed inventory records the rules evaluate.
//!
//! These are snapshots of provider state at enumeration time; rules never
//! mutate them. Wire names are camelCase to match the inventory service
//! and the snapshot export format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A security group with its ingress permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    pub group_id: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub ingress_rules: Vec<IngressRule>,
}

/// One ingress permission: a protocol, an optional port range and the
/// source ranges admitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    /// "tcp", "udp", "icmp" or "-1" for all protocols.
    #[serde(default)]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_port: Option<u16>,
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
    #[serde(default)]
    pub ipv6_cidr_blocks: Vec<String>,
}

impl IngressRule {
    /// Whether this permission admits traffic on the given TCP port.
    pub fn covers_tcp_port(&self, port: u16) -> bool {
        let protocol = self.protocol.to_ascii_lowercase();
        if protocol != "tcp" && protocol != "-1" {
            return false;
        }
        match (self.from_port, self.to_port) {
            (Some(from), Some(to)) => from <= port && port <= to,
            // No port range on an all-protocol permission means all ports.
            (None, None) => protocol == "-1",
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_id: String,
    /// "pending", "running", "stopped", ...
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub volume_id: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub volume_type: String,
    #[serde(default)]
    pub size_gb: u32,
}

/// A completed EBS snapshot together with its create-volume permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EbsSnapshot {
    pub snapshot_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub owner_id: String,
    /// Permission groups granted create-volume access; "all" means public.
    #[serde(default)]
    pub create_volume_permission_groups: Vec<String>,
}

/// A storage bucket with the access-control state the S3 rules inspect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    #[serde(default)]
    pub acl_grants: Vec<AclGrant>,
    /// Raw bucket policy document, when one is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    /// "Enabled", "Suspended", or absent when versioning was never
    /// configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning_status: Option<String>,
    /// Absent when the bucket has no server-side encryption configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grantee_uri: Option<String>,
    #[serde(default)]
    pub permission: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionConfig {
    #[serde(default)]
    pub rules: Vec<EncryptionRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionRule {
    #[serde(default)]
    pub sse_algorithm: String,
}

/// An identity with its credentials and attached managed policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default)]
    pub access_keys: Vec<AccessKey>,
    #[serde(default)]
    pub attached_policies: Vec<AttachedPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKey {
    pub access_key_id: String,
    /// "Active" or "Inactive".
    #[serde(default)]
    pub status: String,
    pub create_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedPolicy {
    pub policy_name: String,
    #[serde(default)]
    pub policy_arn: String,
}

/// Account password policy; `None` from the provider means no policy is
/// set at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPolicy {
    #[serde(default)]
    pub minimum_password_length: u32,
    #[serde(default)]
    pub require_symbols: bool,
    #[serde(default)]
    pub require_numbers: bool,
    #[serde(default)]
    pub require_uppercase_characters: bool,
    #[serde(default)]
    pub require_lowercase_characters: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_password_age: Option<u32>,
}

/// A full inventory capture, the document format served by the snapshot
/// adapter and produced by inventory export tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryExport {
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub snapshots: Vec<EbsSnapshot>,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_policy: Option<PasswordPolicy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingress_rule_port_coverage() {
        let ssh_only = IngressRule {
            protocol: "tcp".into(),
            from_port: Some(22),
            to_port: Some(22),
            cidr_blocks: vec!["0.0.0.0/0".into()],
            ipv6_cidr_blocks: vec![],
        };
        assert!(ssh_only.covers_tcp_port(22));
        assert!(!ssh_only.covers_tcp_port(80));

        let wide_range = IngressRule {
            protocol: "TCP".into(),
            from_port: Some(1),
            to_port: Some(1024),
            cidr_blocks: vec![],
            ipv6_cidr_blocks: vec![],
        };
        assert!(wide_range.covers_tcp_port(22));

        let udp = IngressRule {
            protocol: "udp".into(),
            from_port: Some(22),
            to_port: Some(22),
            cidr_blocks: vec![],
            ipv6_cidr_blocks: vec![],
        };
        assert!(!udp.covers_tcp_port(22));

        let all_traffic = IngressRule {
            protocol: "-1".into(),
            from_port: None,
            to_port: None,
            cidr_blocks: vec![],
            ipv6_cidr_blocks: vec![],
        };
        assert!(all_traffic.covers_tcp_port(22));
    }

    #[test]
    fn export_deserializes_with_missing_sections() {
        let export: InventoryExport = serde_json::from_str(r#"{"buckets": []}"#).unwrap();
        assert!(export.security_groups.is_empty());
        assert!(export.password_policy.is_none());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let group = SecurityGroup {
            group_id: "sg-1".into(),
            group_name: "web".into(),
            ingress_rules: vec![],
        };
        let json = serde_json::to_string(&group).unwrap();
        assert!(json.contains("\"groupId\""));
        assert!(json.contains("\"ingressRules\""));
    }
}
