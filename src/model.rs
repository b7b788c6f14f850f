//! Finding model shared by the rule engine and the remediation pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a rule, inherited by every finding the rule emits.
///
/// Variant order is the sort order: ascending puts Critical first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One detected violation of a security rule against one resource.
///
/// Created by a rule during a scan, optionally enriched once by the
/// remediation pipeline, otherwise immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Stable across re-scans: a pure function of rule tag and resource
    /// identity, never of the remediation outcome.
    pub id: String,
    pub name: String,
    pub description: String,
    /// Tag naming the audited resource category ("EC2", "EBS", "S3", "IAM").
    pub service: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_arn: Option<String>,
    pub region: String,
    pub severity: Severity,
    /// Free-form evidence collected by the rule.
    #[serde(default)]
    pub details: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
    /// Raw model answer, empty until the remediation pipeline runs.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ai_remediation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remediation_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remediation_code: String,
}

impl Vulnerability {
    pub fn new(
        id: String,
        name: &str,
        description: &str,
        service: &str,
        resource_id: &str,
        region: &str,
        severity: Severity,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            service: service.to_string(),
            resource_id: resource_id.to_string(),
            resource_arn: None,
            region: region.to_string(),
            severity,
            details: HashMap::new(),
            timestamp: Utc::now(),
            ai_remediation: String::new(),
            remediation_steps: Vec::new(),
            remediation_code: String::new(),
        }
    }

    pub fn with_arn(mut self, arn: &str) -> Self {
        self.resource_arn = Some(arn.to_string());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Canonical text form of the finding, used both as the embedding input
    /// and inside prompts so stored answers and queries share one rendering.
    pub fn canonical_text(&self) -> String {
        format!(
            "Vulnerability: {}, Description: {}, Service: {}, ResourceID: {}, Region: {}, Severity: {}",
            self.name, self.description, self.service, self.resource_id, self.region, self.severity
        )
    }
}

/// Builds the deterministic finding id for a rule/resource pair.
///
/// Re-running the same rule against the same resource yields the same id,
/// which is what lets downstream systems deduplicate across scans.
pub fn finding_id(rule_tag: &str, resource_id: &str, slug: &str) -> String {
    if slug.is_empty() {
        format!("{}-{}", rule_tag, resource_id)
    } else {
        format!("{}-{}-{}", rule_tag, resource_id, slug)
    }
}
