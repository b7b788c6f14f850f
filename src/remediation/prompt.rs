//! Prompt construction.
//!
//! The prompt is deterministic for a given finding and match set: role
//! framing, the finding's fields, retrieved examples, then fixed
//! response-format instructions the parser relies on.

use tracing::warn;

use crate::knowledge::QueryMatch;
use crate::model::Vulnerability;

pub fn build_prompt(finding: &Vulnerability, matches: &[QueryMatch]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a security expert providing clear steps for remediation and advice for cloud vulnerabilities\n",
    );
    prompt.push_str(&format!(
        "Vulnerability Detected:\nRule: {}\nDescription: {}\nResource: {} ({})\nSeverity: {}\n\n",
        finding.name, finding.description, finding.resource_id, finding.service, finding.severity
    ));

    if !matches.is_empty() {
        prompt.push_str("some similar remediation examples from a knowledge base:\n");
        for (i, similar) in matches.iter().enumerate() {
            match similar.metadata.get("text") {
                Some(text) => {
                    prompt.push_str(&format!("Example {}:\n{}\n\n", i + 1, text));
                }
                None => {
                    warn!(
                        match_id = %similar.id,
                        "Knowledge match has no text metadata, skipping example"
                    );
                }
            }
        }
    }

    prompt.push_str("Based on the vulnerability and examples, provide a clear, concise remediation with:\n");
    prompt.push_str("1. Numbered or bulleted step-by-step instructions\n");
    prompt.push_str(
        "2. A code block (e.g., CLI, CloudFormation, Terraform) for automation, if applicable. Use standard Markdown for code blocks (e.g., ```awscli\n...code...\n``` or ```terraform\n...code...\n```)\n",
    );
    prompt.push_str("3. Ensure the response is directly actionable for a cloud administrator\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{finding_id, Severity};
    use std::collections::HashMap;

    fn finding() -> Vulnerability {
        Vulnerability::new(
            finding_id("EC2.1", "sg-1", "SSH_Open_Internet"),
            "EC2.1_OpenSSHToInternet",
            "Checks for EC2 security groups allowing SSH (port 22) from anywhere (0.0.0.0/0)",
            "EC2",
            "sg-1",
            "us-east-1",
            Severity::Critical,
        )
    }

    fn matched(id: &str, text: Option<&str>) -> QueryMatch {
        let mut metadata = HashMap::new();
        if let Some(text) = text {
            metadata.insert("text".to_string(), text.to_string());
        }
        QueryMatch {
            id: id.to_string(),
            score: 0.9,
            metadata,
        }
    }

    #[test]
    fn carries_the_finding_and_the_instructions() {
        let prompt = build_prompt(&finding(), &[]);
        assert!(prompt.contains("Rule: EC2.1_OpenSSHToInternet"));
        assert!(prompt.contains("Resource: sg-1 (EC2)"));
        assert!(prompt.contains("Severity: CRITICAL"));
        assert!(prompt.contains("Numbered or bulleted step-by-step instructions"));
        assert!(!prompt.contains("similar remediation examples"));
    }

    #[test]
    fn includes_retrieved_example_text() {
        let matches = vec![matched("m-1", Some("Close port 22 to 0.0.0.0/0"))];
        let prompt = build_prompt(&finding(), &matches);
        assert!(prompt.contains("some similar remediation examples from a knowledge base:"));
        assert!(prompt.contains("Example 1:\nClose port 22 to 0.0.0.0/0"));
    }

    #[test]
    fn skips_matches_without_text_metadata() {
        let matches = vec![
            matched("m-1", Some("Restrict the ingress rule")),
            matched("m-2", None),
        ];
        let prompt = build_prompt(&finding(), &matches);
        assert!(prompt.contains("Example 1:"));
        assert!(!prompt.contains("Example 2:"));
    }

    #[test]
    fn is_deterministic() {
        let matches = vec![matched("m-1", Some("Restrict the ingress rule"))];
        assert_eq!(
            build_prompt(&finding(), &matches),
            build_prompt(&finding(), &matches)
        );
    }
}
