//! Best-effort extraction of steps and code from a model answer.
//!
//! The prompt asks for numbered steps and one fenced code block, but
//! model answers drift; parsing is lossy, and an absent block or list is
//! an empty result, never an error.

use std::sync::OnceLock;

use regex::Regex;

/// Structured pieces extracted from one model answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationDetails {
    pub steps: Vec<String>,
    pub code: String,
}

pub fn parse_remediation(answer: &str) -> RemediationDetails {
    RemediationDetails {
        steps: parse_steps(answer),
        code: parse_code(answer),
    }
}

fn code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z0-9_-]*\n(.*?)```").expect("static pattern"))
}

fn list_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:\d+[.)]?|[*-])\s+(.*)$").expect("static pattern"))
}

/// Content of the first fenced code block, language tag ignored,
/// trimmed. Empty when the answer has no block.
pub fn parse_code(answer: &str) -> String {
    code_block_regex()
        .captures(answer)
        .and_then(|caps| caps.get(1))
        .map(|code| code.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Ordered list items: lines led by a digit marker (`1.`, `2)`), `*` or
/// `-`, trimmed, empty items dropped.
pub fn parse_steps(answer: &str) -> Vec<String> {
    list_item_regex()
        .captures_iter(answer)
        .filter_map(|caps| caps.get(1))
        .map(|item| item.as_str().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
