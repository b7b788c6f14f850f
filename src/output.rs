//! Rendering of scan findings.
//!
//! One sorted report in three shapes: an aligned text table for humans,
//! pretty JSON for tooling, CSV for spreadsheets. Logs go to stderr so
//! every format stays pipeable from stdout.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{info, warn};

use crate::model::Vulnerability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table
    Table,
    /// Pretty-printed JSON
    Json,
    /// Header row plus one quoted row per finding
    Csv,
}

const TABLE_COLUMNS: [&str; 7] = [
    "ID",
    "Severity",
    "Service",
    "Resource ID",
    "Description",
    "Region",
    "AI Remediation",
];

const CSV_COLUMNS: [&str; 13] = [
    "ID",
    "Name",
    "Description",
    "Service",
    "Resource ID",
    "Resource ARN",
    "Region",
    "Severity",
    "Details",
    "Remediation Steps",
    "Remediation Code",
    "AI Remediation",
    "Timestamp",
];

/// Severity first (Critical on top), then finding id, so reports group
/// by urgency and stay stable across runs.
pub fn sort_findings(findings: &mut [Vulnerability]) {
    findings.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.id.cmp(&b.id)));
}

/// Sorts and renders the findings, then writes them to `destination` or
/// stdout. An empty scan logs a warning and produces no output.
pub fn print_findings(
    findings: &mut [Vulnerability],
    format: OutputFormat,
    destination: Option<&Path>,
) -> Result<()> {
    if findings.is_empty() {
        warn!("No vulnerabilities found");
        return Ok(());
    }

    sort_findings(findings);
    let rendered = render(findings, format)?;
    match destination {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write findings to {}", path.display()))?;
            info!(path = %path.display(), findings = findings.len(), "Wrote findings");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

pub fn render(findings: &[Vulnerability], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(findings)),
        OutputFormat::Json => {
            let mut rendered = serde_json::to_string_pretty(findings)
                .context("Failed to serialize findings to JSON")?;
            rendered.push('\n');
            Ok(rendered)
        }
        OutputFormat::Csv => render_csv(findings),
    }
}

fn render_table(findings: &[Vulnerability]) -> String {
    let rows: Vec<Vec<String>> = findings
        .iter()
        .map(|f| {
            vec![
                f.id.clone(),
                f.severity.to_string(),
                f.service.clone(),
                f.resource_id.clone(),
                truncate(&f.description, 50),
                f.region.clone(),
                truncate(&f.ai_remediation, 80).replace('\n', " "),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = TABLE_COLUMNS.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let header: Vec<String> = TABLE_COLUMNS.iter().map(|h| h.to_string()).collect();
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

    let mut out = String::new();
    push_table_row(&mut out, &header, &widths);
    push_table_row(&mut out, &rule, &widths);
    for row in &rows {
        push_table_row(&mut out, row, &widths);
    }
    out
}

fn push_table_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push_str("   ");
        }
        line.push_str(cell);
        let pad = widths[i].saturating_sub(cell.chars().count());
        line.push_str(&" ".repeat(pad));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

fn render_csv(findings: &[Vulnerability]) -> Result<String> {
    let mut out = String::new();
    let header: Vec<String> = CSV_COLUMNS.iter().map(|h| h.to_string()).collect();
    push_csv_row(&mut out, &header);

    for f in findings {
        let details =
            serde_json::to_string(&f.details).context("Failed to serialize finding details")?;
        push_csv_row(
            &mut out,
            &[
                f.id.clone(),
                f.name.clone(),
                f.description.clone(),
                f.service.clone(),
                f.resource_id.clone(),
                f.resource_arn.clone().unwrap_or_default(),
                f.region.clone(),
                f.severity.to_string(),
                details,
                f.remediation_steps.join("; "),
                f.remediation_code.clone(),
                f.ai_remediation.clone(),
                f.timestamp.to_rfc3339(),
            ],
        );
    }
    Ok(out)
}

fn push_csv_row(out: &mut String, fields: &[String]) {
    let quoted: Vec<String> = fields
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect();
    out.push_str(&quoted.join(","));
    out.push('\n');
}

/// Char-safe truncation: anything longer than `max` keeps `max - 3`
/// characters plus an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
