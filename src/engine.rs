//! Concurrent rule-execution engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::deadline::Deadline;
use crate::error::{AuditError, AuditResult};
use crate::inventory::Inventory;
use crate::model::Vulnerability;
use crate::rules::Rule;

/// Runs a fixed registry of rules in parallel against one inventory.
///
/// Rules are bulkhead-isolated: a failing (or panicking) rule is logged
/// and contributes zero findings, and the scan still succeeds with the
/// other rules' results. The one exception is deadline expiry, which
/// cancels the scan as a whole.
pub struct Scanner {
    rules: Vec<Arc<dyn Rule>>,
    inventory: Arc<Inventory>,
    region: String,
}

impl Scanner {
    pub fn new(inventory: Arc<Inventory>, region: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            inventory,
            region: region.into(),
        }
    }

    /// Adds a rule to the registry. The registry is fixed once a scan
    /// starts; registration order is bookkeeping only.
    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Runs every registered rule concurrently and returns the merged
    /// findings once all rules have completed.
    ///
    /// Returns [`AuditError::Canceled`] with no partial findings when the
    /// deadline has already expired at entry or fires while rules run;
    /// any other per-rule error is logged and swallowed.
    pub async fn run_scan(&self, deadline: Deadline) -> AuditResult<Vec<Vulnerability>> {
        deadline.check()?;
        let scan_id = Uuid::new_v4();
        info!(
            scan_id = %scan_id,
            rules = self.rules.len(),
            region = %self.region,
            "Starting security scan"
        );

        let findings = Arc::new(Mutex::new(Vec::new()));
        let canceled = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let rule = Arc::clone(rule);
            let inventory = Arc::clone(&self.inventory);
            let findings = Arc::clone(&findings);
            let canceled = Arc::clone(&canceled);
            let region = self.region.clone();

            handles.push(tokio::spawn(async move {
                match rule.check(deadline, &inventory, &region).await {
                    Ok(found) => {
                        info!(rule = rule.name(), findings = found.len(), "Rule completed");
                        findings.lock().await.extend(found);
                    }
                    Err(err) if err.is_canceled() => {
                        warn!(rule = rule.name(), "Rule canceled by scan deadline");
                        canceled.store(true, Ordering::SeqCst);
                    }
                    Err(err) => {
                        error!(rule = rule.name(), error = %err, "Rule failed, continuing scan");
                    }
                }
            }));
        }

        for handle in handles {
            if let Err(join_err) = handle.await {
                // A panicking rule is isolated the same as a failing one.
                error!(error = %join_err, "Rule task aborted");
            }
        }

        if canceled.load(Ordering::SeqCst) {
            return Err(AuditError::Canceled);
        }

        let merged = std::mem::take(&mut *findings.lock().await);
        info!(scan_id = %scan_id, findings = merged.len(), "Scan complete");
        Ok(merged)
    }
}
