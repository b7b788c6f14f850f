//! skyaudit — cloud security auditor with retrieval-augmented remediation.
//!
//! Two engines around a shared finding model:
//!
//! - [`engine::Scanner`] runs a registry of [`rules::Rule`] checks in
//!   parallel against a rate-limited [`inventory::Inventory`], isolating
//!   per-rule failures so one broken check never loses the others' results.
//! - [`remediation::Remediator`] enriches a finding with an AI-generated
//!   fix: embed the finding, retrieve similar past fixes from the vector
//!   knowledge store, prompt a language model, parse the answer into steps
//!   and code, and write the answer back for future retrievals.

pub mod config;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod knowledge;
pub mod model;
pub mod output;
pub mod remediation;
pub mod rules;

pub use deadline::Deadline;
pub use engine::Scanner;
pub use error::{AuditError, AuditResult};
pub use model::{Severity, Vulnerability};
