//! Vector knowledge store for past finding/remediation pairs.
//!
//! The remediation pipeline talks to the store through [`KnowledgeStore`]
//! only; the Qdrant adapter lives in [`qdrant`] and tests substitute
//! scripted fakes.

pub mod qdrant;

use std::collections::HashMap;

use async_trait::async_trait;

pub use qdrant::QdrantKnowledgeStore;

use crate::deadline::Deadline;
use crate::error::AuditResult;

/// A finding/remediation pair as written to the store.
#[derive(Debug, Clone)]
pub struct KnowledgeRecord {
    /// Unique per upsert (finding id plus a nanosecond timestamp), so
    /// remediating the same finding twice stores two records.
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

/// Read-only projection of a stored record returned by a similarity
/// query, ordered most-similar first.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

/// Server-side equality constraint on one metadata field.
#[derive(Debug, Clone)]
pub struct MetadataFilter {
    pub field: String,
    pub value: String,
}

impl MetadataFilter {
    /// Scopes a query to records from the same service category.
    pub fn service(value: &str) -> Self {
        Self {
            field: "service".to_string(),
            value: value.to_string(),
        }
    }
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Nearest-neighbor search; an empty result set is valid.
    async fn query(
        &self,
        deadline: Deadline,
        embedding: Vec<f32>,
        top_k: u64,
        filter: Option<MetadataFilter>,
    ) -> AuditResult<Vec<QueryMatch>>;

    /// Writes records and returns how many were stored.
    async fn upsert(
        &self,
        deadline: Deadline,
        records: Vec<KnowledgeRecord>,
    ) -> AuditResult<usize>;
}
