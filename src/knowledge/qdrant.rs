//! Qdrant adapter for the knowledge store.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointId, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::info;
use uuid::Uuid;

use crate::deadline::Deadline;
use crate::error::{AuditError, AuditResult};

use super::{KnowledgeRecord, KnowledgeStore, MetadataFilter, QueryMatch};

pub struct QdrantKnowledgeStore {
    client: Qdrant,
    collection: String,
}

impl QdrantKnowledgeStore {
    /// Connects to the Qdrant server and creates the collection when it
    /// does not exist yet.
    pub async fn connect(url: &str, collection: &str, vector_size: u64) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .with_context(|| format!("Failed to connect to Qdrant at {url}"))?;
        let store = Self {
            client,
            collection: collection.to_string(),
        };
        store.ensure_collection(vector_size).await?;
        Ok(store)
    }

    async fn ensure_collection(&self, vector_size: u64) -> Result<()> {
        let collections = self.client.list_collections().await?;
        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            info!(collection = %self.collection, "Creating knowledge collection");
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(self.collection.as_str())
                        .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
                )
                .await
                .context("Failed to create Qdrant collection")?;
        }

        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for QdrantKnowledgeStore {
    async fn query(
        &self,
        deadline: Deadline,
        embedding: Vec<f32>,
        top_k: u64,
        filter: Option<MetadataFilter>,
    ) -> AuditResult<Vec<QueryMatch>> {
        let mut search = SearchPointsBuilder::new(self.collection.as_str(), embedding, top_k)
            .with_payload(true);
        if let Some(filter) = filter {
            search = search.filter(Filter::must([Condition::matches(
                filter.field,
                filter.value,
            )]));
        }

        let results = deadline
            .run(self.client.search_points(search))
            .await?
            .map_err(|e| AuditError::Knowledge(e.into()))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| QueryMatch {
                id: point_id_string(point.id),
                score: point.score,
                metadata: string_payload(point.payload),
            })
            .collect())
    }

    async fn upsert(
        &self,
        deadline: Deadline,
        records: Vec<KnowledgeRecord>,
    ) -> AuditResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let count = records.len();
        let points: Vec<PointStruct> = records.into_iter().map(point_from_record).collect();

        deadline
            .run(
                self.client
                    .upsert_points(UpsertPointsBuilder::new(self.collection.as_str(), points).wait(true)),
            )
            .await?
            .map_err(|e| AuditError::Knowledge(e.into()))?;

        Ok(count)
    }
}

fn point_from_record(record: KnowledgeRecord) -> PointStruct {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("record_key".to_string(), Value::from(record.id.clone()));
    for (key, value) in record.metadata {
        payload.insert(key, Value::from(value));
    }
    PointStruct::new(point_uuid(&record.id).to_string(), record.embedding, payload)
}

/// Qdrant point ids must be UUIDs or integers; the readable record key is
/// hashed to a stable UUID and kept in the payload under `record_key`.
fn point_uuid(record_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes())
}

fn point_id_string(id: Option<PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

/// Keeps the string-typed payload fields; the store only ever writes
/// strings, so anything else came from another writer and is dropped.
fn string_payload(payload: HashMap<String, Value>) -> HashMap<String, String> {
    payload
        .into_iter()
        .filter_map(|(key, value)| value.as_str().map(|text| (key, text.to_string())))
        .collect()
}
