//! Embedding gateway.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::deadline::Deadline;
use crate::error::{AuditError, AuditResult};

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, deadline: Deadline, text: &str) -> AuditResult<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
}

/// Deployed embedding servers disagree on the field name; both
/// spellings are accepted.
#[derive(Deserialize, Default)]
#[serde(default)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
    embeddings: Vec<f32>,
}

fn vector_from(response: EmbeddingResponse) -> Result<Vec<f32>> {
    let vector = if response.embedding.is_empty() {
        response.embeddings
    } else {
        response.embedding
    };
    if vector.is_empty() {
        anyhow::bail!("Embedding server returned an empty embedding");
    }
    Ok(vector)
}

/// Client for the sentence-transformer embedding server.
pub struct EmbeddingClient {
    http: reqwest::Client,
    base_url: String,
}

impl EmbeddingClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build embedding HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest { text })
            .send()
            .await
            .context("Failed to send embedding request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding server returned {status}: {body}");
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to decode embedding response")?;
        vector_from(parsed)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, deadline: Deadline, text: &str) -> AuditResult<Vec<f32>> {
        deadline
            .run(self.request(text))
            .await?
            .map_err(AuditError::Embedding)
    }
}
