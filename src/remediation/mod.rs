//! Retrieval-augmented remediation pipeline.
//!
//! For one finding: embed its canonical text, retrieve similar past
//! fixes from the knowledge store, prompt the language model, parse the
//! answer into steps and code, then write the answer back so future
//! queries can retrieve it. Each finding is a bulkhead; a failure is
//! logged and never affects sibling findings.

pub mod embedding;
pub mod llm;
pub mod parser;
pub mod prompt;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tracing::{error, info, warn};

pub use embedding::{Embedder, EmbeddingClient};
pub use llm::{LlmBackend, OllamaBackend, OpenAiBackend};
pub use parser::RemediationDetails;

use crate::deadline::Deadline;
use crate::error::AuditResult;
use crate::knowledge::{KnowledgeRecord, KnowledgeStore, MetadataFilter};
use crate::model::Vulnerability;

const DEFAULT_TOP_K: u64 = 5;

pub struct Remediator {
    embedder: Arc<dyn Embedder>,
    knowledge: Arc<dyn KnowledgeStore>,
    llm: Arc<dyn LlmBackend>,
    top_k: u64,
}

impl Remediator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        knowledge: Arc<dyn KnowledgeStore>,
        llm: Arc<dyn LlmBackend>,
    ) -> Self {
        Self {
            embedder,
            knowledge,
            llm,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: u64) -> Self {
        self.top_k = top_k;
        self
    }

    /// One-shot enrichment of a single finding: embed, retrieve, prompt,
    /// generate, parse, persist.
    ///
    /// On success the finding carries the raw answer plus parsed steps
    /// and code (either may legitimately be empty). The write-back is
    /// best-effort: an upsert failure is logged and swallowed because
    /// the finding is already enriched.
    pub async fn remediate(
        &self,
        deadline: Deadline,
        finding: &mut Vulnerability,
    ) -> AuditResult<()> {
        info!(finding_id = %finding.id, "Retrieving AI remediation for finding");

        let finding_text = finding.canonical_text();
        let embedding = self.embedder.embed(deadline, &finding_text).await?;

        let matches = self
            .knowledge
            .query(
                deadline,
                embedding.clone(),
                self.top_k,
                Some(MetadataFilter::service(&finding.service)),
            )
            .await?;

        let llm_prompt = prompt::build_prompt(finding, &matches);
        let answer = self.llm.generate(deadline, &llm_prompt).await?;
        let details = parser::parse_remediation(&answer);

        finding.ai_remediation = answer;
        finding.remediation_steps = details.steps.clone();
        finding.remediation_code = details.code.clone();

        let record = knowledge_record(finding, &finding_text, embedding, &details);
        let record_key = record.id.clone();
        match self.knowledge.upsert(deadline, vec![record]).await {
            Ok(_) => {
                info!(
                    finding_id = %finding.id,
                    record_key = %record_key,
                    "Stored remediation in knowledge base"
                );
            }
            Err(err) => {
                warn!(
                    finding_id = %finding.id,
                    error = %err,
                    "Failed to store remediation in knowledge base"
                );
            }
        }

        Ok(())
    }

    /// Enriches every finding with bounded concurrency. Per-finding
    /// failures are logged and never abort the batch.
    pub async fn remediate_all(
        &self,
        deadline: Deadline,
        findings: &mut [Vulnerability],
        concurrency: usize,
    ) {
        let total = findings.len();
        info!(findings = total, concurrency, "Starting remediation batch");
        futures::stream::iter(findings.iter_mut())
            .for_each_concurrent(concurrency.max(1), |finding| {
                let finding_id = finding.id.clone();
                async move {
                    if let Err(err) = self.remediate(deadline, finding).await {
                        error!(
                            finding_id = %finding_id,
                            error = %err,
                            "Remediation failed for finding"
                        );
                    }
                }
            })
            .await;
        info!(findings = total, "Remediation batch complete");
    }
}

/// Builds the write-back record. The key appends a nanosecond timestamp
/// to the finding id so repeated remediations of one finding store
/// distinct records.
fn knowledge_record(
    finding: &Vulnerability,
    finding_text: &str,
    embedding: Vec<f32>,
    details: &RemediationDetails,
) -> KnowledgeRecord {
    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let steps_joined = details.steps.join("\n");
    let metadata = HashMap::from([
        ("original_finding_id".to_string(), finding.id.clone()),
        ("original_finding_name".to_string(), finding.name.clone()),
        (
            "original_description".to_string(),
            finding.description.clone(),
        ),
        ("service".to_string(), finding.service.clone()),
        ("resource_id".to_string(), finding.resource_id.clone()),
        ("severity".to_string(), finding.severity.to_string()),
        ("remediation_code".to_string(), details.code.clone()),
        ("remediation_steps".to_string(), steps_joined.clone()),
        (
            "text".to_string(),
            format!(
                "Vulnerability: {}.\n Remediation steps: {}\nCode: {}",
                finding_text, steps_joined, details.code
            ),
        ),
    ]);

    KnowledgeRecord {
        id: format!("remediation-{}-{}", finding.id, stamp),
        embedding,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::knowledge::QueryMatch;
    use crate::model::{finding_id, Severity};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _deadline: Deadline, _text: &str) -> AuditResult<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        matches: Vec<QueryMatch>,
        fail_upserts: bool,
        filters: Mutex<Vec<Option<MetadataFilter>>>,
        upserts: Mutex<Vec<KnowledgeRecord>>,
    }

    #[async_trait]
    impl KnowledgeStore for RecordingStore {
        async fn query(
            &self,
            _deadline: Deadline,
            _embedding: Vec<f32>,
            _top_k: u64,
            filter: Option<MetadataFilter>,
        ) -> AuditResult<Vec<QueryMatch>> {
            self.filters.lock().unwrap().push(filter);
            Ok(self.matches.clone())
        }

        async fn upsert(
            &self,
            _deadline: Deadline,
            records: Vec<KnowledgeRecord>,
        ) -> AuditResult<usize> {
            if self.fail_upserts {
                return Err(AuditError::Knowledge(anyhow::anyhow!("write unavailable")));
            }
            let count = records.len();
            self.upserts.lock().unwrap().extend(records);
            Ok(count)
        }
    }

    struct ScriptedLlm {
        answer: &'static str,
        fail_on_marker: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn answering(answer: &'static str) -> Self {
            Self {
                answer,
                fail_on_marker: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedLlm {
        async fn generate(&self, _deadline: Deadline, prompt: &str) -> AuditResult<String> {
            if let Some(marker) = self.fail_on_marker {
                if prompt.contains(marker) {
                    return Err(AuditError::Llm(anyhow::anyhow!("model overloaded")));
                }
            }
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.to_string())
        }
    }

    const ANSWER: &str = "1. Do X\n2. Do Y\n```awscli\naws s3api put-bucket-encryption --bucket logs\n```\n";

    fn sample_finding() -> Vulnerability {
        Vulnerability::new(
            finding_id("S3.3", "logs", ""),
            "S3.3_EncryptionDisabled",
            "Checks for S3 buckets that do not have default encryption enabled",
            "S3",
            "logs",
            "us-east-1",
            Severity::High,
        )
    }

    fn pipeline(
        store: Arc<RecordingStore>,
        llm: Arc<ScriptedLlm>,
    ) -> Remediator {
        Remediator::new(Arc::new(FixedEmbedder(vec![0.1, 0.2, 0.3])), store, llm)
    }

    #[tokio::test]
    async fn remediate_populates_the_finding_and_stores_a_record() {
        let store = Arc::new(RecordingStore {
            matches: vec![QueryMatch {
                id: "m-1".to_string(),
                score: 0.92,
                metadata: HashMap::from([(
                    "text".to_string(),
                    "Enable SSE-S3 on the bucket".to_string(),
                )]),
            }],
            ..RecordingStore::default()
        });
        let llm = Arc::new(ScriptedLlm::answering(ANSWER));
        let remediator = pipeline(Arc::clone(&store), Arc::clone(&llm));

        let mut finding = sample_finding();
        remediator
            .remediate(Deadline::none(), &mut finding)
            .await
            .unwrap();

        assert_eq!(finding.ai_remediation, ANSWER);
        assert_eq!(finding.remediation_steps, vec!["Do X", "Do Y"]);
        assert_eq!(
            finding.remediation_code,
            "aws s3api put-bucket-encryption --bucket logs"
        );

        // Retrieval was scoped to the finding's service.
        let filters = store.filters.lock().unwrap();
        assert_eq!(filters.len(), 1);
        let filter = filters[0].as_ref().unwrap();
        assert_eq!(filter.field, "service");
        assert_eq!(filter.value, "S3");

        // The retrieved example reached the model.
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("Enable SSE-S3 on the bucket"));

        // The answer was written back with the finding's fields.
        let upserts = store.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        let record = &upserts[0];
        assert!(record.id.starts_with("remediation-S3.3-logs-"));
        assert_eq!(record.embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(record.metadata["original_finding_id"], "S3.3-logs");
        assert_eq!(record.metadata["service"], "S3");
        assert_eq!(record.metadata["severity"], "HIGH");
        assert_eq!(record.metadata["remediation_steps"], "Do X\nDo Y");
        assert!(record.metadata["text"].contains("Remediation steps: Do X\nDo Y"));
    }

    #[tokio::test]
    async fn repeated_remediation_stores_distinct_record_keys() {
        let store = Arc::new(RecordingStore::default());
        let llm = Arc::new(ScriptedLlm::answering(ANSWER));
        let remediator = pipeline(Arc::clone(&store), llm);

        let mut finding = sample_finding();
        remediator
            .remediate(Deadline::none(), &mut finding)
            .await
            .unwrap();
        remediator
            .remediate(Deadline::none(), &mut finding)
            .await
            .unwrap();

        let upserts = store.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 2);
        assert_ne!(upserts[0].id, upserts[1].id);
    }

    #[tokio::test]
    async fn upsert_failure_is_swallowed() {
        let store = Arc::new(RecordingStore {
            fail_upserts: true,
            ..RecordingStore::default()
        });
        let llm = Arc::new(ScriptedLlm::answering(ANSWER));
        let remediator = pipeline(store, llm);

        let mut finding = sample_finding();
        remediator
            .remediate(Deadline::none(), &mut finding)
            .await
            .unwrap();
        assert_eq!(finding.remediation_steps, vec!["Do X", "Do Y"]);
    }

    #[tokio::test]
    async fn llm_failure_leaves_the_finding_untouched() {
        let store = Arc::new(RecordingStore::default());
        let llm = Arc::new(ScriptedLlm {
            answer: ANSWER,
            fail_on_marker: Some("Vulnerability Detected"),
            prompts: Mutex::new(Vec::new()),
        });
        let remediator = pipeline(Arc::clone(&store), llm);

        let mut finding = sample_finding();
        let err = remediator
            .remediate(Deadline::none(), &mut finding)
            .await
            .unwrap_err();
        assert!(!err.is_canceled());
        assert!(finding.ai_remediation.is_empty());
        assert!(store.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remediate_all_isolates_per_finding_failures() {
        let store = Arc::new(RecordingStore::default());
        // Fails only for the EC2 finding; the S3 findings still succeed.
        let llm = Arc::new(ScriptedLlm {
            answer: ANSWER,
            fail_on_marker: Some("(EC2)"),
            prompts: Mutex::new(Vec::new()),
        });
        let remediator = pipeline(Arc::clone(&store), llm);

        let mut findings = vec![
            sample_finding(),
            Vulnerability::new(
                finding_id("EC2.2", "i-1", ""),
                "EC2.2_PublicInstance",
                "Checks for EC2 instances with a public IP address",
                "EC2",
                "i-1",
                "us-east-1",
                Severity::Medium,
            ),
            {
                let mut other = sample_finding();
                other.id = finding_id("S3.3", "backups", "");
                other.resource_id = "backups".to_string();
                other
            },
        ];

        remediator
            .remediate_all(Deadline::none(), &mut findings, 2)
            .await;

        assert!(!findings[0].ai_remediation.is_empty());
        assert!(findings[1].ai_remediation.is_empty());
        assert!(!findings[2].ai_remediation.is_empty());
        assert_eq!(store.upserts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn expired_deadline_cancels_remediation() {
        let store = Arc::new(RecordingStore::default());
        let llm = Arc::new(ScriptedLlm::answering(ANSWER));
        let remediator = Remediator::new(Arc::new(DeadlineAwareEmbedder), store, llm);

        let mut finding = sample_finding();
        let err = remediator
            .remediate(Deadline::after(std::time::Duration::ZERO), &mut finding)
            .await
            .unwrap_err();
        assert!(err.is_canceled());
    }

    /// Embedder that honors the deadline the way the real client does.
    struct DeadlineAwareEmbedder;

    #[async_trait]
    impl Embedder for DeadlineAwareEmbedder {
        async fn embed(&self, deadline: Deadline, _text: &str) -> AuditResult<Vec<f32>> {
            deadline.check()?;
            Ok(vec![0.0])
        }
    }
}
