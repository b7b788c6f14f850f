//! Language model backends.
//!
//! Two wire styles ship: a local Ollama-style generate API and the
//! OpenAI chat API. Configuration picks one; the pipeline only sees
//! [`LlmBackend`].

use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_openai::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::deadline::Deadline;
use crate::error::{AuditError, AuditResult};

/// A language model answering one prompt with one completion.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, deadline: Deadline, prompt: &str) -> AuditResult<String>;
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Non-streaming client for an Ollama server.
pub struct OllamaBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build Ollama HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&OllamaRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .context("Failed to send Ollama request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {body}");
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .context("Failed to decode Ollama response")?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, deadline: Deadline, prompt: &str) -> AuditResult<String> {
        deadline
            .run(self.request(prompt))
            .await?
            .map_err(AuditError::Llm)
    }
}

/// Chat-completions client for the OpenAI API.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_key: &str, model: &str) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into()])
            .build()?;

        let response = self.client.chat().create(request).await?;
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .context("No choices returned from OpenAI")
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn generate(&self, deadline: Deadline, prompt: &str) -> AuditResult<String> {
        deadline
            .run(self.request(prompt))
            .await?
            .map_err(AuditError::Llm)
    }
}
