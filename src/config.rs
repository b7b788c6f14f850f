//! Layered configuration.
//!
//! Values resolve flag > environment > file > default. The file layer is
//! a YAML document at `~/.skyaudit/config.yaml` (or `--config`); missing
//! fields fall back to the defaults below, so a partial file is valid.
//! Flag and environment overrides are applied by the CLI on top of the
//! loaded struct.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AuditError, AuditResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub region: String,
    pub inventory: InventoryConfig,
    pub embedding: EmbeddingConfig,
    pub knowledge: KnowledgeConfig,
    pub llm: LlmConfig,
    pub scan: ScanConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            region: "us-east-1".to_string(),
            inventory: InventoryConfig::default(),
            embedding: EmbeddingConfig::default(),
            knowledge: KnowledgeConfig::default(),
            llm: LlmConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Base URL of the inventory REST service. Required unless a
    /// snapshot file is configured.
    pub endpoint: String,
    /// Name of the environment variable holding the bearer token.
    pub token_env: String,
    /// Optional local inventory export; when set the audit runs offline.
    pub snapshot: Option<PathBuf>,
    pub rate_per_sec: u32,
    pub burst: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        InventoryConfig {
            endpoint: String::new(),
            token_env: "SKYAUDIT_API_TOKEN".to_string(),
            snapshot: None,
            rate_per_sec: 10,
            burst: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub url: String,
    pub dimension: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            url: "http://localhost:8000".to_string(),
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub url: String,
    pub collection: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        KnowledgeConfig {
            url: "http://localhost:6334".to_string(),
            collection: "remediation-knowledge".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Either "ollama" or "openai".
    pub choice: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub openai_model: String,
    /// Stored key; `OPENAI_API_KEY` in the environment takes over when
    /// this is empty.
    pub openai_api_key: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            choice: "ollama".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "granite3.1-moe".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_api_key: String::new(),
        }
    }
}

impl LlmConfig {
    pub fn resolved_openai_key(&self) -> Option<String> {
        if !self.openai_api_key.is_empty() {
            return Some(self.openai_api_key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub timeout_mins: u64,
    pub remediation_concurrency: usize,
    pub top_k: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            timeout_mins: 30,
            remediation_concurrency: 4,
            top_k: 5,
        }
    }
}

impl Config {
    /// `~/.skyaudit/config.yaml`, when a home directory can be resolved.
    pub fn default_path() -> Option<PathBuf> {
        home::home_dir().map(|dir| dir.join(".skyaudit").join("config.yaml"))
    }

    /// Loads an explicit file (must exist) or the default path (may be
    /// absent, in which case defaults apply).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => {
                    warn!("No config file found, using defaults and environment variables");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }
        let raw = serde_yaml::to_string(self).context("Failed to serialize configuration")?;
        fs::write(path, raw)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Startup validation; any failure here is fatal to a scan.
    pub fn validate(&self) -> AuditResult<()> {
        if self.region.trim().is_empty() {
            return Err(AuditError::Config("region must not be empty".to_string()));
        }
        if self.inventory.snapshot.is_none() && self.inventory.endpoint.trim().is_empty() {
            return Err(AuditError::Config(
                "inventory endpoint must be set when no snapshot file is configured".to_string(),
            ));
        }
        if self.inventory.rate_per_sec == 0 || self.inventory.burst == 0 {
            return Err(AuditError::Config(
                "inventory rate_per_sec and burst must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(AuditError::Config(
                "embedding dimension must be at least 1".to_string(),
            ));
        }
        if self.scan.timeout_mins == 0 {
            return Err(AuditError::Config(
                "scan timeout must be at least 1 minute".to_string(),
            ));
        }
        if self.scan.top_k == 0 {
            return Err(AuditError::Config(
                "retrieval top_k must be at least 1".to_string(),
            ));
        }
        match self.llm.choice.as_str() {
            "ollama" | "openai" => Ok(()),
            other => Err(AuditError::Config(format!(
                "unsupported llm choice '{other}' (expected ollama or openai)"
            ))),
        }
    }
}

/// Display form of a secret: first and last two characters survive,
/// anything shorter than four characters is fully hidden.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 4 {
        return "*******".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 4), tail)
}
