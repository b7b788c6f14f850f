//! Error taxonomy for the audit core.
//!
//! Only `Config` is allowed to terminate the process; everything else is
//! scoped to one rule or one finding and recovered locally by the engine
//! or the remediation batch. `Canceled` is the distinct signal raised when
//! a caller-supplied deadline fires and is never retried internally.

use thiserror::Error;

pub type AuditResult<T> = std::result::Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller-supplied deadline expired before the operation finished.
    #[error("operation canceled: deadline expired")]
    Canceled,

    /// An inventory provider call failed.
    #[error("inventory operation '{operation}' failed: {source}")]
    Provider {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The embedding service rejected or failed a request.
    #[error("embedding request failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// The vector knowledge store rejected or failed a request.
    #[error("knowledge store request failed: {0}")]
    Knowledge(#[source] anyhow::Error),

    /// The language model backend rejected or failed a request.
    #[error("language model request failed: {0}")]
    Llm(#[source] anyhow::Error),
}

impl AuditError {
    pub fn provider(operation: &'static str, source: anyhow::Error) -> Self {
        AuditError::Provider { operation, source }
    }

    /// True when the error carries the cancellation signal rather than a
    /// subsystem failure. The scan engine treats cancellation as global
    /// while subsystem failures stay bulkhead-isolated.
    pub fn is_canceled(&self) -> bool {
        matches!(self, AuditError::Canceled)
    }
}
