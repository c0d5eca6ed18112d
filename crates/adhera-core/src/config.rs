//! Run-wide configuration, constructed once and passed explicitly.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk_overlap must be in [0, 1), got {0}")]
    OverlapOutOfRange(f32),

    #[error("retrieval_k must be greater than zero")]
    ZeroRetrievalK,

    #[error("concurrency must be greater than zero")]
    ZeroConcurrency,

    #[error("max_attempts must be greater than zero")]
    ZeroAttempts,

    #[error("backoff_base_ms must be greater than zero")]
    ZeroBackoffBase,

    #[error("call_timeout_secs must be greater than zero")]
    ZeroCallTimeout,

    #[error("max_reprompts must be greater than zero")]
    ZeroReprompts,

    #[error("embed_batch_size must be greater than zero")]
    ZeroEmbedBatch,
}

/// Configuration consumed by the knowledge base and batch orchestrator.
///
/// There is no ambient state: one of these is built per run and torn down
/// when the batch completes or cancels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target passage size in characters.
    pub chunk_size: usize,
    /// Fraction of each passage repeated at the start of the next.
    pub chunk_overlap: f32,
    /// Number of passages retrieved as grounding per request.
    pub retrieval_k: usize,
    /// Maximum simultaneous in-flight classification requests.
    pub concurrency: usize,
    /// Attempt bound for transient failures, per cell and per embed batch.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base_ms: u64,
    /// Per-call timeout for external embedding and reasoning calls.
    pub call_timeout_secs: u64,
    /// Attempt bound for malformed reasoning responses within one request.
    pub max_reprompts: u32,
    /// Texts per embedding call during ingestion.
    pub embed_batch_size: usize,
    /// Whether the verdict cache is written back to disk after the batch.
    pub persist_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 0.1,
            retrieval_k: 4,
            concurrency: 8,
            max_attempts: 3,
            backoff_base_ms: 500,
            call_timeout_secs: 30,
            max_reprompts: 3,
            embed_batch_size: 64,
            persist_cache: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if !(0.0..1.0).contains(&self.chunk_overlap) {
            return Err(ConfigError::OverlapOutOfRange(self.chunk_overlap));
        }
        if self.retrieval_k == 0 {
            return Err(ConfigError::ZeroRetrievalK);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.backoff_base_ms == 0 {
            return Err(ConfigError::ZeroBackoffBase);
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::ZeroCallTimeout);
        }
        if self.max_reprompts == 0 {
            return Err(ConfigError::ZeroReprompts);
        }
        if self.embed_batch_size == 0 {
            return Err(ConfigError::ZeroEmbedBatch);
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
