//! Capability traits for the external embedding and reasoning providers.
//!
//! The core never talks to a model API directly; it consumes these traits and
//! leaves the wire protocol to an adapter crate.

use async_trait::async_trait;
use thiserror::Error;

/// Failure classification for one external capability call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Timeouts, rate limits, dropped connections. Safe to retry.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Anything retrying will not fix: auth, malformed request, bad payload.
    #[error("provider failure: {0}")]
    Fatal(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Embedding capability: text in, normalized vector out.
///
/// Implementations must return one vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Fatal("embedder returned no vectors".into()))
    }
}

/// Reasoning capability: structured prompt in, raw completion text out.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
