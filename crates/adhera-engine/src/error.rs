use adhera_core::table::TableError;
use adhera_core::traits::ProviderError;
use adhera_knowledge::KnowledgeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The reasoner never produced a parseable label within the re-prompt
    /// bound. Not retryable: retrying would hide a prompt or model problem
    /// behind a made-up verdict.
    #[error("no unambiguous verdict after {attempts} attempts (last response: {last:?})")]
    AmbiguousDecision { attempts: u32, last: String },

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] KnowledgeError),

    #[error("reasoning failed: {0}")]
    Reasoning(#[from] ProviderError),

    #[error("batch cancelled")]
    Cancelled,

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Retrieval(cause) => cause.is_transient(),
            Self::Reasoning(cause) => cause.is_transient(),
            _ => false,
        }
    }
}
