//! Guideline knowledge base: ingest documents once, answer retrieval queries
//! many times.
//!
//! Composes the chunker and index with an external embedding capability.
//! `ingest` takes `&mut self` and `retrieve` takes `&self`, so the type
//! system enforces that the base is read-only (and safe for concurrent
//! retrieval) once ingestion has finished.

pub mod chunker;
pub mod index;

pub use chunker::{chunk, Chunk, ChunkConfig, ChunkError};
pub use index::Index;

use std::sync::Arc;

use adhera_core::{
    retry::RetryPolicy,
    traits::{Embedder, ProviderError},
    Document, EngineConfig, Passage, PassageId,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// The knowledge base could not be built. Fatal: a broken base would
    /// invalidate every downstream verdict, so no classification may start.
    #[error("ingestion failed for '{source}': {cause}")]
    Ingestion {
        source: String,
        #[source]
        cause: ProviderError,
    },

    #[error("knowledge base is empty; ingest documents first")]
    Empty,

    /// Embedding the query text failed; transient causes are retryable by
    /// the caller.
    #[error("query embedding failed: {0}")]
    Retrieval(ProviderError),
}

impl KnowledgeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Retrieval(cause) if cause.is_transient())
    }
}

pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    index: Index,
    chunk_cfg: ChunkConfig,
    embed_batch_size: usize,
    retry: RetryPolicy,
}

impl KnowledgeBase {
    pub fn new(embedder: Arc<dyn Embedder>, config: &EngineConfig) -> Self {
        Self {
            embedder,
            index: Index::new(),
            chunk_cfg: ChunkConfig::new(config.chunk_size, config.chunk_overlap),
            embed_batch_size: config.embed_batch_size,
            retry: RetryPolicy::new(config.max_attempts, config.backoff_base_ms),
        }
    }

    /// Consume the full document set: chunk, embed, populate the index.
    ///
    /// Empty documents are skipped with a warning. An embedding call that
    /// still fails after the retry policy aborts the whole ingestion.
    pub async fn ingest(&mut self, documents: &[Document]) -> Result<(), KnowledgeError> {
        for doc in documents {
            let chunks: Vec<Chunk> = match chunk(doc, self.chunk_cfg) {
                Ok(iter) => iter.collect(),
                Err(ChunkError::EmptyDocument(source)) => {
                    warn!(%source, "skipping empty document");
                    continue;
                }
            };

            for batch in chunks.chunks(self.embed_batch_size) {
                let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
                let vectors = self
                    .retry
                    .run(ProviderError::is_transient, || {
                        self.embedder.embed_batch(&texts)
                    })
                    .await
                    .map_err(|cause| KnowledgeError::Ingestion {
                        source: doc.source.clone(),
                        cause,
                    })?;

                if vectors.len() != texts.len() {
                    return Err(KnowledgeError::Ingestion {
                        source: doc.source.clone(),
                        cause: ProviderError::Fatal(format!(
                            "{} embeddings returned for {} chunks",
                            vectors.len(),
                            texts.len()
                        )),
                    });
                }

                for (piece, vector) in batch.iter().zip(vectors) {
                    self.index
                        .add(doc.source.clone(), piece.start, piece.text.clone(), vector);
                }
            }
        }

        info!(
            documents = documents.len(),
            passages = self.index.len(),
            "knowledge base built"
        );
        Ok(())
    }

    /// Embed the query text and return the top-k passages, best first.
    ///
    /// Deterministic for identical (base, text, k): the query embedding is
    /// the only external call, and the index scan is stable.
    pub async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<Passage>, KnowledgeError> {
        if self.index.is_empty() {
            return Err(KnowledgeError::Empty);
        }
        let query = self
            .embedder
            .embed(text)
            .await
            .map_err(KnowledgeError::Retrieval)?;
        Ok(self
            .index
            .search(&query, k)
            .into_iter()
            .map(|(passage, _)| passage.clone())
            .collect())
    }

    pub fn passage(&self, id: PassageId) -> Option<&Passage> {
        self.index.get(id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adhera_core::traits::Embedder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    /// Deterministic bag-of-words embedder: each token bumps one dimension.
    struct HashEmbedder {
        calls: AtomicUsize,
    }

    impl HashEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn vector(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; 16];
            for token in text.split_whitespace() {
                let mut h = 0usize;
                for b in token.to_lowercase().bytes() {
                    h = h.wrapping_mul(31).wrapping_add(b as usize);
                }
                v[h % 16] += 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }
    }

    /// Fails transiently `failures` times, then behaves like HashEmbedder.
    struct FlakyEmbedder {
        failures: AtomicU32,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ProviderError::Transient("rate limited".into()));
            }
            Ok(texts.iter().map(|t| HashEmbedder::vector(t)).collect())
        }
    }

    struct DeadEmbedder;

    #[async_trait]
    impl Embedder for DeadEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::Transient("connection refused".into()))
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            chunk_size: 80,
            chunk_overlap: 0.1,
            max_attempts: 3,
            backoff_base_ms: 1,
            embed_batch_size: 4,
            ..Default::default()
        }
    }

    fn guideline_docs() -> Vec<Document> {
        vec![
            Document::new(
                "contracts",
                "Contracts must specify a termination clause. Payment terms must be \
                 defined before work begins.",
            ),
            Document::new(
                "safety",
                "Site inspections are required every quarter. Incident reports must \
                 be filed within two days.",
            ),
        ]
    }

    #[tokio::test]
    async fn ingest_builds_passages_from_all_documents() {
        let mut kb = KnowledgeBase::new(Arc::new(HashEmbedder::new()), &fast_config());
        kb.ingest(&guideline_docs()).await.unwrap();
        assert!(kb.len() >= 2);
        assert_eq!(kb.passage(0).unwrap().source, "contracts");
    }

    #[tokio::test]
    async fn empty_documents_are_skipped_not_fatal() {
        let docs = vec![
            Document::new("blank", "   "),
            Document::new("real", "One short guideline."),
        ];
        let mut kb = KnowledgeBase::new(Arc::new(HashEmbedder::new()), &fast_config());
        kb.ingest(&docs).await.unwrap();
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.passage(0).unwrap().source, "real");
    }

    #[tokio::test]
    async fn retrieve_finds_the_relevant_passage() {
        let mut kb = KnowledgeBase::new(Arc::new(HashEmbedder::new()), &fast_config());
        kb.ingest(&guideline_docs()).await.unwrap();

        let hits = kb
            .retrieve("the agreement includes a termination clause", 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("termination clause"));
    }

    #[tokio::test]
    async fn retrieve_is_deterministic() {
        let mut kb = KnowledgeBase::new(Arc::new(HashEmbedder::new()), &fast_config());
        kb.ingest(&guideline_docs()).await.unwrap();

        let a: Vec<_> = kb
            .retrieve("inspection schedule", 3)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        let b: Vec<_> = kb
            .retrieve("inspection schedule", 3)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn retrieve_before_ingest_errors() {
        let kb = KnowledgeBase::new(Arc::new(HashEmbedder::new()), &fast_config());
        let err = kb.retrieve("anything", 3).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::Empty));
    }

    #[tokio::test]
    async fn transient_embedding_failures_are_retried() {
        let embedder = FlakyEmbedder {
            failures: AtomicU32::new(2),
        };
        let mut kb = KnowledgeBase::new(Arc::new(embedder), &fast_config());
        kb.ingest(&[Document::new("doc", "A single guideline sentence.")])
            .await
            .unwrap();
        assert_eq!(kb.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_abort_ingestion() {
        let mut kb = KnowledgeBase::new(Arc::new(DeadEmbedder), &fast_config());
        let err = kb
            .ingest(&[Document::new("doc", "Never gets embedded.")])
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::Ingestion { .. }));
        assert!(kb.is_empty());
    }
}
