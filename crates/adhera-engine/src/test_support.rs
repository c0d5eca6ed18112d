//! Deterministic in-process doubles shared by the engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adhera_core::{
    traits::{Embedder, ProviderError, Reasoner},
    Document, EngineConfig,
};
use adhera_knowledge::KnowledgeBase;
use async_trait::async_trait;

pub(crate) fn fast_config() -> EngineConfig {
    EngineConfig {
        chunk_size: 80,
        chunk_overlap: 0.1,
        retrieval_k: 2,
        concurrency: 4,
        max_attempts: 2,
        backoff_base_ms: 1,
        max_reprompts: 3,
        embed_batch_size: 8,
        ..Default::default()
    }
}

/// Bag-of-words embedder: each token bumps one of 16 dimensions.
pub(crate) struct HashEmbedder;

impl HashEmbedder {
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
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// A small ingested knowledge base with contract and safety guidelines.
pub(crate) async fn built_kb() -> Arc<KnowledgeBase> {
    let docs = vec![
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
    ];
    let mut kb = KnowledgeBase::new(Arc::new(HashEmbedder), &fast_config());
    kb.ingest(&docs).await.expect("test corpus ingests");
    Arc::new(kb)
}

/// Replays a fixed response sequence, repeating the last entry, and records
/// every prompt it was given. `failing` builds one that always errors.
pub(crate) struct ScriptedReasoner {
    responses: Vec<String>,
    failure: Option<(bool, String)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    pub(crate) fn new(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|s| s.to_string()).collect(),
            failure: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(err: ProviderError) -> Self {
        let failure = match err {
            ProviderError::Transient(msg) => (true, msg),
            ProviderError::Fatal(msg) => (false, msg),
        };
        Self {
            responses: Vec::new(),
            failure: Some(failure),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((transient, msg)) = &self.failure {
            return Err(if *transient {
                ProviderError::Transient(msg.clone())
            } else {
                ProviderError::Fatal(msg.clone())
            });
        }
        let idx = n.min(self.responses.len() - 1);
        Ok(self.responses[idx].clone())
    }
}

/// Answers Yes when the prompt's input section contains the keyword.
///
/// Matches only the text between the `Input:` and `Question:` markers so
/// guideline passages mentioning the keyword do not flip the answer.
pub(crate) struct RuleReasoner {
    keyword: String,
    fail_marker: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl RuleReasoner {
    pub(crate) fn keyword(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            fail_marker: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Inputs containing `marker` fail transiently on every attempt.
    pub(crate) fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn input_section(prompt: &str) -> &str {
        let after = prompt.split("Input:").nth(1).unwrap_or(prompt);
        after.split("Question:").next().unwrap_or(after)
    }
}

#[async_trait]
impl Reasoner for RuleReasoner {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let input = Self::input_section(prompt).to_lowercase();
        if let Some(marker) = &self.fail_marker {
            if input.contains(&marker.to_lowercase()) {
                return Err(ProviderError::Transient("connection reset".into()));
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(if input.contains(&self.keyword.to_lowercase()) {
            "Yes".into()
        } else {
            "No".into()
        })
    }
}
