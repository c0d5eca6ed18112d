//! Turns one classification request into a binary verdict.
//!
//! The engine retrieves grounding passages, renders a structured prompt, and
//! parses the reasoner's response strictly. A malformed response triggers a
//! stricter re-prompt; after the bound is exhausted the cell is ambiguous,
//! never silently defaulted.

use std::fmt::Write as _;
use std::sync::Arc;

use adhera_core::{
    traits::Reasoner, ClassificationRequest, EngineConfig, Label, Passage, Verdict,
};
use adhera_knowledge::KnowledgeBase;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Everything needed to render the decision prompt for one cell.
struct DecisionQuery<'a> {
    passages: &'a [Passage],
    input: &'a str,
    role: &'a str,
    /// Set after a malformed response to demand a bare token.
    strict: bool,
}

impl DecisionQuery<'_> {
    fn render(&self) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "You review whether an input adheres to the guidelines below."
        );
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Guidelines for {}:", self.role);
        for (n, passage) in self.passages.iter().enumerate() {
            let _ = writeln!(
                prompt,
                "[{}] ({}, offset {}) {}",
                n + 1,
                passage.source,
                passage.start,
                passage.text.trim()
            );
        }
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Input:");
        let _ = writeln!(prompt, "{}", self.input.trim());
        let _ = writeln!(prompt);
        let _ = write!(
            prompt,
            "Question: Does the input adhere to the guidelines? \
             Answer with exactly one word: Yes or No."
        );
        if self.strict {
            let _ = write!(
                prompt,
                " Your previous answer was not a single Yes or No token. \
                 Answer again with exactly \"Yes\" or \"No\" and nothing else."
            );
        }
        prompt
    }
}

pub struct DecisionEngine {
    kb: Arc<KnowledgeBase>,
    reasoner: Arc<dyn Reasoner>,
    retrieval_k: usize,
    max_reprompts: u32,
}

impl DecisionEngine {
    pub fn new(kb: Arc<KnowledgeBase>, reasoner: Arc<dyn Reasoner>, config: &EngineConfig) -> Self {
        Self {
            kb,
            reasoner,
            retrieval_k: config.retrieval_k,
            max_reprompts: config.max_reprompts,
        }
    }

    /// Classify one cell. Deterministic given the same knowledge base and a
    /// deterministic reasoner; the grounding ids always reflect the passages
    /// that were actually in the prompt.
    pub async fn classify(&self, request: &ClassificationRequest) -> Result<Verdict, EngineError> {
        let passages = self.kb.retrieve(&request.text, self.retrieval_k).await?;
        let grounding: Vec<_> = passages.iter().map(|p| p.id).collect();

        let mut query = DecisionQuery {
            passages: &passages,
            input: &request.text,
            role: &request.role,
            strict: false,
        };

        let mut last = String::new();
        for attempt in 1..=self.max_reprompts {
            let response = self.reasoner.complete(&query.render()).await?;
            match Label::parse_strict(&response) {
                Some(label) => {
                    debug!(
                        row = request.row,
                        column = %request.column,
                        %label,
                        attempt,
                        "verdict"
                    );
                    return Ok(Verdict {
                        label,
                        grounding,
                        rationale: Some(response.trim().to_string()),
                    });
                }
                None => {
                    warn!(
                        row = request.row,
                        column = %request.column,
                        attempt,
                        response = %response.trim(),
                        "malformed response, re-prompting strictly"
                    );
                    last = response;
                    query.strict = true;
                }
            }
        }

        Err(EngineError::AmbiguousDecision {
            attempts: self.max_reprompts,
            last: last.trim().to_string(),
        })
    }
}
