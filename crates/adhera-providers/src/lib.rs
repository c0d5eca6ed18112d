//! Concrete adapters behind the capability traits.
//!
//! The engine only sees [`Embedder`](adhera_core::traits::Embedder) and
//! [`Reasoner`](adhera_core::traits::Reasoner); this crate supplies the
//! OpenAI-compatible HTTP implementations plus a plain-text document loader.

pub mod openai;
pub mod source;

pub use openai::{OpenAiConfig, OpenAiEmbedder, OpenAiReasoner};
pub use source::{load_documents, SourceError};
