pub mod cache_key;
pub mod config;
pub mod retry;
pub mod table;
pub mod traits;
pub mod types;

pub use cache_key::CacheKey;
pub use config::EngineConfig;
pub use retry::RetryPolicy;
pub use table::{ColumnTarget, Table, FAILED_SENTINEL};
pub use traits::{Embedder, ProviderError, Reasoner};
pub use types::{CellRef, ClassificationRequest, Document, Label, Passage, PassageId, Verdict};
