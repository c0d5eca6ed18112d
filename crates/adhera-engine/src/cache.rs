//! Verdict cache with in-flight coalescing and optional JSON persistence.
//!
//! Each key maps to a `OnceCell`, so concurrent requests for the same
//! (role, text) pair share a single computation. A failed computation leaves
//! the cell empty; only successful verdicts are ever cached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use adhera_core::{CacheKey, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub verdict: Verdict,
    pub created_at: DateTime<Utc>,
    /// Reasoning model that produced the verdict, kept for audit.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug)]
pub struct VerdictCache {
    slots: Mutex<HashMap<CacheKey, Arc<OnceCell<CacheEntry>>>>,
    path: Option<PathBuf>,
    model: Option<String>,
}

impl VerdictCache {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            path: None,
            model: None,
        }
    }

    /// Stamp new entries with the reasoning model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Open a cache backed by a JSON file. A missing file starts empty; a
    /// present one seeds the cache so identical cells cost nothing on re-runs.
    pub fn with_persistence(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let mut slots = HashMap::new();

        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let entries: HashMap<String, CacheEntry> =
                    serde_json::from_str(&raw).map_err(|source| CacheError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                let loaded = entries.len();
                for (digest, entry) in entries {
                    slots.insert(
                        CacheKey::from_digest(digest),
                        Arc::new(OnceCell::new_with(Some(entry))),
                    );
                }
                info!(path = %path.display(), entries = loaded, "verdict cache loaded");
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.clone(),
                    source,
                });
            }
        }

        Ok(Self {
            slots: Mutex::new(slots),
            path: Some(path),
            model: None,
        })
    }

    fn slot(&self, key: &CacheKey) -> Arc<OnceCell<CacheEntry>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(key.clone()).or_default().clone()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Verdict> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .get(key)
            .and_then(|cell| cell.get())
            .map(|entry| entry.verdict.clone())
    }

    /// Return the cached verdict for `key`, computing it at most once even
    /// under concurrent callers. An error from `compute` is returned to every
    /// waiter that ends up running it and leaves the slot empty.
    pub async fn get_or_try_compute<F, Fut, E>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<Verdict, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Verdict, E>>,
    {
        let slot = self.slot(key);
        let entry = slot
            .get_or_try_init(|| async {
                let verdict = compute().await?;
                Ok(CacheEntry {
                    verdict,
                    created_at: Utc::now(),
                    model: self.model.clone(),
                })
            })
            .await?;
        Ok(entry.verdict.clone())
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write all settled entries back to the backing file, if one is
    /// configured. Write-then-rename so a crash never truncates the cache.
    pub async fn persist(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let entries: HashMap<String, CacheEntry> = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots
                .iter()
                .filter_map(|(key, cell)| {
                    cell.get()
                        .map(|entry| (key.as_str().to_string(), entry.clone()))
                })
                .collect()
        };

        let json = serde_json::to_string_pretty(&entries).map_err(|source| CacheError::Parse {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| CacheError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), entries = entries.len(), "verdict cache persisted");
        Ok(())
    }
}

impl Default for VerdictCache {
    fn default() -> Self {
        Self::new()
    }
}
