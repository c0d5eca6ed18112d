//! Loads guideline documents from plain-text files.

use std::path::{Path, PathBuf};

use adhera_core::Document;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("guideline directory not found: {0}")]
    DirNotFound(PathBuf),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not valid UTF-8")]
    NotUtf8(PathBuf),
}

/// Read every `.txt` file in `dir` into a document, sorted by file name so
/// ingestion order (and therefore passage ids) is stable across runs.
pub async fn load_documents(dir: impl AsRef<Path>) -> Result<Vec<Document>, SourceError> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|_| SourceError::DirNotFound(dir.to_path_buf()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path).await.map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| SourceError::NotUtf8(path.clone()))?;
        let source = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        documents.push(Document::new(source, text));
    }

    info!(dir = %dir.display(), documents = documents.len(), "loaded guideline files");
    Ok(documents)
}
