//! Deterministic cache keys for (semantic role, input text) pairs.
//!
//! Identical pairs must always map to the same key so a batch never pays for
//! the same reasoning query twice.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Hex-encoded sha-256 digest over the role and the normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(role: &str, text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(role.as_bytes());
        // Separator byte keeps ("ab", "c") and ("a", "bc") distinct.
        hasher.update([0u8]);
        hasher.update(normalize(text).as_bytes());

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Rebuild a key from a persisted digest string.
    pub fn from_digest(digest: String) -> Self {
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trim, collapse runs of unicode whitespace to single spaces, lowercase.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
