//! Content hashing for documents and whole vault states

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a document's raw text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash over an ordered document set; equal fingerprints mean an unchanged vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Fingerprint `(path, content)` pairs. Order-sensitive; callers pass the
    /// file set sorted by path.
    pub fn compute<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = (&'a Path, &'a str)>,
    {
        let mut hasher = Sha256::new();
        for (path, content) in files {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(content_hash(content).as_bytes());
            hasher.update([b'\n']);
        }
        Fingerprint(hex::encode(hasher.finalize()))
    }

    /// Abbreviated form for logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
