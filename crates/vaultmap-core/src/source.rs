//! Interface to the synchronization collaborator that owns the vault files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{Result, VaultError};

/// One document as handed over by the vault source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the vault root.
    pub path: PathBuf,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        SourceFile {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Changed file paths reported by the synchronization collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeNotification {
    pub paths: Vec<PathBuf>,
}

impl ChangeNotification {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        ChangeNotification { paths }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// "Give me the current file set."
#[async_trait]
pub trait VaultSource: Send + Sync {
    /// All documents, ordered by path.
    async fn current_file_set(&self) -> Result<Vec<SourceFile>>;
}

/// Vault held in memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryVaultSource {
    files: RwLock<BTreeMap<PathBuf, String>>,
    failure: RwLock<Option<String>>,
}

impl MemoryVaultSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<PathBuf>,
        C: Into<String>,
    {
        let source = Self::new();
        for (path, content) in files {
            source.insert(path, content);
        }
        source
    }

    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &Path) -> Option<String> {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
    }

    /// Make subsequent reads fail with an I/O error until cleared.
    pub fn set_failure(&self, message: Option<String>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = message;
    }
}

#[async_trait]
impl VaultSource for MemoryVaultSource {
    async fn current_file_set(&self) -> Result<Vec<SourceFile>> {
        if let Some(message) = self.failure.read().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(VaultError::io("<memory>", std::io::Error::other(message)));
        }
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        Ok(files
            .iter()
            .map(|(path, content)| SourceFile::new(path.clone(), content.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_orders_by_path() {
        let source = MemoryVaultSource::with_files([("b.md", "B"), ("a.md", "A")]);
        let files = tokio_test::block_on(source.current_file_set()).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.to_str().unwrap()).collect();
        assert_eq!(paths, ["a.md", "b.md"]);
    }

    #[test]
    fn memory_source_failure_is_io_error() {
        let source = MemoryVaultSource::with_files([("a.md", "A")]);
        source.set_failure(Some("disk gone".to_string()));
        let err = tokio_test::block_on(source.current_file_set()).unwrap_err();
        assert!(matches!(err, VaultError::Io { .. }));

        source.set_failure(None);
        assert_eq!(tokio_test::block_on(source.current_file_set()).unwrap().len(), 1);
    }
}
