//! Vault source backed by a directory on disk

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use vaultmap_core::config::VaultSettings;
use vaultmap_core::{Result, SourceFile, VaultError, VaultSource};

use crate::watcher::should_ignore_path;

/// Walks the vault root, honouring `.gitignore` and skipping hidden entries.
#[derive(Debug, Clone)]
pub struct FsVaultSource {
    root: PathBuf,
    extensions: Vec<String>,
    exclude: GlobSet,
}

impl FsVaultSource {
    pub fn new(root: impl Into<PathBuf>, settings: &VaultSettings) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &settings.exclude {
            let glob = Glob::new(pattern)
                .map_err(|e| VaultError::Config(format!("invalid exclude pattern '{pattern}': {e}")))?;
            builder.add(glob);
        }
        let exclude = builder
            .build()
            .map_err(|e| VaultError::Config(format!("exclude globset build failed: {e}")))?;

        Ok(Self {
            root: root.into(),
            extensions: settings.extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect(),
            exclude,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_document(&self, relative: &Path) -> bool {
        let ext_ok = relative
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
        ext_ok && !self.exclude.is_match(relative) && !should_ignore_path(relative)
    }

    /// Blocking walk; sorted by relative path.
    pub fn scan(&self) -> Result<Vec<SourceFile>> {
        if !self.root.is_dir() {
            return Err(VaultError::io(
                &self.root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "vault root is not a directory"),
            ));
        }

        let mut files = Vec::new();
        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .require_git(false)
            .follow_links(false)
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| VaultError::Source(e.to_string()))?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            if !self.is_document(relative) {
                continue;
            }

            let bytes = std::fs::read(path).map_err(|e| VaultError::io(path, e))?;
            match String::from_utf8(bytes) {
                Ok(content) => files.push(SourceFile::new(relative, content)),
                Err(_) => tracing::warn!(path = %relative.display(), "skipping document that is not valid UTF-8"),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(root = %self.root.display(), files = files.len(), "vault scanned");
        Ok(files)
    }
}

#[async_trait]
impl VaultSource for FsVaultSource {
    async fn current_file_set(&self) -> Result<Vec<SourceFile>> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.scan())
            .await
            .map_err(|e| VaultError::Source(format!("vault scan task failed: {e}")))?
    }
}
