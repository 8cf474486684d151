//! Error taxonomy for vault ingestion

use std::path::PathBuf;

use thiserror::Error;

use crate::model::NodeId;

/// Result alias for fallible pipeline operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that stop a parse run (or a configuration load).
#[derive(Error, Debug)]
pub enum VaultError {
    /// Reading the vault file set failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The synchronization collaborator could not produce a file set.
    #[error("vault source error: {0}")]
    Source(String),

    /// Two documents claim the same frontmatter id.
    #[error("duplicate node id '{id}' in {first} and {second}")]
    DuplicateId {
        id: NodeId,
        first: PathBuf,
        second: PathBuf,
    },

    /// An edge referenced a node that is not in the graph.
    #[error("edge {source_id} -> {target_id} references a missing node")]
    DanglingEdge { source_id: NodeId, target_id: NodeId },

    /// Cooperative stop requested through the run's cancellation token.
    #[error("canceled")]
    Canceled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown node type '{0}'")]
    InvalidNodeType(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("layout error: {0}")]
    Layout(String),

    #[error("watch error: {0}")]
    Watch(String),

    /// A pipeline worker task panicked or was aborted.
    #[error("pipeline worker failed: {0}")]
    Worker(String),
}

impl VaultError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VaultError::Io {
            path: path.into(),
            source,
        }
    }

    /// Cancellation is a cooperative stop, not a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, VaultError::Canceled)
    }

    pub fn is_fatal(&self) -> bool {
        !self.is_cancellation()
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

/// Per-document failure. The document is excluded; the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentParseError {
    #[error("no frontmatter block")]
    MissingFrontmatter,

    #[error("frontmatter has no `id`")]
    MissingId,

    #[error("frontmatter `id` is empty or not a scalar")]
    InvalidId,

    #[error("invalid frontmatter: {0}")]
    InvalidFrontmatter(String),
}

impl DocumentParseError {
    /// True when a frontmatter block exists but failed on `id`.
    pub fn frontmatter_present(&self) -> bool {
        matches!(
            self,
            DocumentParseError::MissingId | DocumentParseError::InvalidId
        )
    }
}
