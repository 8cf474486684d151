//! vaultmap core: vault graph data model, result cache, configuration

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod model;
pub mod persist;
pub mod source;


#[cfg(test)]
pub mod test_utils;

pub use cache::{CacheStats, NodeDetail, ResultCache, Snapshot};
pub use config::{
    CacheConfig, CentralityConfig, ClassificationConfig, LayoutConfig, ParseConfig, VaultConfig, WatcherConfig,
};
pub use diagnostics::{Diagnostics, ExcludedDocument, LayoutWarning, UnresolvedLink, UnresolvedReason};
pub use error::{DocumentParseError, Result, VaultError};
pub use fingerprint::{Fingerprint, content_hash};
pub use graph::{EdgeInsert, Graph, GraphView};
pub use model::{
    ClassificationRule, Edge, EdgeId, EdgeType, LayoutSnapshot, MatcherKind, Node, NodeId, NodeType, ParseRun,
    Position, RunId, RunStatus, Trigger,
};
pub use persist::{CACHE_DIR, SNAPSHOT_FILE, cache_dir, clear_cache, load_snapshot, save_snapshot, snapshot_path};
pub use source::{ChangeNotification, MemoryVaultSource, SourceFile, VaultSource};
