//! On-disk copy of the last completed snapshot, used for warm starts

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Snapshot;
use crate::config::LayoutConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, VaultError};
use crate::fingerprint::Fingerprint;
use crate::graph::{Graph, GraphView};
use crate::model::LayoutSnapshot;

/// Cache directory: .vaultmap/
pub const CACHE_DIR: &str = ".vaultmap";

/// Snapshot file inside the cache directory
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Get cache directory path
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

/// Get snapshot file path
pub fn snapshot_path(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(SNAPSHOT_FILE)
}

/// Ensure cache directory exists
pub fn ensure_cache_dir(root: &Path) -> Result<()> {
    let cache = cache_dir(root);
    if !cache.exists() {
        std::fs::create_dir_all(&cache).map_err(|e| VaultError::io(&cache, e))?;
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSnapshot {
    version: String,
    fingerprint: Fingerprint,
    layout_params: LayoutConfig,
    graph: GraphView,
    layout: LayoutSnapshot,
    diagnostics: Diagnostics,
    saved_at: DateTime<Utc>,
}

/// Write the snapshot as JSON.
pub fn save_snapshot(snapshot: &Snapshot, root: &Path) -> Result<PathBuf> {
    ensure_cache_dir(root)?;
    let path = snapshot_path(root);

    let persisted = PersistedSnapshot {
        version: env!("CARGO_PKG_VERSION").to_string(),
        fingerprint: snapshot.fingerprint.clone(),
        layout_params: snapshot.layout_params.clone(),
        graph: snapshot.view(),
        layout: snapshot.layout.clone(),
        diagnostics: snapshot.diagnostics.clone(),
        saved_at: Utc::now(),
    };

    let json_str = serde_json::to_string_pretty(&persisted)?;
    std::fs::write(&path, json_str).map_err(|e| VaultError::io(&path, e))?;

    tracing::debug!("Snapshot saved: {}", path.display());
    Ok(path)
}

/// Load the persisted snapshot. Files written by another version are ignored.
pub fn load_snapshot(root: &Path) -> Result<Option<Snapshot>> {
    let path = snapshot_path(root);
    if !path.exists() {
        return Ok(None);
    }

    let json_str = std::fs::read_to_string(&path).map_err(|e| VaultError::io(&path, e))?;
    let persisted: PersistedSnapshot = serde_json::from_str(&json_str)?;
    if persisted.version != env!("CARGO_PKG_VERSION") {
        tracing::info!(
            "Ignoring snapshot from vaultmap {} at {}",
            persisted.version,
            path.display()
        );
        return Ok(None);
    }

    let graph = Graph::from_view(persisted.graph)?;
    tracing::debug!("Snapshot loaded from: {}", path.display());
    Ok(Some(Snapshot::new(
        persisted.fingerprint,
        persisted.layout_params,
        graph,
        persisted.layout,
        persisted.diagnostics,
    )))
}

/// Clear cache directory
pub fn clear_cache(root: &Path) -> Result<()> {
    let cache = cache_dir(root);
    if cache.exists() {
        std::fs::remove_dir_all(&cache).map_err(|e| VaultError::io(&cache, e))?;
    }
    Ok(())
}
