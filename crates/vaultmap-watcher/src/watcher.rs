//! Filesystem watcher emitting debounced vault change notifications

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vaultmap_core::{ChangeNotification, Result, VaultError, WatcherConfig};

/// Directories whose contents never affect the graph.
pub const IGNORED_DIRS: &[&str] = &[".git", ".obsidian", ".vaultmap", ".trash", "node_modules"];

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(p) | WatchEvent::Modified(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// Thin wrapper over the platform watcher that forwards markdown events.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root path
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                debug!("File system event: {:?}", event);
                Self::handle_notify_event(event, &event_tx);
            }
            Err(e) => {
                error!("File system watch error: {}", e);
            }
        })
        .map_err(|e| VaultError::Watch(e.to_string()))?;

        Ok(Self {
            watcher,
            event_rx,
            root_path,
        })
    }

    fn handle_notify_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let make: fn(PathBuf) -> WatchEvent = match event.kind {
            notify::EventKind::Create(_) => WatchEvent::Created,
            notify::EventKind::Modify(_) => WatchEvent::Modified,
            notify::EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };
        for path in event.paths {
            if should_ignore_path(&path) || !is_markdown_file(&path) {
                continue;
            }
            if let Err(e) = event_tx.send(make(path)) {
                warn!("Failed to forward watch event: {}", e);
            }
        }
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Watching directory: {}", path.display());

        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| VaultError::Watch(format!("{}: {e}", path.display())))
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

/// Watches a vault and turns bursts of file events into one
/// [`ChangeNotification`] each, with paths relative to the vault root.
pub struct WatcherService {
    watcher: FileWatcher,
    debounce: Duration,
}

impl WatcherService {
    pub fn new(root_path: impl AsRef<Path>, config: &WatcherConfig) -> Result<Self> {
        Ok(Self {
            watcher: FileWatcher::new(root_path)?,
            debounce: config.debounce(),
        })
    }

    /// Start watching the vault root
    pub fn start_watching(&mut self) -> Result<()> {
        let root = self.watcher.root_path().to_path_buf();
        self.watcher.watch_directory(&root)
    }

    /// Forward debounced notifications until the receiver side is dropped.
    pub async fn process_events(mut self, tx: mpsc::Sender<ChangeNotification>) {
        let root = self.watcher.root_path().to_path_buf();
        let canonical_root = root.canonicalize().ok();
        let relativize = move |path: &Path| -> PathBuf {
            path.strip_prefix(&root)
                .ok()
                .or_else(|| canonical_root.as_deref().and_then(|r| path.strip_prefix(r).ok()))
                .unwrap_or(path)
                .to_path_buf()
        };

        while let Some(notification) = next_batch(self.watcher.event_receiver(), self.debounce, &relativize).await {
            info!(paths = notification.paths.len(), "vault changed");
            if tx.send(notification).await.is_err() {
                debug!("Change listener closed; stopping watcher");
                break;
            }
        }
    }
}

/// Wait for an event, then keep collecting until the channel has been quiet
/// for `window`. Returns `None` once the event stream ends with nothing pending.
pub async fn next_batch(
    rx: &mut mpsc::UnboundedReceiver<WatchEvent>,
    window: Duration,
    relativize: &impl Fn(&Path) -> PathBuf,
) -> Option<ChangeNotification> {
    let first = rx.recv().await?;
    let mut paths = BTreeSet::new();
    paths.insert(relativize(first.path()));

    while let Ok(Some(event)) = tokio::time::timeout(window, rx.recv()).await {
        paths.insert(relativize(event.path()));
    }
    Some(ChangeNotification::new(paths.into_iter().collect()))
}

pub fn is_markdown_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("md") | Some("markdown")
    )
}

/// Check if a path should be ignored (e.g., .git/, .obsidian/, etc.)
pub fn should_ignore_path(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity(path: &Path) -> PathBuf {
        path.to_path_buf()
    }

    #[tokio::test]
    async fn test_file_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(temp_dir.path()).unwrap();
        watcher.watch_directory(temp_dir.path()).unwrap();
        assert_eq!(watcher.root_path(), temp_dir.path());
        assert!(watcher.watch_directory(temp_dir.path().join("missing")).is_err());
    }

    #[tokio::test]
    async fn burst_becomes_one_notification() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(WatchEvent::Modified("b.md".into())).unwrap();
        tx.send(WatchEvent::Created("a.md".into())).unwrap();
        tx.send(WatchEvent::Modified("b.md".into())).unwrap();

        let batch = next_batch(&mut rx, Duration::from_millis(50), &identity).await.unwrap();
        assert_eq!(batch.paths, vec![PathBuf::from("a.md"), PathBuf::from("b.md")]);

        drop(tx);
        assert!(next_batch(&mut rx, Duration::from_millis(50), &identity).await.is_none());
    }

    #[tokio::test]
    async fn relativizes_paths() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(WatchEvent::Removed("/vault/notes/a.md".into())).unwrap();
        let root = PathBuf::from("/vault");
        let relativize = |p: &Path| p.strip_prefix(&root).unwrap_or(p).to_path_buf();

        let batch = next_batch(&mut rx, Duration::from_millis(10), &relativize).await.unwrap();
        assert_eq!(batch.paths, vec![PathBuf::from("notes/a.md")]);
    }

    #[test]
    fn filters() {
        assert!(is_markdown_file(Path::new("notes/a.md")));
        assert!(is_markdown_file(Path::new("README.MARKDOWN")));
        assert!(!is_markdown_file(Path::new("image.png")));
        assert!(should_ignore_path(Path::new("/vault/.obsidian/workspace.md")));
        assert!(should_ignore_path(Path::new("vault/.vaultmap/snapshot.md")));
        assert!(!should_ignore_path(Path::new("vault/notes/a.md")));
    }
}
