//! vaultmap watcher: filesystem vault source and change notifications

pub mod fs_source;
pub mod watcher;

pub use fs_source::FsVaultSource;
pub use watcher::{FileWatcher, WatchEvent, WatcherService, is_markdown_file, should_ignore_path};
