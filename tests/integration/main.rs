//! Integration tests for vaultmap
//!
//! A vault on disk, read through the filesystem source, parsed by the
//! orchestrator and persisted between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use vaultmap_core::config::VaultSettings;
use vaultmap_core::{
    ChangeNotification, EdgeType, NodeType, ResultCache, RunStatus, Trigger, VaultConfig, load_snapshot,
    save_snapshot,
};
use vaultmap_pipeline::{ParseOrchestrator, StatusReport, WaitOutcome};
use vaultmap_watcher::FsVaultSource;

const TIMEOUT: Duration = Duration::from_secs(30);

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn create_vault() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "index.md",
        "---\nid: index\ntitle: Index\ntags: [moc]\n---\n# Index\n\nSee [[alpha]] and [[notes/beta|Beta]].\n",
    );
    write(
        root,
        "alpha.md",
        "---\nid: alpha\naliases: [First]\n---\nBack to [[index]]. Picture: ![[beta]]\n",
    );
    write(root, "notes/beta.md", "---\nid: beta\ntags: [draft]\n---\nLinks to [[First]] and [[nowhere]].\n");
    write(root, "loose.md", "No frontmatter here, links to [[alpha]].\n");
    write(root, "templates/daily.md", "---\nid: daily\n---\n[[index]]\n");
    dir
}

fn test_config() -> VaultConfig {
    let mut config = VaultConfig::default();
    config.layout.iterations = 60;
    config.parse.concurrency = 2;
    config
}

fn orchestrator(root: &Path, cache: Arc<ResultCache>) -> ParseOrchestrator {
    let config = test_config();
    let source = FsVaultSource::new(root, &VaultSettings::default()).unwrap();
    ParseOrchestrator::new(Arc::new(source), cache, &config).unwrap()
}

async fn finish(orchestrator: &ParseOrchestrator) -> StatusReport {
    match orchestrator.wait_for_parse(TIMEOUT).await {
        WaitOutcome::Finished(report) => report,
        WaitOutcome::TimedOut(report) => panic!("run did not finish: {report:?}"),
    }
}

#[tokio::test]
async fn parses_vault_from_disk() {
    let vault = create_vault();
    let cache = Arc::new(ResultCache::default());
    let orchestrator = orchestrator(vault.path(), cache.clone());

    assert!(orchestrator.trigger_parse(Trigger::Manual).is_accepted());
    let report = finish(&orchestrator).await;
    assert_eq!(report.state, RunStatus::Completed, "{:?}", report.error());

    let snapshot = cache.current().expect("snapshot cached");
    let graph = &snapshot.graph;
    assert_eq!(graph.node_count(), 3);
    assert!(!graph.contains("daily"), "excluded directory was parsed");

    assert!(graph.edge("index", "alpha", EdgeType::Wikilink).is_some());
    assert!(graph.edge("index", "beta", EdgeType::Wikilink).is_some());
    assert!(graph.edge("alpha", "beta", EdgeType::Embed).is_some());
    assert!(graph.edge("beta", "alpha", EdgeType::Wikilink).is_some());

    let index = graph.node("index").unwrap();
    assert_eq!(index.title, "Index");
    assert_eq!(index.node_type, NodeType::Index);
    assert_eq!(index.in_degree, 1);
    assert_eq!(index.out_degree, 2);

    let diag = &snapshot.diagnostics;
    assert_eq!(diag.documents_total, 4);
    assert_eq!(diag.documents_parsed, 3);
    assert_eq!(diag.excluded.len(), 1);
    assert_eq!(diag.excluded[0].path, PathBuf::from("loose.md"));
    assert_eq!(diag.unresolved_links, 1);
    assert!(!diag.layout_reused);

    for node in graph.all_nodes() {
        assert!(node.position.x.is_finite() && node.position.y.is_finite());
        assert!(node.centrality > 0.0 && node.centrality <= 1.0);
    }
}

#[tokio::test]
async fn warm_start_reuses_saved_layout() {
    let vault = create_vault();
    let first_cache = Arc::new(ResultCache::default());
    let first = orchestrator(vault.path(), first_cache.clone());
    first.trigger_parse(Trigger::Manual);
    assert_eq!(finish(&first).await.state, RunStatus::Completed);

    let saved = first_cache.current().unwrap();
    save_snapshot(&saved, vault.path()).unwrap();
    let loaded = load_snapshot(vault.path()).unwrap().expect("snapshot on disk");
    assert_eq!(loaded.fingerprint, saved.fingerprint);

    let second_cache = Arc::new(ResultCache::default());
    assert!(second_cache.seed(loaded));
    let second = orchestrator(vault.path(), second_cache.clone());
    second.trigger_parse(Trigger::Startup);
    assert_eq!(finish(&second).await.state, RunStatus::Completed);

    let reparsed = second_cache.current().unwrap();
    assert!(reparsed.diagnostics.layout_reused);
    assert_ne!(reparsed.run_id, saved.run_id);
    for node in saved.graph.all_nodes() {
        assert_eq!(reparsed.layout.position(node.id.as_str()), Some(node.position));
    }
}

#[tokio::test]
async fn change_notification_reparses_edited_vault() {
    let vault = create_vault();
    let cache = Arc::new(ResultCache::default());
    let orchestrator = orchestrator(vault.path(), cache.clone());
    let first = orchestrator.trigger_parse(Trigger::Startup).run_id();
    assert_eq!(finish(&orchestrator).await.state, RunStatus::Completed);
    let first_fingerprint = cache.current().unwrap().fingerprint.clone();

    write(vault.path(), "gamma.md", "---\nid: gamma\n---\nSee [[index]].\n");

    let (tx, rx) = mpsc::channel(8);
    let listener = orchestrator.listen(rx);
    tx.send(ChangeNotification::new(vec![PathBuf::from("gamma.md")])).await.unwrap();

    let mut status = orchestrator.subscribe_status();
    let report = tokio::time::timeout(
        TIMEOUT,
        status.wait_for(|r| r.run_id() != Some(first) && r.state.is_terminal()),
    )
    .await
    .expect("follow-up run finished")
    .unwrap()
    .clone();
    assert_eq!(report.state, RunStatus::Completed, "{:?}", report.error());
    assert_eq!(report.run.as_ref().unwrap().changed_file_count, 1);

    let snapshot = cache.current().unwrap();
    assert_ne!(snapshot.fingerprint, first_fingerprint);
    assert!(snapshot.graph.edge("gamma", "index", EdgeType::Wikilink).is_some());
    assert_eq!(snapshot.diagnostics.changed_parsed, 1);

    drop(tx);
    listener.await.unwrap();
}
