//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tokio::sync::mpsc;
use vaultmap_core::{ResultCache, RunId, RunStatus, Snapshot, Trigger, VaultConfig};
use vaultmap_pipeline::{ParseOrchestrator, StatusReport, WaitOutcome};
use vaultmap_watcher::{FsVaultSource, WatcherService};

/// How often `parse` logs progress while waiting on a run.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

fn load_config(root: &Path, config: Option<PathBuf>) -> anyhow::Result<VaultConfig> {
    let config = match config {
        Some(path) => VaultConfig::load(&path)?,
        None => VaultConfig::discover(root)?,
    };
    Ok(config.with_env_overrides()?)
}

/// Source, cache and orchestrator for a vault, with the cache seeded from
/// the snapshot saved by a previous run when one is readable.
fn open_vault(root: &Path, config: &VaultConfig) -> anyhow::Result<ParseOrchestrator> {
    let source = FsVaultSource::new(root, &config.vault)?;
    let cache = Arc::new(ResultCache::new(config.cache.clone()));

    match vaultmap_core::load_snapshot(root) {
        Ok(Some(snapshot)) => {
            tracing::info!(
                "Warm start from snapshot {} ({} nodes)",
                snapshot.fingerprint.short(),
                snapshot.graph.node_count()
            );
            cache.seed(snapshot);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring unreadable snapshot: {}", e),
    }

    Ok(ParseOrchestrator::new(Arc::new(source), cache, config)?)
}

async fn wait_until_finished(orchestrator: &ParseOrchestrator) -> StatusReport {
    loop {
        match orchestrator.wait_for_parse(PROGRESS_INTERVAL).await {
            WaitOutcome::Finished(report) => return report,
            WaitOutcome::TimedOut(report) => {
                let progress = &report.progress;
                tracing::info!(
                    "{:?}: {}/{} documents, {:.0}%",
                    progress.stage,
                    progress.documents_processed,
                    progress.documents_total,
                    progress.fraction() * 100.0
                );
            }
        }
    }
}

fn persist(snapshot: &Snapshot, root: &Path) {
    match vaultmap_core::save_snapshot(snapshot, root) {
        Ok(path) => tracing::debug!("Saved snapshot to {}", path.display()),
        Err(e) => tracing::warn!("Could not save snapshot: {}", e),
    }
}

/// Run one parse to completion and return the resulting snapshot.
async fn parse_once(root: &Path, orchestrator: &ParseOrchestrator) -> anyhow::Result<Arc<Snapshot>> {
    let run_id = orchestrator.trigger_parse(Trigger::Manual).run_id();
    tracing::info!("Parsing vault {} (run {})", root.display(), run_id);

    let report = wait_until_finished(orchestrator).await;
    match report.state {
        RunStatus::Completed => {}
        _ => anyhow::bail!("parse run {} failed: {}", run_id, report.error().unwrap_or("unknown error")),
    }

    let snapshot = orchestrator
        .current_graph()
        .context("completed run left no snapshot in the cache")?;
    tracing::info!(
        "Graph: {} nodes, {} edges",
        snapshot.graph.node_count(),
        snapshot.graph.edge_count()
    );
    tracing::info!("{}", snapshot.diagnostics.summary());
    persist(&snapshot, root);
    Ok(snapshot)
}

pub async fn parse(root: PathBuf, config: Option<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(&root, config)?;
    let orchestrator = open_vault(&root, &config)?;
    let snapshot = parse_once(&root, &orchestrator).await?;

    if let Some(output) = output {
        let document = json!({
            "run_id": snapshot.run_id,
            "fingerprint": snapshot.fingerprint,
            "graph": snapshot.view(),
            "diagnostics": snapshot.diagnostics,
        });
        let text = serde_json::to_string_pretty(&document)?;
        std::fs::write(&output, text).with_context(|| format!("writing {}", output.display()))?;
        tracing::info!("Wrote graph to {}", output.display());
    }
    Ok(())
}

pub async fn watch(root: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(&root, config)?;
    let orchestrator = open_vault(&root, &config)?;
    let mut status = orchestrator.subscribe_status();

    let mut watcher = WatcherService::new(&root, &config.watcher)?;
    watcher.start_watching()?;
    tracing::info!("Watching {}", root.display());

    let (tx, rx) = mpsc::channel(64);
    let listener = orchestrator.listen(rx);
    let watcher_task = tokio::spawn(watcher.process_events(tx));

    orchestrator.trigger_parse(Trigger::Startup);

    let mut last_saved: Option<RunId> = None;
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = status.borrow_and_update().clone();
                match report.state {
                    RunStatus::Completed if report.run_id() != last_saved => {
                        last_saved = report.run_id();
                        if let Some(snapshot) = orchestrator.current_graph() {
                            tracing::info!("{}", snapshot.diagnostics.summary());
                            persist(&snapshot, &root);
                        }
                    }
                    RunStatus::Failed => {
                        tracing::error!("Parse run failed: {}", report.error().unwrap_or("unknown error"));
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    orchestrator.cancel();
    watcher_task.abort();
    listener.abort();
    Ok(())
}

pub async fn show(root: PathBuf, config: Option<PathBuf>, id: String) -> anyhow::Result<()> {
    let snapshot = match vaultmap_core::load_snapshot(&root)? {
        Some(snapshot) => Arc::new(snapshot),
        None => {
            tracing::info!("No saved snapshot; parsing first");
            let config = load_config(&root, config)?;
            let orchestrator = open_vault(&root, &config)?;
            parse_once(&root, &orchestrator).await?
        }
    };

    let detail = snapshot
        .node(&id)
        .with_context(|| format!("no node with id '{}'", id))?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Clearing cache for: {}", root.display());

    vaultmap_core::clear_cache(&root)?;

    tracing::info!("Cache cleared");
    Ok(())
}
