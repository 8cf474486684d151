//! Parse Orchestrator: runs the ingestion-to-layout pipeline, one run at a time
//!
//! State lives behind a single mutex. Accepting a trigger, cancelling and
//! the final swap into the cache all happen under it, and every transition
//! is published on a `watch` channel that status queries and waiters read.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vaultmap_core::{
    Diagnostics, Fingerprint, LayoutConfig, LayoutSnapshot, NodeDetail, ParseRun, Result, ResultCache, RunId,
    RunStatus, Snapshot, SourceFile, Trigger, VaultConfig, VaultError, VaultSource,
};
use vaultmap_indexer::{Classifier, Coordinator, GraphBuilder, MarkdownExtractor};
use vaultmap_layout::LayoutEngine;

use crate::progress::{RunProgress, Stage, layout_update_due};

/// Answer to [`ParseOrchestrator::trigger_parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted(RunId),
    /// A run is Pending or Running; its id is returned instead of queuing.
    AlreadyInProgress(RunId),
}

impl TriggerOutcome {
    pub fn run_id(&self) -> RunId {
        match self {
            TriggerOutcome::Accepted(id) | TriggerOutcome::AlreadyInProgress(id) => *id,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, TriggerOutcome::Accepted(_))
    }
}

/// Answer to [`ParseOrchestrator::wait_for_parse`].
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// No run is in flight any more.
    Finished(StatusReport),
    TimedOut(StatusReport),
}

impl WaitOutcome {
    pub fn report(&self) -> &StatusReport {
        match self {
            WaitOutcome::Finished(r) | WaitOutcome::TimedOut(r) => r,
        }
    }
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub state: RunStatus,
    /// The latest run, in flight or terminal.
    pub run: Option<ParseRun>,
    pub progress: RunProgress,
    /// Diagnostics gathered by `run` once it is terminal, whether it
    /// completed or failed. `None` while in flight, or when the run failed
    /// before any document was parsed.
    pub diagnostics: Option<Diagnostics>,
}

impl StatusReport {
    pub fn run_id(&self) -> Option<RunId> {
        self.run.as_ref().map(|r| r.id)
    }

    pub fn error(&self) -> Option<&str> {
        self.run.as_ref().and_then(|r| r.error.as_deref())
    }
}

#[derive(Default)]
struct RunState {
    report: StatusReport,
    cancel: Option<CancellationToken>,
}

impl RunState {
    /// Apply `f` to the run with `run_id`, if it is still the latest one.
    fn with_run(&mut self, run_id: RunId, f: impl FnOnce(&mut ParseRun)) {
        if let Some(run) = self.report.run.as_mut().filter(|r| r.id == run_id) {
            f(run);
            self.report.state = run.status;
        }
    }
}

struct Shared {
    source: Arc<dyn VaultSource>,
    cache: Arc<ResultCache>,
    layout_config: LayoutConfig,
    coordinator: Coordinator,
    builder: GraphBuilder,
    layout: LayoutEngine,
    state: Mutex<RunState>,
    status_tx: watch::Sender<StatusReport>,
}

/// Coordinates parse runs against a vault source and a result cache.
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ParseOrchestrator {
    shared: Arc<Shared>,
}

impl ParseOrchestrator {
    pub fn new(source: Arc<dyn VaultSource>, cache: Arc<ResultCache>, config: &VaultConfig) -> Result<Self> {
        config.validate()?;
        let classifier = Classifier::from_config(&config.classification)?;
        let coordinator = Coordinator::new(MarkdownExtractor::new(), classifier, &config.parse)?;
        let (status_tx, _) = watch::channel(StatusReport::default());

        Ok(Self {
            shared: Arc::new(Shared {
                source,
                cache,
                layout_config: config.layout.clone(),
                coordinator,
                builder: GraphBuilder::new(config.centrality.clone()),
                layout: LayoutEngine::new(config.layout.clone()),
                state: Mutex::new(RunState::default()),
                status_tx,
            }),
        })
    }

    /// Start a run unless one is in flight. Must be called from within a
    /// tokio runtime; the run executes on a spawned task.
    pub fn trigger_parse(&self, trigger: Trigger) -> TriggerOutcome {
        let mut state = self.shared.state();
        if let Some(run) = state.report.run.as_ref().filter(|r| r.status.is_in_flight()) {
            debug!(run_id = %run.id, "parse already in progress");
            return TriggerOutcome::AlreadyInProgress(run.id);
        }

        let run = ParseRun::pending(trigger.clone());
        let run_id = run.id;
        let cancel = CancellationToken::new();
        info!(run_id = %run_id, changed = run.changed_file_count, "parse accepted");

        state.report.state = RunStatus::Pending;
        state.report.run = Some(run);
        state.report.progress = RunProgress::default();
        state.report.diagnostics = None;
        state.cancel = Some(cancel.clone());
        self.shared.status_tx.send_replace(state.report.clone());
        drop(state);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let worker = tokio::spawn(Arc::clone(&shared).execute(run_id, trigger, cancel));
            if let Err(e) = worker.await {
                shared.abandon(run_id, VaultError::Worker(e.to_string()));
            }
        });
        TriggerOutcome::Accepted(run_id)
    }

    /// Non-blocking status query.
    pub fn status(&self) -> StatusReport {
        self.shared.status_tx.borrow().clone()
    }

    /// Receive every status transition and progress update.
    pub fn subscribe_status(&self) -> watch::Receiver<StatusReport> {
        self.shared.status_tx.subscribe()
    }

    /// Ask the in-flight run to stop. It finishes its current document or
    /// iteration, then fails with "canceled". Returns the run's id, if any.
    pub fn cancel(&self) -> Option<RunId> {
        let state = self.shared.state();
        let run = state.report.run.as_ref().filter(|r| r.status.is_in_flight())?;
        let token = state.cancel.as_ref()?;
        token.cancel();
        info!(run_id = %run.id, "cancellation requested");
        Some(run.id)
    }

    /// Block until no run is in flight or `timeout` elapses. Never cancels.
    /// Returns immediately when nothing is in flight.
    pub async fn wait_for_parse(&self, timeout: Duration) -> WaitOutcome {
        let mut rx = self.subscribe_status();
        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|report| !report.state.is_in_flight())
                .await
                .map(|report| report.clone())
        })
        .await;

        match waited {
            Ok(Ok(report)) => WaitOutcome::Finished(report),
            Ok(Err(_)) => WaitOutcome::Finished(self.status()),
            Err(_) => WaitOutcome::TimedOut(self.status()),
        }
    }

    /// The graph + layout currently served, captured at call time.
    pub fn current_graph(&self) -> Option<Arc<Snapshot>> {
        self.shared.cache.current()
    }

    pub fn node(&self, id: &str) -> Option<NodeDetail> {
        self.current_graph()?.node(id)
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.shared.cache
    }
}

/// A run that ended without a snapshot, with the diagnostics it had gathered
/// by then.
struct RunFailure {
    error: VaultError,
    diagnostics: Option<Diagnostics>,
}

impl RunFailure {
    fn with_diagnostics(error: VaultError, diagnostics: Diagnostics) -> Self {
        RunFailure {
            error,
            diagnostics: Some(diagnostics),
        }
    }
}

impl From<VaultError> for RunFailure {
    fn from(error: VaultError) -> Self {
        RunFailure { error, diagnostics: None }
    }
}

type RunResult = std::result::Result<Snapshot, RunFailure>;

impl Shared {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut RunState)) {
        let mut state = self.state();
        f(&mut state);
        self.status_tx.send_replace(state.report.clone());
    }

    fn progress(&self, run_id: RunId, f: impl FnOnce(&mut RunProgress)) {
        self.update(|state| {
            if state.report.run_id() == Some(run_id) {
                f(&mut state.report.progress);
            }
        });
    }

    async fn execute(self: Arc<Self>, run_id: RunId, trigger: Trigger, cancel: CancellationToken) {
        self.update(|state| {
            state.with_run(run_id, ParseRun::start);
            state.report.progress.stage = Stage::ReadingFiles;
        });

        let outcome = self.run_stages(run_id, &trigger, &cancel).await;

        let mut state = self.state();
        let diagnostics = match outcome {
            Ok(snapshot) if !cancel.is_cancelled() => {
                let diagnostics = snapshot.diagnostics.clone();
                let snapshot = self.cache.replace(snapshot);
                info!(
                    run_id = %run_id,
                    nodes = snapshot.graph.node_count(),
                    edges = snapshot.graph.edge_count(),
                    fingerprint = snapshot.fingerprint.short(),
                    "{}",
                    diagnostics.summary()
                );
                state.with_run(run_id, ParseRun::complete);
                state.report.progress.stage = Stage::Finished;
                Some(diagnostics)
            }
            Ok(snapshot) => {
                info!(run_id = %run_id, "parse canceled");
                state.with_run(run_id, |run| run.fail(VaultError::Canceled.to_string()));
                Some(snapshot.diagnostics)
            }
            Err(RunFailure { error, diagnostics }) => {
                if error.is_cancellation() {
                    info!(run_id = %run_id, "parse canceled");
                } else {
                    error!(run_id = %run_id, error = %error, "parse failed; keeping previous snapshot");
                }
                state.with_run(run_id, |run| run.fail(error.to_string()));
                diagnostics
            }
        };
        if state.report.run_id() == Some(run_id) {
            state.report.diagnostics = diagnostics;
        }
        state.cancel = None;
        self.status_tx.send_replace(state.report.clone());
    }

    /// Fail a run whose task ended without reaching a terminal state.
    fn abandon(&self, run_id: RunId, error: VaultError) {
        error!(run_id = %run_id, error = %error, "parse worker stopped; failing run");
        self.update(|state| {
            if state.report.run.as_ref().is_some_and(|r| r.id == run_id && r.status.is_in_flight()) {
                state.with_run(run_id, |run| run.fail(error.to_string()));
                state.cancel = None;
            }
        });
    }

    async fn run_stages(self: &Arc<Self>, run_id: RunId, trigger: &Trigger, cancel: &CancellationToken) -> RunResult {
        let files = self.source.current_file_set().await?;
        if cancel.is_cancelled() {
            return Err(VaultError::Canceled.into());
        }

        let changed: Option<HashSet<PathBuf>> = match trigger {
            Trigger::Change { paths } => Some(paths.iter().cloned().collect()),
            Trigger::Manual | Trigger::Startup => None,
        };
        self.update(|state| {
            let total = files.len();
            if changed.is_none() {
                state.with_run(run_id, |run| run.changed_file_count = total);
            }
            if state.report.run_id() == Some(run_id) {
                state.report.progress.stage = Stage::Parsing;
                state.report.progress.documents_total = total;
            }
        });

        let fingerprint = Fingerprint::compute(files.iter().map(|f| (f.path.as_path(), f.content.as_str())));
        let cached = self.cache.lookup(&fingerprint, &self.layout_config);
        debug!(run_id = %run_id, fingerprint = fingerprint.short(), cache_hit = cached.is_some(), "file set read");

        let worker = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || worker.compute(run_id, files, changed, fingerprint, cached, &cancel))
            .await
            .map_err(|e| VaultError::Worker(e.to_string()))?
    }

    /// Parsing, graph building and layout. Runs on a blocking thread.
    fn compute(
        &self,
        run_id: RunId,
        files: Vec<SourceFile>,
        changed: Option<HashSet<PathBuf>>,
        fingerprint: Fingerprint,
        cached: Option<Arc<Snapshot>>,
        cancel: &CancellationToken,
    ) -> RunResult {
        let parsed = self.coordinator.parse_all(&files, changed.as_ref(), cancel, |done| {
            self.progress(run_id, |p| p.documents_processed = done)
        })?;
        drop(files);

        self.progress(run_id, |p| p.stage = Stage::Building);
        let mut diagnostics = parsed.diagnostics;
        let mut graph = match self.builder.build(&parsed.documents, &mut diagnostics, cancel) {
            Ok(graph) => graph,
            Err(error) => return Err(RunFailure::with_diagnostics(error, diagnostics)),
        };

        let reusable = cached.filter(|c| graph.all_nodes().all(|n| c.layout.positions.contains_key(&n.id)));
        let positions = match reusable {
            Some(previous) => {
                debug!(run_id = %run_id, from = %previous.run_id, "reusing cached layout");
                diagnostics.layout_reused = true;
                graph
                    .all_nodes()
                    .filter_map(|n| Some((n.id.clone(), previous.layout.position(n.id.as_str())?)))
                    .collect()
            }
            None => {
                let total = self.layout.config().iterations;
                self.progress(run_id, |p| {
                    p.stage = Stage::Layout;
                    p.layout_iterations_total = total;
                });
                let outcome = self.layout.run(&graph, cancel, |i| {
                    if layout_update_due(i, total) {
                        self.progress(run_id, |p| p.layout_iterations = i)
                    }
                });
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(error) => return Err(RunFailure::with_diagnostics(error, diagnostics)),
                };
                if !outcome.warnings.is_empty() {
                    warn!(run_id = %run_id, warnings = outcome.warnings.len(), "layout finished with warnings");
                }
                diagnostics.layout_warnings.extend(outcome.warnings);
                outcome.positions
            }
        };

        if cancel.is_cancelled() {
            return Err(RunFailure::with_diagnostics(VaultError::Canceled, diagnostics));
        }
        self.progress(run_id, |p| p.stage = Stage::Caching);
        let layout = LayoutSnapshot::new(run_id, positions);
        graph.apply_positions(&layout);
        Ok(Snapshot::new(fingerprint, self.layout_config.clone(), graph, layout, diagnostics))
    }
}
