//! Turns change notifications into parse triggers

use std::collections::BTreeSet;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vaultmap_core::{ChangeNotification, Trigger};

use crate::orchestrator::{ParseOrchestrator, TriggerOutcome};

impl ParseOrchestrator {
    /// Trigger a run for every notification received on `rx`.
    ///
    /// The orchestrator rejects triggers while a run is in flight, so paths
    /// arriving meanwhile are collected and issued as one follow-up trigger
    /// once that run reaches a terminal state. The task ends when `rx` closes
    /// and nothing is pending.
    pub fn listen(&self, mut rx: mpsc::Receiver<ChangeNotification>) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let mut status = orchestrator.subscribe_status();
            let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
            let mut closed = false;

            loop {
                if !pending.is_empty() {
                    let paths: Vec<PathBuf> = pending.iter().cloned().collect();
                    match orchestrator.trigger_parse(Trigger::Change { paths }) {
                        TriggerOutcome::Accepted(run_id) => {
                            debug!(run_id = %run_id, paths = pending.len(), "change trigger accepted");
                            pending.clear();
                        }
                        TriggerOutcome::AlreadyInProgress(run_id) => {
                            debug!(run_id = %run_id, paths = pending.len(), "run in flight; coalescing changes");
                        }
                    }
                }

                let waiting = !pending.is_empty();
                if closed && !waiting {
                    break;
                }

                tokio::select! {
                    notification = rx.recv(), if !closed => match notification {
                        Some(notification) if notification.is_empty() => {}
                        Some(notification) => pending.extend(notification.paths),
                        None => closed = true,
                    },
                    finished = async { status.wait_for(|report| !report.state.is_in_flight()).await.map(|_| ()) }, if waiting => {
                        if finished.is_err() {
                            break;
                        }
                    }
                }
            }
            info!("change listener stopped");
        })
    }
}
