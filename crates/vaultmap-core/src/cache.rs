//! Result cache: the current graph + layout snapshot and a bounded history
//!
//! The current snapshot is a single `Arc` held in a `watch` channel. Swapping
//! it is one `send_replace`; readers clone the `Arc` and keep an immutable
//! handle for as long as they like. Snapshots are never mutated once cached.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::config::{CacheConfig, LayoutConfig};
use crate::diagnostics::Diagnostics;
use crate::fingerprint::Fingerprint;
use crate::graph::{Graph, GraphView};
use crate::model::{Edge, LayoutSnapshot, Node, RunId};

/// An immutable graph + layout produced by a completed run.
#[derive(Debug)]
pub struct Snapshot {
    pub run_id: RunId,
    pub fingerprint: Fingerprint,
    /// Layout parameters the positions were computed with.
    pub layout_params: LayoutConfig,
    pub graph: Graph,
    pub layout: LayoutSnapshot,
    pub diagnostics: Diagnostics,
    pub created_at: DateTime<Utc>,
    approx_bytes: u64,
}

/// A node together with its incident edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDetail {
    pub node: Node,
    pub outgoing: Vec<Edge>,
    pub incoming: Vec<Edge>,
}

impl Snapshot {
    pub fn new(
        fingerprint: Fingerprint,
        layout_params: LayoutConfig,
        graph: Graph,
        layout: LayoutSnapshot,
        diagnostics: Diagnostics,
    ) -> Self {
        let approx_bytes = estimate_bytes(&graph, &layout);
        Snapshot {
            run_id: layout.parse_run_id,
            created_at: layout.created_at,
            fingerprint,
            layout_params,
            graph,
            layout,
            diagnostics,
            approx_bytes,
        }
    }

    /// Approximate in-memory size, used for the cache's byte budget.
    pub fn approx_bytes(&self) -> u64 {
        self.approx_bytes
    }

    pub fn node(&self, id: &str) -> Option<NodeDetail> {
        let node = self.graph.node(id)?.clone();
        Some(NodeDetail {
            node,
            outgoing: self.graph.edges_from(id).cloned().collect(),
            incoming: self.graph.edges_to(id).cloned().collect(),
        })
    }

    pub fn view(&self) -> GraphView {
        self.graph.view()
    }

    /// Whether positions from this snapshot can stand in for a new layout.
    pub fn reusable_for(&self, fingerprint: &Fingerprint, layout_params: &LayoutConfig) -> bool {
        &self.fingerprint == fingerprint && &self.layout_params == layout_params
    }
}

fn estimate_bytes(graph: &Graph, layout: &LayoutSnapshot) -> u64 {
    let nodes: u64 = graph
        .all_nodes()
        .map(|n| bincode::serialized_size(n).unwrap_or(0))
        .sum();
    let edges: u64 = graph
        .all_edges()
        .map(|e| bincode::serialized_size(e).unwrap_or(0))
        .sum();
    let positions = bincode::serialized_size(&layout.positions).unwrap_or(0);
    nodes + edges + positions
}

/// Counters exposed for status pages and logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub current_run: Option<RunId>,
    pub history_len: usize,
    pub total_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct HistoryEntry {
    cached_at: Instant,
    snapshot: Arc<Snapshot>,
}

/// Holds the current snapshot plus a bounded, TTL- and byte-limited history.
pub struct ResultCache {
    current: watch::Sender<Option<Arc<Snapshot>>>,
    history: Mutex<VecDeque<HistoryEntry>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        let (current, _) = watch::channel(None);
        ResultCache {
            current,
            history: Mutex::new(VecDeque::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// The snapshot being served, captured at call time.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.borrow().clone()
    }

    /// Receive every swap of the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.current.subscribe()
    }

    /// Find a snapshot whose positions can be reused for this vault state.
    pub fn lookup(&self, fingerprint: &Fingerprint, layout_params: &LayoutConfig) -> Option<Arc<Snapshot>> {
        let found = self
            .current()
            .filter(|s| s.reusable_for(fingerprint, layout_params))
            .or_else(|| {
                let ttl = self.config.ttl();
                self.history()
                    .iter()
                    .filter(|entry| entry.cached_at.elapsed() < ttl)
                    .map(|entry| &entry.snapshot)
                    .find(|s| s.reusable_for(fingerprint, layout_params))
                    .cloned()
            });
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Make `snapshot` current. The previous one moves into history.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let previous = self.current.send_replace(Some(Arc::clone(&snapshot)));
        if let Some(previous) = previous {
            self.history().push_front(HistoryEntry {
                cached_at: Instant::now(),
                snapshot: previous,
            });
        }
        let evicted = self.evict();
        tracing::debug!(
            run_id = %snapshot.run_id,
            bytes = snapshot.approx_bytes(),
            evicted,
            "Cache snapshot replaced"
        );
        snapshot
    }

    /// Seed the cache with a snapshot when nothing is current yet.
    pub fn seed(&self, snapshot: Snapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        self.current.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(snapshot);
            true
        })
    }

    /// Drop expired and over-budget history. The current snapshot is never
    /// evicted; handles already given out stay valid.
    pub fn evict(&self) -> usize {
        let ttl = self.config.ttl();
        let current_bytes = self.current().map(|s| s.approx_bytes()).unwrap_or(0);
        let mut history = self.history();
        let before = history.len();

        history.retain(|entry| entry.cached_at.elapsed() < ttl);
        history.truncate(self.config.history_limit);
        let mut total: u64 = current_bytes + history.iter().map(|e| e.snapshot.approx_bytes()).sum::<u64>();
        while total > self.config.max_bytes {
            match history.pop_back() {
                Some(entry) => total -= entry.snapshot.approx_bytes(),
                None => break,
            }
        }

        let evicted = before - history.len();
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        let current = self.current();
        let history = self.history();
        CacheStats {
            current_run: current.as_ref().map(|s| s.run_id),
            history_len: history.len(),
            total_bytes: current.map(|s| s.approx_bytes()).unwrap_or(0)
                + history.iter().map(|e| e.snapshot.approx_bytes()).sum::<u64>(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn history(&self) -> std::sync::MutexGuard<'_, VecDeque<HistoryEntry>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::snapshot_with;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint(s.to_string())
    }

    #[test]
    fn replace_swaps_and_keeps_old_handles_valid() {
        let cache = ResultCache::default();
        assert!(cache.current().is_none());

        let first = cache.replace(snapshot_with(fp("one"), &["a", "b"]));
        let held = cache.current().unwrap();
        let second = cache.replace(snapshot_with(fp("two"), &["c"]));

        assert_eq!(cache.current().unwrap().run_id, second.run_id);
        assert_eq!(held.run_id, first.run_id);
        assert_eq!(held.graph.node_count(), 2);
        assert_eq!(cache.stats().history_len, 1);
    }

    #[test]
    fn lookup_matches_fingerprint_and_layout_params() {
        let cache = ResultCache::default();
        cache.replace(snapshot_with(fp("one"), &["a"]));
        cache.replace(snapshot_with(fp("two"), &["b"]));

        let params = LayoutConfig::default();
        assert!(cache.lookup(&fp("two"), &params).is_some());
        assert!(cache.lookup(&fp("one"), &params).is_some());
        assert!(cache.lookup(&fp("three"), &params).is_none());

        let other = LayoutConfig {
            seed: 1234,
            ..LayoutConfig::default()
        };
        assert!(cache.lookup(&fp("two"), &other).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn ttl_evicts_history_but_not_current() {
        let cache = ResultCache::new(CacheConfig {
            ttl_secs: 0,
            ..CacheConfig::default()
        });
        cache.replace(snapshot_with(fp("one"), &["a"]));
        cache.replace(snapshot_with(fp("two"), &["b"]));

        let stats = cache.stats();
        assert_eq!(stats.history_len, 0);
        assert_eq!(stats.evictions, 1);
        assert_eq!(cache.current().unwrap().fingerprint, fp("two"));
    }

    #[test]
    fn byte_budget_evicts_oldest_history_first() {
        let cache = ResultCache::new(CacheConfig {
            max_bytes: 1,
            history_limit: 10,
            ..CacheConfig::default()
        });
        for name in ["one", "two", "three"] {
            cache.replace(snapshot_with(fp(name), &["a", "b", "c"]));
        }
        assert_eq!(cache.stats().history_len, 0);
        assert_eq!(cache.current().unwrap().fingerprint, fp("three"));
    }

    #[test]
    fn history_is_bounded() {
        let cache = ResultCache::new(CacheConfig {
            history_limit: 2,
            ..CacheConfig::default()
        });
        for name in ["1", "2", "3", "4", "5"] {
            cache.replace(snapshot_with(fp(name), &["a"]));
        }
        assert_eq!(cache.stats().history_len, 2);
        assert!(cache.lookup(&fp("4"), &LayoutConfig::default()).is_some());
        assert!(cache.lookup(&fp("1"), &LayoutConfig::default()).is_none());
    }

    #[test]
    fn seed_only_fills_an_empty_cache() {
        let cache = ResultCache::default();
        assert!(cache.seed(snapshot_with(fp("disk"), &["a"])));
        assert!(!cache.seed(snapshot_with(fp("later"), &["b"])));
        assert_eq!(cache.current().unwrap().fingerprint, fp("disk"));
    }

    #[test]
    fn subscribers_see_swaps() {
        let cache = ResultCache::default();
        let mut rx = cache.subscribe();
        cache.replace(snapshot_with(fp("one"), &["a"]));
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone().unwrap();
        assert_eq!(seen.fingerprint, fp("one"));
    }

    #[test]
    fn node_detail_includes_incident_edges() {
        let snapshot = snapshot_with(fp("one"), &["a", "b", "c"]);
        let detail = snapshot.node("b").unwrap();
        assert_eq!(detail.node.id.as_str(), "b");
        assert_eq!(detail.incoming.len(), 1);
        assert_eq!(detail.outgoing.len(), 1);
        assert!(snapshot.node("zzz").is_none());
        assert!(snapshot.approx_bytes() > 0);
    }
}
