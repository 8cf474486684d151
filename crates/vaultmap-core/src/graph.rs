//! Graph wrapper using petgraph::StableDiGraph keyed by frontmatter NodeId

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::model::*;

/// Outcome of [`Graph::add_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Inserted,
    /// An edge with the same (source, target, type) existed; weights summed.
    Merged,
    RejectedSelfLoop,
}

/// The vault graph: a directed graph with at most one edge per
/// (source, target, type) triple and no self-loops.
#[derive(Clone)]
pub struct Graph {
    inner: StableDiGraph<Node, Edge>,
    index: HashMap<NodeId, NodeIndex>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

/// Flat, serializable form of a graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphView {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Register a node. A second node with the same id is an error.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if let Some(&existing) = self.index.get(&node.id) {
            let first = self.inner[existing].file_path.clone();
            return Err(VaultError::DuplicateId {
                id: node.id,
                first,
                second: node.file_path,
            });
        }
        let id = node.id.clone();
        let idx = self.inner.add_node(node);
        self.index.insert(id, idx);
        Ok(())
    }

    /// Add an edge, merging into an existing (source, target, type) edge by
    /// summing weight. Self-loops are rejected.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeInsert> {
        if edge.source_id == edge.target_id {
            tracing::debug!(node = %edge.source_id, "rejecting self-loop");
            return Ok(EdgeInsert::RejectedSelfLoop);
        }
        let (Some(&source), Some(&target)) = (
            self.index.get(&edge.source_id),
            self.index.get(&edge.target_id),
        ) else {
            return Err(VaultError::DanglingEdge {
                source_id: edge.source_id,
                target_id: edge.target_id,
            });
        };

        let existing = self
            .inner
            .edges_directed(source, Direction::Outgoing)
            .find(|e| e.target() == target && e.weight().edge_type == edge.edge_type)
            .map(|e| e.id());
        if let Some(eidx) = existing {
            self.inner[eidx].weight += edge.weight;
            return Ok(EdgeInsert::Merged);
        }

        self.inner.add_edge(source, target, edge);
        Ok(EdgeInsert::Inserted)
    }

    /// Get a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.inner[idx])
    }

    /// Get a mutable node by id.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let idx = *self.index.get(id)?;
        self.inner.node_weight_mut(idx)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Look up the merged edge for a triple.
    pub fn edge(&self, source: &str, target: &str, edge_type: EdgeType) -> Option<&Edge> {
        self.edges_from(source)
            .find(|e| e.target_id.as_str() == target && e.edge_type == edge_type)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of merged edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes in insertion order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges in insertion order.
    pub fn all_edges(&self) -> impl Iterator<Item = &Edge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// Get all outgoing edges from a node.
    pub fn edges_from(&self, source: &str) -> impl Iterator<Item = &Edge> {
        self.directed(source, Direction::Outgoing)
    }

    /// Get all incoming edges to a node.
    pub fn edges_to(&self, target: &str) -> impl Iterator<Item = &Edge> {
        self.directed(target, Direction::Incoming)
    }

    fn directed(&self, id: &str, dir: Direction) -> impl Iterator<Item = &Edge> {
        self.index
            .get(id)
            .into_iter()
            .flat_map(move |&idx| self.inner.edges_directed(idx, dir))
            .map(|edge_ref| edge_ref.weight())
    }

    /// Recount in/out degree from the merged edges.
    pub fn recompute_degrees(&mut self) {
        let mut degrees: HashMap<NodeIndex, (u32, u32)> = HashMap::new();
        for eidx in self.inner.edge_indices() {
            if let Some((source, target)) = self.inner.edge_endpoints(eidx) {
                degrees.entry(source).or_default().1 += 1;
                degrees.entry(target).or_default().0 += 1;
            }
        }
        for idx in self.inner.node_indices().collect::<Vec<_>>() {
            let (in_degree, out_degree) = degrees.get(&idx).copied().unwrap_or_default();
            let node = &mut self.inner[idx];
            node.in_degree = in_degree;
            node.out_degree = out_degree;
        }
    }

    /// Copy positions onto nodes. Returns the number of nodes without one.
    pub fn apply_positions(&mut self, layout: &LayoutSnapshot) -> usize {
        let mut missing = 0;
        for idx in self.inner.node_indices().collect::<Vec<_>>() {
            let node = &mut self.inner[idx];
            match layout.position(node.id.as_str()) {
                Some(p) => node.position = p,
                None => missing += 1,
            }
        }
        missing
    }

    /// Flatten into a serializable view.
    pub fn view(&self) -> GraphView {
        GraphView {
            nodes: self.all_nodes().cloned().collect(),
            edges: self.all_edges().cloned().collect(),
        }
    }

    /// Rebuild a graph from a view, re-checking every invariant.
    pub fn from_view(view: GraphView) -> Result<Self> {
        let mut graph = Graph::new();
        for node in view.nodes {
            graph.add_node(node)?;
        }
        for edge in view.edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::node;

    #[test]
    fn duplicate_id_is_rejected() {
        let mut graph = Graph::new();
        graph.add_node(node("a", "a.md")).unwrap();
        let err = graph.add_node(node("a", "other/a.md")).unwrap_err();
        match err {
            VaultError::DuplicateId { id, first, second } => {
                assert_eq!(id.as_str(), "a");
                assert_eq!(first.to_str(), Some("a.md"));
                assert_eq!(second.to_str(), Some("other/a.md"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn repeated_edges_merge_weight() {
        let mut graph = Graph::new();
        graph.add_node(node("a", "a.md")).unwrap();
        graph.add_node(node("b", "b.md")).unwrap();

        let first = graph
            .add_edge(Edge::new("a".into(), "b".into(), EdgeType::Wikilink, 1.0))
            .unwrap();
        let second = graph
            .add_edge(Edge::new("a".into(), "b".into(), EdgeType::Wikilink, 1.0))
            .unwrap();
        let embed = graph
            .add_edge(Edge::new("a".into(), "b".into(), EdgeType::Embed, 1.0))
            .unwrap();

        assert_eq!(first, EdgeInsert::Inserted);
        assert_eq!(second, EdgeInsert::Merged);
        assert_eq!(embed, EdgeInsert::Inserted);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edge("a", "b", EdgeType::Wikilink).unwrap().weight, 2.0);
    }

    #[test]
    fn self_loops_and_dangling_edges() {
        let mut graph = Graph::new();
        graph.add_node(node("a", "a.md")).unwrap();

        let outcome = graph
            .add_edge(Edge::new("a".into(), "a".into(), EdgeType::Wikilink, 1.0))
            .unwrap();
        assert_eq!(outcome, EdgeInsert::RejectedSelfLoop);
        assert_eq!(graph.edge_count(), 0);

        let err = graph
            .add_edge(Edge::new("a".into(), "ghost".into(), EdgeType::Wikilink, 1.0))
            .unwrap_err();
        assert!(matches!(err, VaultError::DanglingEdge { .. }));
    }

    #[test]
    fn degrees_follow_merged_edges() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(node(id, &format!("{id}.md"))).unwrap();
        }
        for (s, t) in [("a", "b"), ("a", "b"), ("a", "c"), ("c", "b")] {
            graph
                .add_edge(Edge::new(s.into(), t.into(), EdgeType::Wikilink, 1.0))
                .unwrap();
        }
        graph.recompute_degrees();

        assert_eq!(graph.node("a").unwrap().out_degree, 2);
        assert_eq!(graph.node("b").unwrap().in_degree, 2);
        assert_eq!(graph.node("c").unwrap().in_degree, 1);
        assert_eq!(graph.node("c").unwrap().out_degree, 1);

        let out: u32 = graph.all_nodes().map(|n| n.out_degree).sum();
        let inc: u32 = graph.all_nodes().map(|n| n.in_degree).sum();
        assert_eq!(out as usize, graph.edge_count());
        assert_eq!(inc as usize, graph.edge_count());
    }

    #[test]
    fn view_round_trip_preserves_edges() {
        let mut graph = Graph::new();
        graph.add_node(node("a", "a.md")).unwrap();
        graph.add_node(node("b", "b.md")).unwrap();
        graph
            .add_edge(Edge::new("a".into(), "b".into(), EdgeType::Embed, 3.0))
            .unwrap();

        let rebuilt = Graph::from_view(graph.view()).unwrap();
        assert_eq!(rebuilt.node_count(), 2);
        assert_eq!(rebuilt.edge("a", "b", EdgeType::Embed).unwrap().weight, 3.0);
        assert_eq!(rebuilt.edges_to("b").count(), 1);
    }
}
