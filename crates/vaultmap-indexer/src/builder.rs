//! Graph Builder: parse results → merged graph with degrees and centrality

use std::collections::{BTreeMap, HashMap};

use tokio_util::sync::CancellationToken;
use vaultmap_core::{
    CentralityConfig, Diagnostics, Edge, EdgeInsert, EdgeType, Graph, Node, NodeId, NodeType, Position, Result,
    VaultError,
};

use crate::centrality::weighted_pagerank;
use crate::extractor::ParsedDocument;
use crate::resolve::Resolver;

/// A parsed document with its assigned type.
#[derive(Debug, Clone)]
pub struct ClassifiedDocument {
    pub document: ParsedDocument,
    pub node_type: NodeType,
}

impl ClassifiedDocument {
    fn to_node(&self) -> Node {
        let doc = &self.document;
        Node {
            id: doc.id.clone(),
            file_path: doc.path.clone(),
            title: doc.title.clone(),
            node_type: self.node_type,
            tags: doc.tags.clone(),
            metadata: doc.metadata.clone(),
            in_degree: 0,
            out_degree: 0,
            centrality: 0.0,
            position: Position::default(),
            content_hash: doc.content_hash.clone(),
        }
    }
}

pub struct GraphBuilder {
    centrality: CentralityConfig,
}

impl GraphBuilder {
    pub fn new(centrality: CentralityConfig) -> Self {
        Self { centrality }
    }

    /// Build the whole graph from one vault snapshot. Duplicate ids abort;
    /// unresolved and self references are counted in `diagnostics`.
    pub fn build(
        &self,
        documents: &[ClassifiedDocument],
        diagnostics: &mut Diagnostics,
        cancel: &CancellationToken,
    ) -> Result<Graph> {
        let mut ordered: Vec<&ClassifiedDocument> = documents.iter().collect();
        ordered.sort_by(|a, b| a.document.id.cmp(&b.document.id));

        let mut graph = Graph::new();
        for doc in &ordered {
            graph.add_node(doc.to_node())?;
        }

        let resolver = Resolver::new(ordered.iter().map(|d| &d.document));
        let mut merged: BTreeMap<(NodeId, NodeId, EdgeType), f64> = BTreeMap::new();
        for doc in &ordered {
            if cancel.is_cancelled() {
                return Err(VaultError::Canceled);
            }
            let source = &doc.document.id;
            for reference in &doc.document.references {
                diagnostics.references_total += 1;
                match resolver.resolve(&reference.target) {
                    Ok(target) if &target == source => {
                        diagnostics.self_references += 1;
                    }
                    Ok(target) => {
                        *merged.entry((source.clone(), target, reference.kind)).or_default() += 1.0;
                    }
                    Err(reason) => {
                        tracing::debug!(source = %source, target = %reference.target, ?reason, "unresolved reference");
                        diagnostics.record_unresolved(source, &reference.target, reason);
                    }
                }
            }
        }

        for ((source, target, edge_type), weight) in merged {
            if graph.add_edge(Edge::new(source, target, edge_type, weight))? == EdgeInsert::RejectedSelfLoop {
                diagnostics.self_references += 1;
            }
        }
        graph.recompute_degrees();
        self.assign_centrality(&mut graph, cancel)?;

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            unresolved = diagnostics.unresolved_links,
            "graph built"
        );
        Ok(graph)
    }

    /// Recompute centrality for an existing graph.
    pub fn assign_centrality(&self, graph: &mut Graph, cancel: &CancellationToken) -> Result<()> {
        let ids: Vec<NodeId> = graph.all_nodes().map(|n| n.id.clone()).collect();
        let position: HashMap<&NodeId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let edges: Vec<(usize, usize, f64)> = graph
            .all_edges()
            .filter_map(|e| Some((*position.get(&e.source_id)?, *position.get(&e.target_id)?, e.weight)))
            .collect();

        let scores = weighted_pagerank(ids.len(), &edges, &self.centrality, cancel)?;
        for (id, score) in ids.iter().zip(scores) {
            if let Some(node) = graph.node_mut(id.as_str()) {
                node.centrality = score;
            }
        }
        Ok(())
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(CentralityConfig::default())
    }
}
