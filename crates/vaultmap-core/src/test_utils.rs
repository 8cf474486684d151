//! Test utilities for vaultmap-core

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::cache::Snapshot;
use crate::config::LayoutConfig;
use crate::diagnostics::Diagnostics;
use crate::fingerprint::{Fingerprint, content_hash};
use crate::graph::Graph;
use crate::model::*;

/// A bare node with the given id and path.
pub fn node(id: &str, path: &str) -> Node {
    Node {
        id: NodeId::from(id),
        file_path: PathBuf::from(path),
        title: id.to_string(),
        node_type: NodeType::Note,
        tags: BTreeSet::new(),
        metadata: BTreeMap::new(),
        in_degree: 0,
        out_degree: 0,
        centrality: 0.0,
        position: Position::default(),
        content_hash: content_hash(id),
    }
}

/// A snapshot over a chain `ids[0] -> ids[1] -> ...` with positions on a line.
pub fn snapshot_with(fingerprint: Fingerprint, ids: &[&str]) -> Snapshot {
    let mut graph = Graph::new();
    for id in ids {
        graph.add_node(node(id, &format!("{id}.md"))).unwrap();
    }
    for pair in ids.windows(2) {
        graph
            .add_edge(Edge::new(pair[0].into(), pair[1].into(), EdgeType::Wikilink, 1.0))
            .unwrap();
    }
    graph.recompute_degrees();

    let positions = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (NodeId::from(*id), Position::new(i as f64 * 10.0, 0.5)))
        .collect();
    let layout = LayoutSnapshot::new(RunId::new(), positions);
    graph.apply_positions(&layout);

    Snapshot::new(
        fingerprint,
        LayoutConfig::default(),
        graph,
        layout,
        Diagnostics::default(),
    )
}

/// Create a temporary vault with a few interlinked documents
pub fn create_test_vault() -> TempDir {
    create_vault_with_structure(&[
        (
            "index.md",
            "---\nid: index\ntags: [index]\n---\n# Home\n\nStart at [[alpha]] or [[beta|the beta note]].\n",
        ),
        (
            "notes/alpha.md",
            "---\nid: alpha\n---\n# Alpha\n\nSee [[beta#details]] and ![[diagram]].\n",
        ),
        ("notes/beta.md", "---\nid: beta\ntags:\n  - concept\n---\nBack to [[index]].\n"),
        ("notes/draft.md", "No frontmatter here, links to [[alpha]].\n"),
    ])
}

/// Create a vault with a specific file structure
pub fn create_vault_with_structure(structure: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    for (path, content) in structure {
        let full_path = root.join(path);

        // Create parent directories if needed
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }

        fs::write(&full_path, content).unwrap();
    }

    temp_dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_vault() {
        let temp_dir = create_test_vault();
        let root = temp_dir.path();

        assert!(root.join("index.md").exists());
        assert!(root.join("notes/alpha.md").exists());
        assert!(root.join("notes/draft.md").exists());
    }

    #[test]
    fn snapshot_fixture_is_consistent() {
        let snapshot = snapshot_with(Fingerprint("f".into()), &["a", "b", "c"]);
        assert_eq!(snapshot.graph.edge_count(), 2);
        assert_eq!(snapshot.graph.node("c").unwrap().position, Position::new(20.0, 0.5));
    }
}
