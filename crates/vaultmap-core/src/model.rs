//! Core data structures for the vault graph

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VaultError;

/// Stable node identifier, taken verbatim from a document's frontmatter `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Edge identifier derived from the merged `(source, target, type)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(source: &NodeId, target: &NodeId, edge_type: EdgeType) -> Self {
        EdgeId(format!("{}->{}:{}", source, target, edge_type))
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed taxonomy every document is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry points and maps of content.
    Index,
    /// Documents that aggregate many links.
    Hub,
    Concept,
    /// External material: papers, books, articles.
    Source,
    Journal,
    Project,
    Person,
    /// Fallback for everything else.
    #[default]
    Note,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        NodeType::Index,
        NodeType::Hub,
        NodeType::Concept,
        NodeType::Source,
        NodeType::Journal,
        NodeType::Project,
        NodeType::Person,
        NodeType::Note,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Index => "index",
            NodeType::Hub => "hub",
            NodeType::Concept => "concept",
            NodeType::Source => "source",
            NodeType::Journal => "journal",
            NodeType::Project => "project",
            NodeType::Person => "person",
            NodeType::Note => "note",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| VaultError::InvalidNodeType(s.to_string()))
    }
}

/// What kind of reference produced an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// `[[target]]` inline reference.
    Wikilink,
    /// `![[target]]` transclusion.
    Embed,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Wikilink => "wikilink",
            EdgeType::Embed => "embed",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point in layout space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A single document in the vault graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub file_path: PathBuf,
    pub title: String,
    pub node_type: NodeType,
    pub tags: BTreeSet<String>,
    /// Frontmatter carried through as JSON values.
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub in_degree: u32,
    pub out_degree: u32,
    /// Normalized into [0, 1].
    pub centrality: f64,
    pub position: Position,
    /// SHA-256 hex digest of the raw document text.
    pub content_hash: String,
}

/// A directed, merged reference between two documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub edge_type: EdgeType,
    /// Number of references merged into this edge (1.0 each).
    pub weight: f64,
}

impl Edge {
    pub fn new(source_id: NodeId, target_id: NodeId, edge_type: EdgeType, weight: f64) -> Self {
        Edge {
            id: EdgeId::new(&source_id, &target_id, edge_type),
            source_id,
            target_id,
            edge_type,
            weight,
        }
    }
}

/// How a classification rule inspects a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    /// Document carries the tag (case-insensitive, leading `#` ignored).
    Tag,
    /// File name starts with the pattern.
    FilenamePrefix,
    /// Vault-relative path contains the pattern.
    PathContains,
}

/// A data-driven rule mapping documents to a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub name: String,
    /// Ascending: lower values take precedence.
    pub priority: i32,
    pub matcher_kind: MatcherKind,
    pub pattern: String,
    pub node_type: NodeType,
    /// Display metadata, opaque to classification.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size_multiplier: Option<f32>,
}

/// Unique identifier for a parse run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Orchestrator / parse-run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Pending or Running.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RunStatus::Pending | RunStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a parse run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Manual,
    Startup,
    /// Change notification from the synchronization collaborator.
    Change { paths: Vec<PathBuf> },
}

/// One execution of the ingestion-to-layout pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseRun {
    pub id: RunId,
    pub status: RunStatus,
    pub trigger: Trigger,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Distinct changed paths for change triggers; zero until the file set is
    /// read for manual and startup triggers, then the total document count.
    pub changed_file_count: usize,
}

impl ParseRun {
    /// A freshly accepted run.
    pub fn pending(trigger: Trigger) -> Self {
        let changed_file_count = match &trigger {
            Trigger::Change { paths } => paths.iter().collect::<BTreeSet<_>>().len(),
            Trigger::Manual | Trigger::Startup => 0,
        };
        ParseRun {
            id: RunId::new(),
            status: RunStatus::Pending,
            trigger,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
            changed_file_count,
        }
    }

    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}

/// Node positions produced by a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub parse_run_id: RunId,
    pub positions: BTreeMap<NodeId, Position>,
    pub created_at: DateTime<Utc>,
}

impl LayoutSnapshot {
    pub fn new(parse_run_id: RunId, positions: BTreeMap<NodeId, Position>) -> Self {
        LayoutSnapshot {
            parse_run_id,
            positions,
            created_at: Utc::now(),
        }
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }
}
