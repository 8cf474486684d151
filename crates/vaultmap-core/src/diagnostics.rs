//! Per-run report of non-fatal conditions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DocumentParseError;
use crate::model::NodeId;

/// Upper bound on unresolved references kept verbatim in a report.
pub const MAX_UNRESOLVED_SAMPLES: usize = 50;

/// A document dropped from the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedDocument {
    pub path: PathBuf,
    pub reason: String,
    pub frontmatter_present: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    NotFound,
    /// More than one document matched by alias or file stem.
    Ambiguous,
}

/// A reference that did not become an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedLink {
    pub source_id: NodeId,
    pub target: String,
    pub reason: UnresolvedReason,
}

/// Non-fatal layout condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutWarning {
    /// Positions became non-finite; the seeded scatter was kept instead.
    Diverged { iteration: usize, nodes: usize },
}

/// Accumulated warnings and counts for one parse run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub documents_total: usize,
    pub documents_parsed: usize,
    pub excluded: Vec<ExcludedDocument>,
    /// Excluded documents that had frontmatter but no usable id.
    pub missing_id_with_frontmatter: usize,
    /// Changed files that parsed into nodes.
    pub changed_parsed: usize,
    /// Changed files that were excluded.
    pub changed_excluded: usize,
    pub references_total: usize,
    pub unresolved_links: usize,
    pub ambiguous_links: usize,
    pub self_references: usize,
    pub unresolved_samples: Vec<UnresolvedLink>,
    pub layout_warnings: Vec<LayoutWarning>,
    /// Positions came from a cached snapshot with the same fingerprint.
    pub layout_reused: bool,
}

impl Diagnostics {
    pub fn record_excluded(&mut self, path: PathBuf, error: &DocumentParseError, changed: bool) {
        let frontmatter_present = error.frontmatter_present();
        if frontmatter_present {
            self.missing_id_with_frontmatter += 1;
        }
        if changed {
            self.changed_excluded += 1;
        }
        self.excluded.push(ExcludedDocument {
            path,
            reason: error.to_string(),
            frontmatter_present,
        });
    }

    pub fn record_unresolved(&mut self, source_id: &NodeId, target: &str, reason: UnresolvedReason) {
        self.unresolved_links += 1;
        if reason == UnresolvedReason::Ambiguous {
            self.ambiguous_links += 1;
        }
        if self.unresolved_samples.len() < MAX_UNRESOLVED_SAMPLES {
            self.unresolved_samples.push(UnresolvedLink {
                source_id: source_id.clone(),
                target: target.to_string(),
                reason,
            });
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.excluded.is_empty() || self.unresolved_links > 0 || !self.layout_warnings.is_empty()
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} documents: {} parsed, {} excluded; {} references, {} unresolved ({} ambiguous)",
            self.documents_total,
            self.documents_parsed,
            self.excluded.len(),
            self.references_total,
            self.unresolved_links,
            self.ambiguous_links,
        );
        if self.layout_reused {
            out.push_str("; layout reused");
        }
        if !self.layout_warnings.is_empty() {
            out.push_str(&format!("; {} layout warnings", self.layout_warnings.len()));
        }
        out
    }
}
