//! Link Extractor: markdown document → node attributes and raw references

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use vaultmap_core::{DocumentParseError, EdgeType, NodeId, content_hash};

use crate::frontmatter::{Frontmatter, split_frontmatter};
use crate::hashtags::extract_hashtags;
use crate::links::{RawReference, extract_references};
use crate::markdown::prose_lines;

/// Frontmatter keys lifted into dedicated fields instead of `metadata`.
const RESERVED_KEYS: &[&str] = &["id", "title", "tags", "tag"];

/// Everything the pipeline needs from one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedDocument {
    pub id: NodeId,
    /// Path relative to the vault root.
    pub path: PathBuf,
    pub title: String,
    pub tags: BTreeSet<String>,
    pub aliases: Vec<String>,
    pub metadata: BTreeMap<String, Value>,
    pub references: Vec<RawReference>,
    pub content_hash: String,
}

impl ParsedDocument {
    /// File name including extension, e.g. `~Hub.md`.
    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    }

    /// File name without extension.
    pub fn stem(&self) -> &str {
        self.path.file_stem().and_then(|n| n.to_str()).unwrap_or_default()
    }

    /// Path with `/` separators.
    pub fn normalized_path(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }

    pub fn links(&self) -> impl Iterator<Item = &RawReference> {
        self.references.iter().filter(|r| r.kind == EdgeType::Wikilink)
    }

    pub fn embeds(&self) -> impl Iterator<Item = &RawReference> {
        self.references.iter().filter(|r| r.kind == EdgeType::Embed)
    }
}

/// Extracts frontmatter, tags and references from markdown text.
#[derive(Debug, Clone)]
pub struct MarkdownExtractor {
    inline_hashtags: bool,
}

impl Default for MarkdownExtractor {
    fn default() -> Self {
        Self { inline_hashtags: true }
    }
}

impl MarkdownExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `#tags` in the body are merged with frontmatter tags.
    pub fn with_inline_hashtags(mut self, enabled: bool) -> Self {
        self.inline_hashtags = enabled;
        self
    }

    /// Parse one document. Fails when there is no frontmatter or no usable
    /// `id`; the caller records the exclusion and moves on.
    pub fn extract(&self, path: &Path, text: &str) -> Result<ParsedDocument, DocumentParseError> {
        let (yaml, body) = split_frontmatter(text).ok_or(DocumentParseError::MissingFrontmatter)?;
        let frontmatter = Frontmatter::parse(yaml)?;
        let id = NodeId::new(frontmatter.id()?);

        let consumed = text.len() - body.len();
        let first_line = text[..consumed].matches('\n').count() as u32 + 1;

        let mut tags = frontmatter.tags();
        if self.inline_hashtags {
            tags.extend(extract_hashtags(body));
        }

        let title = frontmatter
            .string("title")
            .or_else(|| first_heading(body))
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| id.to_string())
            });

        let metadata = frontmatter
            .fields
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(ParsedDocument {
            id,
            path: path.to_path_buf(),
            title,
            tags,
            aliases: frontmatter.aliases(),
            metadata,
            references: extract_references(body, first_line),
            content_hash: content_hash(text),
        })
    }
}

/// Text of the first `# ` heading outside code.
fn first_heading(body: &str) -> Option<String> {
    prose_lines(body, 1).find_map(|(_, line)| {
        let rest = line.trim_start().strip_prefix("# ")?;
        let title = rest.trim().trim_end_matches('#').trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}
