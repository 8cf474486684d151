//! Wikilink and embed scanning

use serde::{Deserialize, Serialize};
use vaultmap_core::EdgeType;

use crate::markdown::prose_lines;

/// A `[[target]]` or `![[target]]` occurrence before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReference {
    /// Normalized target: trimmed, `/` separators, no `.md` suffix.
    pub target: String,
    /// Heading or block anchor after `#`.
    pub anchor: Option<String>,
    /// Display text after `|`.
    pub alias: Option<String>,
    pub kind: EdgeType,
    /// 1-based line within the whole document.
    pub line: u32,
}

/// Scan `body` for wikilinks and embeds. Code blocks and inline code are
/// ignored, as are same-document anchors like `[[#heading]]`.
pub fn extract_references(body: &str, first_line: u32) -> Vec<RawReference> {
    let mut out = Vec::new();
    for (line_no, line) in prose_lines(body, first_line) {
        let bytes = line.as_bytes();
        let mut i = 0usize;
        while i + 1 < bytes.len() {
            if bytes[i] == b'[' && bytes[i + 1] == b'[' {
                let embed = i > 0 && bytes[i - 1] == b'!';
                let start = i + 2;
                if let Some(len) = line[start..].find("]]") {
                    let end = start + len;
                    if let Some((target, anchor, alias)) = parse_inner(&line[start..end]) {
                        out.push(RawReference {
                            target,
                            anchor,
                            alias,
                            kind: if embed { EdgeType::Embed } else { EdgeType::Wikilink },
                            line: line_no,
                        });
                    }
                    i = end + 2;
                    continue;
                }
            }
            i += 1;
        }
    }
    out
}

/// Split `target#anchor|alias`. `None` when no target remains.
pub fn parse_inner(inner: &str) -> Option<(String, Option<String>, Option<String>)> {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (left, alias) = match trimmed.split_once('|') {
        Some((left, alias)) => (left, Some(alias.trim()).filter(|s| !s.is_empty())),
        None => (trimmed, None),
    };
    let (target, anchor) = match left.split_once('#') {
        Some((target, anchor)) => (target, Some(anchor.trim()).filter(|s| !s.is_empty())),
        None => (left, None),
    };

    let target = normalize_target(target);
    if target.is_empty() {
        return None;
    }
    Some((target, anchor.map(str::to_string), alias.map(str::to_string)))
}

/// Trim, use `/` separators, drop a leading `./` and a markdown extension.
pub fn normalize_target(raw: &str) -> String {
    let mut target = raw.trim().replace('\\', "/");
    while let Some(rest) = target.strip_prefix("./") {
        target = rest.to_string();
    }
    for ext in [".md", ".markdown"] {
        let cut = target.len().saturating_sub(ext.len());
        if target.len() > ext.len()
            && target.is_char_boundary(cut)
            && target[cut..].eq_ignore_ascii_case(ext)
        {
            target.truncate(cut);
            break;
        }
    }
    target.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(body: &str) -> Vec<(String, EdgeType)> {
        extract_references(body, 1)
            .into_iter()
            .map(|r| (r.target, r.kind))
            .collect()
    }

    #[test]
    fn wikilinks_and_embeds() {
        let refs = extract_references("See [[B]] and ![[diagram.png]].\n\n[[Notes/C.md|see C]]", 5);
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].target, "B");
        assert_eq!(refs[0].kind, EdgeType::Wikilink);
        assert_eq!(refs[0].line, 5);
        assert_eq!(refs[1].target, "diagram.png");
        assert_eq!(refs[1].kind, EdgeType::Embed);
        assert_eq!(refs[2].target, "Notes/C");
        assert_eq!(refs[2].alias.as_deref(), Some("see C"));
        assert_eq!(refs[2].line, 7);
    }

    #[test]
    fn anchors_and_aliases() {
        let refs = extract_references("[[beta#Details|more]] [[gamma#^block]]", 1);
        assert_eq!(refs[0].target, "beta");
        assert_eq!(refs[0].anchor.as_deref(), Some("Details"));
        assert_eq!(refs[0].alias.as_deref(), Some("more"));
        assert_eq!(refs[1].anchor.as_deref(), Some("^block"));
    }

    #[test]
    fn skips_same_document_anchors_and_empty_links() {
        assert!(targets("[[#Heading]] [[ ]] [[|alias]]").is_empty());
    }

    #[test]
    fn ignores_code() {
        let body = "`[[not-a-link]]`\n```\n[[also-not]]\n```\n[[real]]";
        assert_eq!(targets(body), vec![("real".to_string(), EdgeType::Wikilink)]);
    }

    #[test]
    fn repeated_links_are_all_reported() {
        assert_eq!(targets("[[B]] [[B]]").len(), 2);
    }

    #[test]
    fn unclosed_link_is_ignored() {
        assert_eq!(targets("[[dangling and ]] on [[next line").len(), 1);
    }

    #[test]
    fn normalizes_targets() {
        assert_eq!(normalize_target(" ./notes\\alpha.MD "), "notes/alpha");
        assert_eq!(normalize_target("readme.markdown"), "readme");
        assert_eq!(normalize_target(".md"), ".md");
    }
}
