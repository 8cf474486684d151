//! Inline `#tag` extraction from document bodies

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::markdown::prose_lines;

static RE_HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^a-zA-Z0-9_/-])#([a-zA-Z][a-zA-Z0-9_/-]*)").unwrap());
static RE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z][a-zA-Z0-9+.-]*://\S+").unwrap());
static RE_MARKDOWN_LINK_TARGET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\]\([^)]*\)").unwrap());
static RE_WIKILINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[[^\]]*\]\]").unwrap());

/// Lowercase hashtags found in prose. Code, URLs, link targets and
/// wikilink anchors are skipped. Tags must start with a letter; `/` nests.
pub fn extract_hashtags(body: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for (_, line) in prose_lines(body, 1) {
        if !line.contains('#') {
            continue;
        }
        let line = RE_URL.replace_all(&line, " ");
        let line = RE_MARKDOWN_LINK_TARGET.replace_all(&line, "]");
        let line = RE_WIKILINK.replace_all(&line, " ");
        for cap in RE_HASHTAG.captures_iter(&line) {
            if let Some(tag) = cap.get(1) {
                let tag = tag.as_str().trim_end_matches('/');
                tags.insert(tag.to_lowercase());
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(body: &str) -> Vec<String> {
        extract_hashtags(body).into_iter().collect()
    }

    #[test]
    fn basic_tags_are_lowercased() {
        assert_eq!(tags("A #Concept note with #multi-word and #Concept again"), ["concept", "multi-word"]);
    }

    #[test]
    fn headings_and_numbers_are_not_tags() {
        assert!(tags("# Heading\n## Another\nissue #123").is_empty());
    }

    #[test]
    fn nested_tags() {
        assert_eq!(tags("#project/active work"), ["project/active"]);
    }

    #[test]
    fn skips_code_urls_and_links() {
        let body = "`#inline`\n```\n#fenced\n```\nhttps://example.com/#anchor [x](#section) [[note#heading]] #real";
        assert_eq!(tags(body), ["real"]);
    }

    #[test]
    fn word_internal_hash_is_ignored() {
        assert!(tags("C# and issue#12 and a#b").is_empty());
    }
}
