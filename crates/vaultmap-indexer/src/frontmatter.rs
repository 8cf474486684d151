//! YAML frontmatter extraction

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use vaultmap_core::DocumentParseError;

/// Split a document into `(yaml, body)`. `None` when there is no complete
/// `---` delimited block at the very top.
pub fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some((&text[yaml_start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parsed frontmatter as a key → JSON value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub fields: BTreeMap<String, Value>,
}

impl Frontmatter {
    pub fn parse(yaml: &str) -> Result<Self, DocumentParseError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| DocumentParseError::InvalidFrontmatter(e.to_string()))?;

        let mapping = match value {
            serde_yaml::Value::Null => return Ok(Frontmatter::default()),
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => {
                return Err(DocumentParseError::InvalidFrontmatter(
                    "expected a key/value mapping".to_string(),
                ));
            }
        };

        let mut fields = BTreeMap::new();
        for (key, value) in mapping {
            let key = match key {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                other => {
                    tracing::debug!("Skipping non-scalar frontmatter key {:?}", other);
                    continue;
                }
            };
            match serde_json::to_value(&value) {
                Ok(json) => {
                    fields.insert(key, json);
                }
                Err(e) => tracing::debug!("Skipping frontmatter field '{}': {}", key, e),
            }
        }
        Ok(Frontmatter { fields })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The required `id`. Numbers are accepted and stringified.
    pub fn id(&self) -> Result<String, DocumentParseError> {
        match self.get("id") {
            None | Some(Value::Null) => Err(DocumentParseError::MissingId),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(_) => Err(DocumentParseError::InvalidId),
        }
    }

    pub fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// A list field, written either as a YAML sequence or as a comma/space
    /// separated string.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        let items: Vec<String> = match self.get(key) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s
                .split(|c: char| c == ',' || c.is_whitespace())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Normalized tags: lowercase, no leading `#`.
    pub fn tags(&self) -> BTreeSet<String> {
        self.string_list("tags")
            .into_iter()
            .chain(self.string_list("tag"))
            .map(|t| normalize_tag(&t))
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn aliases(&self) -> Vec<String> {
        let mut aliases = self.string_list("aliases");
        if aliases.is_empty() {
            aliases = self.string_list("alias");
        }
        aliases
    }
}

/// Lowercase and strip leading `#`.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_leading_block_only() {
        let (yaml, body) = split_frontmatter("---\nid: a\n---\n# Body\n").unwrap();
        assert_eq!(yaml, "id: a\n");
        assert_eq!(body, "# Body\n");

        assert!(split_frontmatter("# Title\n---\nid: a\n---\n").is_none());
        assert!(split_frontmatter("---\nid: a\nno closing fence\n").is_none());

        let (yaml, body) = split_frontmatter("---\r\nid: a\r\n...\r\nrest").unwrap();
        assert_eq!(yaml, "id: a\r\n");
        assert_eq!(body, "rest");
    }

    #[test]
    fn id_variants() {
        let fm = Frontmatter::parse("id: 42").unwrap();
        assert_eq!(fm.id().unwrap(), "42");

        let fm = Frontmatter::parse("title: x").unwrap();
        assert_eq!(fm.id(), Err(DocumentParseError::MissingId));

        let fm = Frontmatter::parse("id: '  '").unwrap();
        assert_eq!(fm.id(), Err(DocumentParseError::InvalidId));

        let fm = Frontmatter::parse("id: [a, b]").unwrap();
        assert_eq!(fm.id(), Err(DocumentParseError::InvalidId));

        let fm = Frontmatter::parse("").unwrap();
        assert_eq!(fm.id(), Err(DocumentParseError::MissingId));
    }

    #[test]
    fn tags_and_aliases() {
        let fm = Frontmatter::parse("tags: [Index, '#Hub']\naliases: Home Base").unwrap();
        let tags: Vec<_> = fm.tags().into_iter().collect();
        assert_eq!(tags, ["hub", "index"]);
        assert_eq!(fm.aliases(), ["Home", "Base"]);

        let fm = Frontmatter::parse("tags: project/active, reading\nalias:\n  - Start Here").unwrap();
        let tags: Vec<_> = fm.tags().into_iter().collect();
        assert_eq!(tags, ["project/active", "reading"]);
        assert_eq!(fm.aliases(), ["Start Here"]);
    }

    #[test]
    fn non_mapping_is_invalid() {
        assert!(matches!(
            Frontmatter::parse("- just\n- a list"),
            Err(DocumentParseError::InvalidFrontmatter(_))
        ));
        assert!(matches!(
            Frontmatter::parse("id: [unclosed"),
            Err(DocumentParseError::InvalidFrontmatter(_))
        ));
    }
}
