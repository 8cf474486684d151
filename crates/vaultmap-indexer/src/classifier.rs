//! Classifier: priority-ordered, data-driven rules → node type

use std::collections::BTreeSet;

use vaultmap_core::{ClassificationConfig, ClassificationRule, MatcherKind, NodeType, Result};

use crate::extractor::ParsedDocument;

/// The attributes rules can match against.
#[derive(Debug, Clone, Copy)]
pub struct DocumentFacts<'a> {
    pub tags: &'a BTreeSet<String>,
    pub file_name: &'a str,
    /// Vault-relative path with `/` separators.
    pub path: &'a str,
}

/// Rules sorted once by (priority, declaration order); classification is a
/// linear scan for the first match.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
    default_type: NodeType,
}

impl Classifier {
    pub fn new(mut rules: Vec<ClassificationRule>, default_type: NodeType) -> Self {
        // sort_by_key is stable: equal priorities keep declaration order
        rules.sort_by_key(|rule| rule.priority);
        Self { rules, default_type }
    }

    pub fn from_config(config: &ClassificationConfig) -> Result<Self> {
        Ok(Self::new(config.rules()?, config.default_node_type()?))
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn default_type(&self) -> NodeType {
        self.default_type
    }

    pub fn matching_rule(&self, facts: DocumentFacts<'_>) -> Option<&ClassificationRule> {
        self.rules.iter().find(|rule| rule_matches(rule, facts))
    }

    pub fn classify(&self, facts: DocumentFacts<'_>) -> NodeType {
        self.matching_rule(facts)
            .map(|rule| rule.node_type)
            .unwrap_or(self.default_type)
    }

    pub fn classify_document(&self, doc: &ParsedDocument) -> NodeType {
        let path = doc.normalized_path();
        self.classify(DocumentFacts {
            tags: &doc.tags,
            file_name: doc.file_name(),
            path: &path,
        })
    }
}

/// Tags match case-insensitively, including nested children (`project`
/// matches `project/active`). Filename and path patterns are literal.
pub fn rule_matches(rule: &ClassificationRule, facts: DocumentFacts<'_>) -> bool {
    match rule.matcher_kind {
        MatcherKind::Tag => {
            let wanted = rule.pattern.trim().trim_start_matches('#').to_lowercase();
            !wanted.is_empty()
                && facts.tags.iter().any(|tag| {
                    tag == &wanted
                        || tag
                            .strip_prefix(wanted.as_str())
                            .is_some_and(|rest| rest.starts_with('/'))
                })
        }
        MatcherKind::FilenamePrefix => !rule.pattern.is_empty() && facts.file_name.starts_with(&rule.pattern),
        MatcherKind::PathContains => {
            let pattern = rule.pattern.replace('\\', "/");
            !pattern.is_empty() && facts.path.contains(&pattern)
        }
    }
}
