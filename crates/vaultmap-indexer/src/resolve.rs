//! Reference target → node id resolution

use std::collections::{BTreeSet, HashMap, HashSet};

use vaultmap_core::{NodeId, UnresolvedReason};

use crate::extractor::ParsedDocument;

type Lookup = HashMap<String, BTreeSet<NodeId>>;

/// Lookup tables built from one vault snapshot.
///
/// Order: exact id, then alias, then vault-relative path (targets with `/`),
/// then file stem. All but the id are case-insensitive. A fallback key that
/// names more than one document is ambiguous.
#[derive(Debug, Default)]
pub struct Resolver {
    ids: HashSet<NodeId>,
    aliases: Lookup,
    paths: Lookup,
    stems: Lookup,
}

impl Resolver {
    pub fn new<'a>(documents: impl IntoIterator<Item = &'a ParsedDocument>) -> Self {
        let mut resolver = Resolver::default();
        for doc in documents {
            resolver.ids.insert(doc.id.clone());
            for alias in &doc.aliases {
                insert(&mut resolver.aliases, alias, &doc.id);
            }
            let path = doc.normalized_path();
            let without_ext = path
                .rsplit_once('.')
                .filter(|(_, ext)| !ext.contains('/'))
                .map_or(path.as_str(), |(base, _)| base);
            insert(&mut resolver.paths, without_ext, &doc.id);
            insert(&mut resolver.stems, doc.stem(), &doc.id);
        }
        resolver
    }

    pub fn resolve(&self, target: &str) -> Result<NodeId, UnresolvedReason> {
        if let Some(id) = self.ids.get(target) {
            return Ok(id.clone());
        }

        let key = target.to_lowercase();
        let mut tables = vec![&self.aliases];
        if key.contains('/') {
            tables.push(&self.paths);
        }
        tables.push(&self.stems);

        for table in tables {
            if let Some(candidates) = table.get(&key) {
                let mut iter = candidates.iter();
                return match (iter.next(), iter.next()) {
                    (Some(id), None) => Ok(id.clone()),
                    _ => Err(UnresolvedReason::Ambiguous),
                };
            }
        }
        Err(UnresolvedReason::NotFound)
    }
}

fn insert(table: &mut Lookup, key: &str, id: &NodeId) {
    let key = key.trim().to_lowercase();
    if !key.is_empty() {
        table.entry(key).or_default().insert(id.clone());
    }
}
