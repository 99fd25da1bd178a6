//! Name search and per-entity summaries.
//!
//! These back the lookup side of the product (pick a seed by name, show its
//! details card) and are not used by the expansion engine itself.

use crate::{OwnershipDB, ATTR_JURISDICTION, ATTR_NAME, ATTR_STATUS, REL_OWNS};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

const MIN_QUERY_CHARS: usize = 2;
const MAX_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub kind: String,
}

/// Details card for one entity, with direct ownership fan-in/fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: String,
    pub name: Option<String>,
    pub kind: String,
    pub jurisdiction: Option<String>,
    pub status: Option<String>,
    /// Distinct entities this one owns directly.
    pub direct_subsidiaries: u64,
    /// Distinct entities owning this one directly.
    pub direct_owners: u64,
}

impl OwnershipDB {
    /// Case-insensitive substring search over entity names.
    ///
    /// Ordering: names starting with the query first, then shorter names,
    /// then alphabetical; ties break by id. `limit` is clamped to `[1, 100]`
    /// and queries shorter than two characters match nothing.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let needle = query.trim().to_lowercase();
        if needle.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);

        let Some(name_id) = self.interner.id_of(ATTR_NAME) else {
            return Vec::new();
        };
        let Some(column) = self.entities.attrs.get(&name_id) else {
            return Vec::new();
        };

        let mut scored: Vec<(bool, usize, String, SearchHit)> = Vec::new();
        for (&row, &value_id) in column {
            let Some(name) = self.interner.lookup(value_id) else {
                continue;
            };
            let lowered = name.to_lowercase();
            if !lowered.contains(&needle) {
                continue;
            }
            let (Some(id), Some(kind)) = (
                self.entities
                    .external_id(row)
                    .and_then(|id| self.interner.lookup(id)),
                self.entities
                    .kind(row)
                    .and_then(|k| self.interner.lookup(k)),
            ) else {
                continue;
            };
            scored.push((
                !lowered.starts_with(&needle),
                name.chars().count(),
                name.clone(),
                SearchHit { id, name, kind },
            ));
        }

        scored.sort_by(|a, b| {
            (a.0, a.1, &a.2, &a.3.id).cmp(&(b.0, b.1, &b.2, &b.3.id))
        });
        scored
            .into_iter()
            .take(limit)
            .map(|(_, _, _, hit)| hit)
            .collect()
    }

    /// Details card for an entity; `None` when the id is unknown.
    pub fn summary(&self, external_id: &str) -> Option<EntitySummary> {
        let row = self.lookup(external_id)?;
        let kind = self.interner.lookup(self.entities.kind(row)?)?;
        let owns = self.interner.id_of(REL_OWNS);

        let mut subsidiaries = RoaringBitmap::new();
        let mut owners = RoaringBitmap::new();
        if let Some(owns) = owns {
            for &id in self.relations.outgoing_ids(row) {
                if let Some(rel) = self.relations.get(id).filter(|r| r.kind == owns) {
                    subsidiaries.insert(rel.target);
                }
            }
            for &id in self.relations.incoming_ids(row) {
                if let Some(rel) = self.relations.get(id).filter(|r| r.kind == owns) {
                    owners.insert(rel.source);
                }
            }
        }

        Some(EntitySummary {
            id: external_id.to_string(),
            name: self.attr_of_row(row, ATTR_NAME),
            kind,
            jurisdiction: self.attr_of_row(row, ATTR_JURISDICTION),
            status: self.attr_of_row(row, ATTR_STATUS),
            direct_subsidiaries: subsidiaries.len(),
            direct_owners: owners.len(),
        })
    }
}
