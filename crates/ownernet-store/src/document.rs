//! JSON graph documents: the interchange format for importing ownership data.
//!
//! ```json
//! {
//!   "entities": [
//!     { "id": "p1", "kind": "Person", "name": "Alice", "attributes": { "net_worth": 1200000 } },
//!     { "id": "c1", "kind": "Company", "name": "Acme", "attributes": { "industry": "Energy" } }
//!   ],
//!   "relationships": [
//!     { "source": "p1", "target": "c1", "kind": "OWNS", "percentage": 30.0 }
//!   ]
//! }
//! ```

use crate::{OwnershipDB, StoreError, ATTR_NAME, REL_OWNS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub entities: Vec<EntityDocument>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    pub id: String,
    pub kind: String,
    pub name: String,
    /// Kind-specific display fields (net worth, industry, ...). Non-string
    /// values are stored in their JSON text form.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDocument {
    pub source: String,
    pub target: String,
    #[serde(default = "default_relationship_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

fn default_relationship_kind() -> String {
    REL_OWNS.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub entities: usize,
    pub relationships: usize,
}

fn attribute_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl GraphDocument {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn write_json_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

impl OwnershipDB {
    /// Build a fresh store from a document.
    pub fn from_document(doc: &GraphDocument) -> Result<Self, StoreError> {
        let mut db = Self::new();
        db.import_document(doc)?;
        Ok(db)
    }

    /// Append a document's entities, then its relationships.
    ///
    /// Stops at the first invalid record; records before it stay imported.
    pub fn import_document(&mut self, doc: &GraphDocument) -> Result<ImportStats, StoreError> {
        let mut stats = ImportStats::default();

        for entity in &doc.entities {
            let attrs: Vec<(String, String)> = entity
                .attributes
                .iter()
                .filter(|(k, _)| k.as_str() != ATTR_NAME)
                .map(|(k, v)| (k.clone(), attribute_text(v)))
                .collect();
            let mut borrowed: Vec<(&str, &str)> = vec![(ATTR_NAME, entity.name.as_str())];
            borrowed.extend(attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            self.add_entity(&entity.id, &entity.kind, borrowed)?;
            stats.entities += 1;
        }

        for rel in &doc.relationships {
            let attrs: Vec<(String, String)> = rel
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), attribute_text(v)))
                .collect();
            self.add_relationship(
                &rel.kind,
                &rel.source,
                &rel.target,
                rel.percentage,
                attrs
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect(),
            )?;
            stats.relationships += 1;
        }

        tracing::debug!(
            entities = stats.entities,
            relationships = stats.relationships,
            "imported graph document"
        );
        Ok(stats)
    }

    /// Export the whole store as a document (entities in insertion order).
    pub fn to_document(&self) -> GraphDocument {
        let mut doc = GraphDocument::default();

        for row in 0..self.entity_count() as u32 {
            let Some(mut view) = self.entity_by_row(row) else {
                continue;
            };
            let name = view.attrs.remove(ATTR_NAME).unwrap_or_default();
            doc.entities.push(EntityDocument {
                id: view.id,
                kind: view.kind,
                name,
                attributes: view
                    .attrs
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect(),
            });
        }

        for relation_id in 0..self.relationship_count() as u32 {
            let Some(rel) = self.relation_view(relation_id) else {
                continue;
            };
            doc.relationships.push(RelationshipDocument {
                source: rel.source,
                target: rel.target,
                kind: rel.kind,
                percentage: rel.percentage,
                attributes: rel
                    .attrs
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect(),
            });
        }

        doc
    }
}
