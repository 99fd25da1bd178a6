//! Ownernet Store: compact, read-optimized ownership graph storage
//!
//! This is the embedded graph store the expansion engine reads from. It keeps
//! the whole ownership graph in memory and answers the handful of lookups the
//! engine and the CLI need:
//!
//! 1. **String Interning**: ids, kinds and attribute names stored once, referenced by `StrId`
//! 2. **Columnar Entities**: per-attribute columns plus a kind index (Roaring bitmaps)
//! 3. **Relationship Indexes**: forward (owner → owned) and backward (owned → owner)
//! 4. **Snapshots**: versioned binary `.ownd` files (bincode payload)
//!
//! The store is read-only from the engine's point of view. Every mutation bumps
//! `version()`, which callers may use to key derived results.

pub mod document;
mod search;

pub use document::{EntityDocument, GraphDocument, ImportStats, RelationshipDocument};
pub use search::{EntitySummary, SearchHit};

use anyhow::Result;
use dashmap::DashMap;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

/// Relationship kind carrying an ownership percentage.
pub const REL_OWNS: &str = "OWNS";
/// Person sits on the board of a company (structural, no percentage).
pub const REL_BOARD_MEMBER: &str = "BOARD_MEMBER";
/// Company-to-company partnership (structural, no percentage).
pub const REL_PARTNER: &str = "PARTNER";

pub const KIND_PERSON: &str = "Person";
pub const KIND_COMPANY: &str = "Company";

pub const ATTR_NAME: &str = "name";
pub const ATTR_JURISDICTION: &str = "jurisdiction";
pub const ATTR_STATUS: &str = "status";

const SNAPSHOT_MAGIC: &[u8; 4] = b"OWND";
const SNAPSHOT_VERSION: u32 = 1;

type FastMap<K, V> = HashMap<K, V, ahash::RandomState>;

/// Validation failures when writing into the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("entity `{0}` already exists")]
    DuplicateEntity(String),
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
    #[error("{kind} relationship {from} -> {to} requires a percentage")]
    MissingPercentage {
        kind: String,
        from: String,
        to: String,
    },
    #[error("percentage {value} is outside (0, 100]")]
    InvalidPercentage { value: f64 },
}

/// `true` for a finite percentage in `(0, 100]`.
pub fn is_valid_percentage(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 100.0
}

// ============================================================================
// String Interning
// ============================================================================

/// Interned string ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StrId(u32);

impl StrId {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// String interner: maps strings to compact IDs
pub struct StringInterner {
    str_to_id: DashMap<String, StrId>,
    id_to_str: DashMap<StrId, String>,
    next_id: AtomicU32,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            str_to_id: DashMap::new(),
            id_to_str: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a string, returning its ID
    pub fn intern(&self, s: &str) -> StrId {
        if let Some(id) = self.str_to_id.get(s) {
            return *id;
        }

        let id = StrId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.str_to_id.insert(s.to_string(), id);
        self.id_to_str.insert(id, s.to_string());
        id
    }

    /// Look up an existing ID for a string without inserting.
    pub fn id_of(&self, s: &str) -> Option<StrId> {
        self.str_to_id.get(s).map(|id| *id)
    }

    pub fn lookup(&self, id: StrId) -> Option<String> {
        self.id_to_str.get(&id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let strings: Vec<String> = (0..self.next_id.load(Ordering::SeqCst))
            .filter_map(|i| self.id_to_str.get(&StrId(i)).map(|s| s.clone()))
            .collect();
        Ok(bincode::serialize(&strings)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let strings: Vec<String> = bincode::deserialize(bytes)?;
        let interner = Self::new();
        for s in strings {
            interner.intern(&s);
        }
        Ok(interner)
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Entity Storage (Columnar)
// ============================================================================

/// Resolved, owned view of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: String,
    pub kind: String,
    pub attrs: BTreeMap<String, String>,
}

impl EntityView {
    pub fn name(&self) -> Option<&str> {
        self.attrs.get(ATTR_NAME).map(String::as_str)
    }
}

/// Columnar entity storage
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EntityStore {
    /// Row -> external id
    external_ids: Vec<StrId>,
    /// Row -> kind
    kinds: Vec<StrId>,
    /// attr_name -> (row -> value)
    attrs: FastMap<StrId, FastMap<u32, StrId>>,
    /// kind -> rows
    kind_index: FastMap<StrId, RoaringBitmap>,
    /// external id -> row
    by_external: FastMap<StrId, u32>,
}

impl EntityStore {
    pub fn len(&self) -> usize {
        self.external_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.external_ids.is_empty()
    }

    fn add(&mut self, external_id: StrId, kind: StrId, attrs: Vec<(StrId, StrId)>) -> u32 {
        let row = self.external_ids.len() as u32;
        self.external_ids.push(external_id);
        self.kinds.push(kind);
        self.by_external.insert(external_id, row);
        self.kind_index.entry(kind).or_default().insert(row);
        for (name, value) in attrs {
            self.attrs.entry(name).or_default().insert(row, value);
        }
        row
    }

    fn row_of(&self, external_id: StrId) -> Option<u32> {
        self.by_external.get(&external_id).copied()
    }

    fn external_id(&self, row: u32) -> Option<StrId> {
        self.external_ids.get(row as usize).copied()
    }

    fn kind(&self, row: u32) -> Option<StrId> {
        self.kinds.get(row as usize).copied()
    }

    fn attr(&self, row: u32, name: StrId) -> Option<StrId> {
        self.attrs.get(&name)?.get(&row).copied()
    }

    fn by_kind(&self, kind: StrId) -> Option<&RoaringBitmap> {
        self.kind_index.get(&kind)
    }
}

// ============================================================================
// Relationship Storage (Edge-List with Indexes)
// ============================================================================

/// A stored relationship between two entity rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRecord {
    pub kind: StrId,
    pub source: u32,
    pub target: u32,
    pub percentage: Option<f64>,
    pub attrs: Vec<(StrId, StrId)>,
}

/// Resolved, owned view of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationView {
    pub relation_id: u32,
    pub kind: String,
    pub source: String,
    pub target: String,
    pub percentage: Option<f64>,
    pub attrs: BTreeMap<String, String>,
}

/// Indexed relationship storage
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RelationStore {
    relations: Vec<RelationRecord>,
    /// source row -> relation ids (insertion order)
    forward: FastMap<u32, Vec<u32>>,
    /// target row -> relation ids (insertion order)
    backward: FastMap<u32, Vec<u32>>,
    /// kind -> relation ids
    kind_index: FastMap<StrId, RoaringBitmap>,
}

impl RelationStore {
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Number of relationships of a given kind.
    pub fn kind_count(&self, kind: StrId) -> usize {
        self.kind_index
            .get(&kind)
            .map(|ids| ids.len() as usize)
            .unwrap_or(0)
    }

    fn add(&mut self, rel: RelationRecord) -> u32 {
        let id = self.relations.len() as u32;
        self.forward.entry(rel.source).or_default().push(id);
        self.backward.entry(rel.target).or_default().push(id);
        self.kind_index.entry(rel.kind).or_default().insert(id);
        self.relations.push(rel);
        id
    }

    fn outgoing_ids(&self, source: u32) -> &[u32] {
        self.forward
            .get(&source)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    fn incoming_ids(&self, target: u32) -> &[u32] {
        self.backward
            .get(&target)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, relation_id: u32) -> Option<&RelationRecord> {
        self.relations.get(relation_id as usize)
    }
}

// ============================================================================
// OwnershipDB: The Complete Store
// ============================================================================

/// In-memory ownership graph keyed by external entity ids.
#[derive(Default, Serialize, Deserialize)]
pub struct OwnershipDB {
    #[serde(skip)]
    pub interner: StringInterner,
    entities: EntityStore,
    relations: RelationStore,
    version: u64,
}

impl OwnershipDB {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot version; bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relations.len()
    }

    /// Number of relationships of the given kind (e.g. `OWNS`).
    pub fn relationship_count_of(&self, kind: &str) -> usize {
        self.interner
            .id_of(kind)
            .map(|k| self.relations.kind_count(k))
            .unwrap_or(0)
    }

    /// Add an entity under a caller-chosen external id.
    pub fn add_entity(
        &mut self,
        external_id: &str,
        kind: &str,
        attrs: Vec<(&str, &str)>,
    ) -> Result<u32, StoreError> {
        if self.lookup(external_id).is_some() {
            return Err(StoreError::DuplicateEntity(external_id.to_string()));
        }

        let external = self.interner.intern(external_id);
        let kind = self.interner.intern(kind);
        let attrs = attrs
            .into_iter()
            .map(|(k, v)| (self.interner.intern(k), self.interner.intern(v)))
            .collect();
        self.version += 1;
        Ok(self.entities.add(external, kind, attrs))
    }

    /// Upsert a single entity attribute.
    pub fn upsert_entity_attr(
        &mut self,
        external_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let row = self
            .lookup(external_id)
            .ok_or_else(|| StoreError::UnknownEntity(external_id.to_string()))?;
        let key = self.interner.intern(key);
        let value = self.interner.intern(value);
        self.entities
            .attrs
            .entry(key)
            .or_default()
            .insert(row, value);
        self.version += 1;
        Ok(())
    }

    /// Add a relationship `source -[kind]-> target`.
    ///
    /// `OWNS` relationships must carry a percentage in `(0, 100]`; other kinds
    /// may omit it, but a present percentage is always validated.
    pub fn add_relationship(
        &mut self,
        kind: &str,
        source: &str,
        target: &str,
        percentage: Option<f64>,
        attrs: Vec<(&str, &str)>,
    ) -> Result<u32, StoreError> {
        let source_row = self
            .lookup(source)
            .ok_or_else(|| StoreError::UnknownEntity(source.to_string()))?;
        let target_row = self
            .lookup(target)
            .ok_or_else(|| StoreError::UnknownEntity(target.to_string()))?;

        match percentage {
            Some(value) if !is_valid_percentage(value) => {
                return Err(StoreError::InvalidPercentage { value });
            }
            None if kind == REL_OWNS => {
                return Err(StoreError::MissingPercentage {
                    kind: kind.to_string(),
                    from: source.to_string(),
                    to: target.to_string(),
                });
            }
            _ => {}
        }

        let rel = RelationRecord {
            kind: self.interner.intern(kind),
            source: source_row,
            target: target_row,
            percentage,
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (self.interner.intern(k), self.interner.intern(v)))
                .collect(),
        };
        self.version += 1;
        Ok(self.relations.add(rel))
    }

    /// Row id for an external entity id.
    pub fn lookup(&self, external_id: &str) -> Option<u32> {
        let id = self.interner.id_of(external_id)?;
        self.entities.row_of(id)
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.lookup(external_id).is_some()
    }

    /// Resolve an entity into owned strings.
    pub fn entity(&self, external_id: &str) -> Option<EntityView> {
        self.entity_by_row(self.lookup(external_id)?)
    }

    pub fn entity_by_row(&self, row: u32) -> Option<EntityView> {
        let id = self.interner.lookup(self.entities.external_id(row)?)?;
        let kind = self.interner.lookup(self.entities.kind(row)?)?;

        let mut attrs = BTreeMap::new();
        for (name_id, column) in &self.entities.attrs {
            let Some(value_id) = column.get(&row) else {
                continue;
            };
            let (Some(name), Some(value)) = (
                self.interner.lookup(*name_id),
                self.interner.lookup(*value_id),
            ) else {
                continue;
            };
            attrs.insert(name, value);
        }

        Some(EntityView { id, kind, attrs })
    }

    /// Attribute value for an entity row, if set.
    pub fn attr_of_row(&self, row: u32, name: &str) -> Option<String> {
        let name = self.interner.id_of(name)?;
        self.interner.lookup(self.entities.attr(row, name)?)
    }

    /// Relationships leaving `external_id`; `None` when the entity is unknown.
    pub fn outgoing(&self, external_id: &str) -> Option<Vec<RelationView>> {
        let row = self.lookup(external_id)?;
        Some(self.views(self.relations.outgoing_ids(row)))
    }

    /// Relationships arriving at `external_id`; `None` when the entity is unknown.
    pub fn incoming(&self, external_id: &str) -> Option<Vec<RelationView>> {
        let row = self.lookup(external_id)?;
        Some(self.views(self.relations.incoming_ids(row)))
    }

    fn views(&self, ids: &[u32]) -> Vec<RelationView> {
        ids.iter()
            .filter_map(|&id| self.relation_view(id))
            .collect()
    }

    pub fn relation_view(&self, relation_id: u32) -> Option<RelationView> {
        let rel = self.relations.get(relation_id)?;
        let mut attrs = BTreeMap::new();
        for (k, v) in &rel.attrs {
            if let (Some(k), Some(v)) = (self.interner.lookup(*k), self.interner.lookup(*v)) {
                attrs.insert(k, v);
            }
        }
        Some(RelationView {
            relation_id,
            kind: self.interner.lookup(rel.kind)?,
            source: self.interner.lookup(self.entities.external_id(rel.source)?)?,
            target: self.interner.lookup(self.entities.external_id(rel.target)?)?,
            percentage: rel.percentage,
            attrs,
        })
    }

    /// Entity rows of a given kind.
    pub fn find_by_kind(&self, kind: &str) -> RoaringBitmap {
        self.interner
            .id_of(kind)
            .and_then(|k| self.entities.by_kind(k).cloned())
            .unwrap_or_default()
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Serialize to the `.ownd` binary format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let interner_bytes = self.interner.to_bytes()?;
        let db_bytes = bincode::serialize(&(&self.entities, &self.relations, self.version))?;

        let mut out = Vec::with_capacity(16 + interner_bytes.len() + db_bytes.len());
        out.extend_from_slice(SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());

        out.extend_from_slice(&(interner_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&interner_bytes);

        out.extend_from_slice(&(db_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&db_bytes);

        Ok(out)
    }

    /// Deserialize from the `.ownd` binary format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 || &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(anyhow::anyhow!("Invalid ownership snapshot"));
        }

        let version = u32::from_le_bytes(bytes[4..8].try_into()?);
        if version != SNAPSHOT_VERSION {
            return Err(anyhow::anyhow!(
                "Unsupported ownership snapshot version: {}",
                version
            ));
        }

        let mut offset = 8;
        let interner_bytes = read_section(bytes, &mut offset)?;
        let interner = StringInterner::from_bytes(interner_bytes)?;
        let db_bytes = read_section(bytes, &mut offset)?;
        let (entities, relations, version): (EntityStore, RelationStore, u64) =
            bincode::deserialize(db_bytes)?;

        Ok(Self {
            interner,
            entities,
            relations,
            version,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        tracing::debug!(
            path = %path.display(),
            entities = self.entity_count(),
            relationships = self.relationship_count(),
            "saved ownership snapshot"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let db = Self::from_bytes(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            entities = db.entity_count(),
            relationships = db.relationship_count(),
            version = db.version,
            "loaded ownership snapshot"
        );
        Ok(db)
    }
}

fn read_section<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let len_end = *offset + 8;
    if bytes.len() < len_end {
        return Err(anyhow::anyhow!("Truncated ownership snapshot"));
    }
    let len = u64::from_le_bytes(bytes[*offset..len_end].try_into()?) as usize;
    let end = len_end
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| anyhow::anyhow!("Truncated ownership snapshot"))?;
    *offset = end;
    Ok(&bytes[len_end..end])
}
