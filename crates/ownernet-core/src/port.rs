//! Graph Access Port: the read-only capability the expander pulls edges through.
//!
//! The engine never holds a global store handle; callers inject a
//! [`GraphAccess`] implementation. [`StoreGraph`] adapts the embedded
//! `ownernet-store` database, and tests substitute in-memory fakes.

use crate::aggregate::Percentage;
use crate::error::AccessError;
use crate::model::{EdgeKind, Entity, EntityKind, OwnershipEdge};
use async_trait::async_trait;
use ownernet_store::{EntityView, OwnershipDB, RelationView, ATTR_NAME};
use parking_lot::RwLock;
use std::sync::Arc;

/// Read-only access to the ownership graph, keyed by entity id.
///
/// Implementations must be safe for concurrent reads and side-effect free.
#[async_trait]
pub trait GraphAccess: Send + Sync {
    /// Edges leaving `id` (what `id` owns / sits on / partners with).
    async fn outgoing(&self, id: &str) -> Result<Vec<OwnershipEdge>, AccessError>;

    /// Edges arriving at `id` (who owns `id`).
    async fn incoming(&self, id: &str) -> Result<Vec<OwnershipEdge>, AccessError>;

    async fn details(&self, id: &str) -> Result<Entity, AccessError>;

    /// Version of the snapshot being read, if the store tracks one.
    ///
    /// Result caching is only enabled when this returns `Some`.
    fn snapshot_version(&self) -> Option<u64> {
        None
    }
}

#[async_trait]
impl<T: GraphAccess + ?Sized> GraphAccess for Arc<T> {
    async fn outgoing(&self, id: &str) -> Result<Vec<OwnershipEdge>, AccessError> {
        (**self).outgoing(id).await
    }

    async fn incoming(&self, id: &str) -> Result<Vec<OwnershipEdge>, AccessError> {
        (**self).incoming(id).await
    }

    async fn details(&self, id: &str) -> Result<Entity, AccessError> {
        (**self).details(id).await
    }

    fn snapshot_version(&self) -> Option<u64> {
        (**self).snapshot_version()
    }
}

// ============================================================================
// Embedded store adapter
// ============================================================================

/// [`GraphAccess`] over a shared in-process [`OwnershipDB`].
#[derive(Clone)]
pub struct StoreGraph {
    db: Arc<RwLock<OwnershipDB>>,
}

impl StoreGraph {
    pub fn new(db: OwnershipDB) -> Self {
        Self {
            db: Arc::new(RwLock::new(db)),
        }
    }

    /// Share an existing handle (e.g. one a writer also holds).
    pub fn shared(db: Arc<RwLock<OwnershipDB>>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> Arc<RwLock<OwnershipDB>> {
        Arc::clone(&self.db)
    }

    fn edges(
        &self,
        id: &str,
        fetch: impl FnOnce(&OwnershipDB, &str) -> Option<Vec<RelationView>>,
    ) -> Result<Vec<OwnershipEdge>, AccessError> {
        let relations = {
            let db = self.db.read();
            fetch(&db, id)
        };
        let relations = relations.ok_or_else(|| AccessError::NotFound(id.to_string()))?;
        Ok(relations.into_iter().map(edge_from_view).collect())
    }
}

#[async_trait]
impl GraphAccess for StoreGraph {
    async fn outgoing(&self, id: &str) -> Result<Vec<OwnershipEdge>, AccessError> {
        self.edges(id, |db, id| db.outgoing(id))
    }

    async fn incoming(&self, id: &str) -> Result<Vec<OwnershipEdge>, AccessError> {
        self.edges(id, |db, id| db.incoming(id))
    }

    async fn details(&self, id: &str) -> Result<Entity, AccessError> {
        let view = self.db.read().entity(id);
        view.map(entity_from_view).ok_or_else(|| AccessError::NotFound(id.to_string()))
    }

    fn snapshot_version(&self) -> Option<u64> {
        Some(self.db.read().version())
    }
}

pub(crate) fn entity_from_view(mut view: EntityView) -> Entity {
    let name = view
        .attrs
        .remove(ATTR_NAME)
        .unwrap_or_else(|| view.id.clone());
    Entity {
        kind: EntityKind::from_label(&view.kind),
        id: view.id,
        name,
        attributes: view.attrs,
    }
}

pub(crate) fn edge_from_view(view: RelationView) -> OwnershipEdge {
    OwnershipEdge {
        kind: EdgeKind::from_label(&view.kind),
        percentage: view.percentage.and_then(Percentage::try_new),
        source: view.source,
        target: view.target,
        attributes: view.attrs,
    }
}
