//! In-memory `GraphAccess` fake shared by the engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ownernet_core::{
    AccessError, EdgeKind, Entity, EntityKind, GraphAccess, OwnershipEdge, Percentage,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct MemoryGraph {
    entities: BTreeMap<String, Entity>,
    edges: Vec<OwnershipEdge>,
    /// Fixed latency added to every call.
    delay: Option<Duration>,
    /// Per-entity latency derived from the id, so completion order differs
    /// from request order.
    jitter: bool,
    /// `details` blocks the calling thread instead of yielding.
    blocking_details: Option<Duration>,
    /// Edge fetches for this entity fail as if the store went away.
    unavailable: Option<String>,
    version: Option<AtomicU64>,
    calls: AtomicUsize,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, id: &str, kind: EntityKind) -> Self {
        self.entities.insert(
            id.to_string(),
            Entity {
                id: id.to_string(),
                kind,
                name: format!("{id} name"),
                attributes: BTreeMap::new(),
            },
        );
        self
    }

    pub fn company(self, id: &str) -> Self {
        self.entity(id, EntityKind::Company)
    }

    pub fn person(self, id: &str) -> Self {
        self.entity(id, EntityKind::Person)
    }

    fn ensure(mut self, id: &str) -> Self {
        if !self.entities.contains_key(id) {
            self = self.company(id);
        }
        self
    }

    pub fn owns(self, source: &str, target: &str, percentage: f64) -> Self {
        let pct = Percentage::try_new(percentage).expect("test percentage in range");
        let mut graph = self.ensure(source).ensure(target);
        graph
            .edges
            .push(OwnershipEdge::ownership(source, target, pct));
        graph
    }

    pub fn structural(self, source: &str, target: &str, kind: EdgeKind) -> Self {
        let mut graph = self.ensure(source).ensure(target);
        graph.edges.push(OwnershipEdge {
            source: source.to_string(),
            target: target.to_string(),
            kind,
            percentage: None,
            attributes: BTreeMap::new(),
        });
        graph
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn with_blocking_details(mut self, delay: Duration) -> Self {
        self.blocking_details = Some(delay);
        self
    }

    pub fn unavailable_at(mut self, id: &str) -> Self {
        self.unavailable = Some(id.to_string());
        self
    }

    pub fn versioned(mut self, version: u64) -> Self {
        self.version = Some(AtomicU64::new(version));
        self
    }

    pub fn bump_version(&self) {
        if let Some(v) = &self.version {
            v.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn edges(&self) -> &[OwnershipEdge] {
        &self.edges
    }

    async fn pause(&self, id: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.jitter {
            let spread = id.bytes().fold(7u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64));
            tokio::time::sleep(Duration::from_micros(spread % 5_000)).await;
        }
    }

    fn check(&self, id: &str) -> Result<(), AccessError> {
        if self.unavailable.as_deref() == Some(id) {
            let reason = format!("connection reset reading {id}");
            return Err(AccessError::Unavailable(reason));
        }
        if !self.entities.contains_key(id) {
            return Err(AccessError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphAccess for MemoryGraph {
    async fn outgoing(&self, id: &str) -> Result<Vec<OwnershipEdge>, AccessError> {
        self.pause(id).await;
        self.check(id)?;
        let edges = self.edges.iter().filter(|e| e.source == id);
        Ok(edges.cloned().collect())
    }

    async fn incoming(&self, id: &str) -> Result<Vec<OwnershipEdge>, AccessError> {
        self.pause(id).await;
        self.check(id)?;
        let edges = self.edges.iter().filter(|e| e.target == id);
        Ok(edges.cloned().collect())
    }

    async fn details(&self, id: &str) -> Result<Entity, AccessError> {
        self.pause(id).await;
        if let Some(delay) = self.blocking_details {
            std::thread::sleep(delay);
        }
        self.entities
            .get(id)
            .cloned()
            .ok_or_else(|| AccessError::NotFound(id.to_string()))
    }

    fn snapshot_version(&self) -> Option<u64> {
        self.version.as_ref().map(|v| v.load(Ordering::SeqCst))
    }
}

pub fn pct(value: f64) -> Percentage {
    Percentage::try_new(value).expect("test percentage in range")
}
