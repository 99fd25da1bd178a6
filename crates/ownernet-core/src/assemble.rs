//! Network Assembler: turns traversal records into the caller-facing result.
//!
//! Nodes come out sorted by entity id and edges by `(source, target, kind)`,
//! so two expansions over the same snapshot serialize identically apart from
//! `stats.elapsed_micros`.

use crate::aggregate::{AggregationMode, Contribution, NodeAggregate, Percentage};
use crate::error::{NetworkError, Result};
use crate::model::{EdgeKey, Entity, EntityId, OwnershipEdge, Sweep};
use crate::port::GraphAccess;
use crate::request::ExpandRequest;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::time::Instant;

/// How a node was reached from the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reach {
    Seed,
    /// The seed (transitively) owns this entity.
    Outgoing,
    /// This entity (transitively) owns the seed.
    Incoming,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub entity: Entity,
    /// Headline ownership under the request's aggregation mode.
    pub effective_percentage: Percentage,
    /// Fewest hops over all retained paths.
    pub hop_distance: u8,
    pub reached: Reach,
    /// Number of retained paths ending here.
    pub path_count: usize,
    /// Entities along the strongest retained path, seed first.
    pub strongest_path: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// Deepest hop of any retained path.
    pub max_depth: u8,
    pub paths_retained: usize,
    /// Store round-trips, seed lookup and hydration included.
    pub store_fetches: usize,
    /// A node/edge/path cap cut the frontier short.
    pub truncated: bool,
    pub elapsed_micros: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkResult {
    pub request: ExpandRequest,
    pub aggregation: AggregationMode,
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<OwnershipEdge>,
    pub stats: NetworkStats,
}

impl NetworkResult {
    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes
            .binary_search_by(|n| n.entity.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// First edge `source -> target` of any kind (ownership sorts first).
    pub fn edge(&self, source: &str, target: &str) -> Option<&OwnershipEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    pub fn entity_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.entity.id.as_str()).collect()
    }

    /// Copy with the timing field zeroed, for comparing repeated runs.
    pub fn without_timing(&self) -> Self {
        let mut out = self.clone();
        out.stats.elapsed_micros = 0;
        out
    }
}

// ============================================================================
// Traversal records (expander output)
// ============================================================================

/// Per-sweep aggregates for one reached entity.
#[derive(Debug, Default)]
pub(crate) struct Reached {
    outgoing: Option<NodeAggregate>,
    incoming: Option<NodeAggregate>,
}

/// Everything one expansion retained, handed from the expander to the assembler.
#[derive(Debug, Default)]
pub(crate) struct Traversal {
    pub reached: BTreeMap<EntityId, Reached>,
    pub edges: BTreeMap<EdgeKey, OwnershipEdge>,
    pub paths: usize,
    pub max_depth: u8,
    pub fetches: usize,
    pub truncated: bool,
}

impl Traversal {
    /// Distinct entities retained so far, seed included.
    pub fn node_count(&self) -> usize {
        self.reached.len() + 1
    }

    pub fn absorb(&mut self, sweep: Sweep, contribution: Contribution) {
        let slot = self.reached.entry(contribution.entity.clone()).or_default();
        let aggregate = match sweep {
            Sweep::Outgoing => &mut slot.outgoing,
            Sweep::Incoming => &mut slot.incoming,
        };
        match aggregate {
            Some(existing) => existing.absorb(contribution),
            None => *aggregate = Some(NodeAggregate::new(contribution)),
        }
    }
}

// ============================================================================
// Assembler
// ============================================================================

pub struct NetworkAssembler {
    mode: AggregationMode,
    fetch_concurrency: usize,
}

impl NetworkAssembler {
    pub fn new(mode: AggregationMode, fetch_concurrency: usize) -> Self {
        Self {
            mode,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    /// Hydrate every reached entity and build the final result.
    pub(crate) async fn assemble<G: GraphAccess + ?Sized>(
        &self,
        graph: &G,
        request: &ExpandRequest,
        seed: Entity,
        traversal: Traversal,
        started: Instant,
    ) -> Result<NetworkResult> {
        let ids: Vec<EntityId> = traversal.reached.keys().cloned().collect();
        let entities: Vec<Entity> = stream::iter(ids)
            .map(move |id| async move {
                graph.details(&id).await.map_err(NetworkError::from)
            })
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await?;

        let fetches = traversal.fetches + entities.len();
        let mut nodes = Vec::with_capacity(entities.len() + 1);
        nodes.push(NetworkNode {
            strongest_path: vec![seed.id.clone()],
            entity: seed,
            effective_percentage: Percentage::FULL,
            hop_distance: 0,
            reached: Reach::Seed,
            path_count: 1,
        });
        for (reached, entity) in traversal.reached.into_values().zip(entities) {
            if let Some(node) = self.node(entity, reached) {
                nodes.push(node);
            }
        }
        nodes.sort_by(|a, b| a.entity.id.cmp(&b.entity.id));

        let edges: Vec<OwnershipEdge> = traversal.edges.into_values().collect();
        let stats = NetworkStats {
            node_count: nodes.len(),
            edge_count: edges.len(),
            max_depth: traversal.max_depth,
            paths_retained: traversal.paths,
            store_fetches: fetches,
            truncated: traversal.truncated,
            elapsed_micros: started.elapsed().as_micros() as u64,
        };

        Ok(NetworkResult {
            request: request.clone(),
            aggregation: self.mode,
            nodes,
            edges,
            stats,
        })
    }

    /// Merge the per-sweep aggregates of one entity into a node.
    fn node(&self, entity: Entity, reached: Reached) -> Option<NetworkNode> {
        let reach = match (&reached.outgoing, &reached.incoming) {
            (Some(_), Some(_)) => Reach::Both,
            (Some(_), None) => Reach::Outgoing,
            (None, Some(_)) => Reach::Incoming,
            (None, None) => return None,
        };

        let sweeps: Vec<&NodeAggregate> = [reached.outgoing.as_ref(), reached.incoming.as_ref()]
            .into_iter()
            .flatten()
            .collect();
        let best = sweeps.iter().copied().reduce(|a, b| {
            if b.headline(self.mode).total_cmp(&a.headline(self.mode)).is_gt() {
                b
            } else {
                a
            }
        })?;

        Some(NetworkNode {
            effective_percentage: best.headline(self.mode),
            hop_distance: sweeps.iter().map(|a| a.min_hops()).min().unwrap_or(0),
            reached: reach,
            path_count: sweeps.iter().map(|a| a.path_count()).sum(),
            strongest_path: best.best().path.clone(),
            entity,
        })
    }
}
