//! Network Expander: hop-bounded, threshold-pruned, cycle-safe exploration.
//!
//! ```text
//!   Pending(frontier = [seed])
//!        │
//!        ▼
//!   ┌──────────────────────────────────────────────┐
//!   │ Expand level d:                              │
//!   │   fetch edges of distinct frontier entities  │◄──┐
//!   │   (concurrent, merged back in id order)      │   │ d < max_hops
//!   │   extend every path by every admissible edge │   │ frontier non-empty
//!   │   prune: cycle / below threshold / caps      │───┘
//!   └──────────────────────────────────────────────┘
//!        │
//!        ▼
//!   Terminal → NetworkAssembler
//! ```
//!
//! Paths live in an arena with parent links, so the walk needs no recursion
//! and each path's visited set is its own parent chain (at most 8 entries).
//! An entity may be reached by many paths (convergent ownership); a path may
//! never revisit an entity (cycles).

use crate::aggregate::{edge_weight, Contribution, Percentage};
use crate::assemble::{NetworkAssembler, NetworkResult, Traversal};
use crate::config::ExpansionConfig;
use crate::error::{NetworkError, Result};
use crate::model::{Entity, EntityId, OwnershipEdge, Sweep};
use crate::port::GraphAccess;
use crate::request::ExpandRequest;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One path in the arena: the entity it ends at plus a link to its prefix.
#[derive(Debug)]
struct PathRecord {
    entity: EntityId,
    parent: Option<usize>,
    effective: Percentage,
    hops: u8,
}

/// A path extension that passed the cycle and threshold checks.
struct Extension<'a> {
    parent: usize,
    effective: Percentage,
    edge: &'a OwnershipEdge,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

/// Drives one expansion per call; holds no state between calls.
pub struct NetworkExpander<G> {
    graph: G,
    config: ExpansionConfig,
}

impl<G: GraphAccess> NetworkExpander<G> {
    pub fn new(graph: G) -> Self {
        Self::with_config(graph, ExpansionConfig::default())
    }

    pub fn with_config(graph: G, config: ExpansionConfig) -> Self {
        Self { graph, config }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    pub async fn expand(&self, request: &ExpandRequest) -> Result<NetworkResult> {
        self.expand_with_cancel(request, &CancellationToken::new()).await
    }

    /// Expand, aborting with [`NetworkError::Cancelled`] once `cancel` fires.
    ///
    /// Timeouts and cancellation never yield partial results.
    pub async fn expand_with_cancel(
        &self,
        request: &ExpandRequest,
        cancel: &CancellationToken,
    ) -> Result<NetworkResult> {
        request.validate()?;
        self.config.validate()?;

        let started = Instant::now();
        let deadline = self.config.timeout().map(|budget| Deadline {
            at: started + budget,
            budget,
        });

        let work = self.run(request, started, deadline, cancel);
        let bounded = async {
            match deadline {
                Some(deadline) => tokio::time::timeout(deadline.budget, work)
                    .await
                    .unwrap_or(Err(NetworkError::ExpansionTimeout(deadline.budget))),
                None => work.await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NetworkError::Cancelled),
            result = bounded => result,
        };

        match &result {
            Ok(network) => info!(
                seed = %request.seed,
                direction = ?request.direction,
                max_hops = request.max_hops,
                min_percentage = request.min_percentage,
                nodes = network.stats.node_count,
                edges = network.stats.edge_count,
                paths = network.stats.paths_retained,
                truncated = network.stats.truncated,
                elapsed_us = network.stats.elapsed_micros,
                "expanded ownership network"
            ),
            Err(err) => warn!(seed = %request.seed, error = %err, "ownership expansion failed"),
        }
        result
    }

    async fn run(
        &self,
        request: &ExpandRequest,
        started: Instant,
        deadline: Option<Deadline>,
        cancel: &CancellationToken,
    ) -> Result<NetworkResult> {
        let seed: Entity = self.graph.details(&request.seed).await?;

        let mut traversal = Traversal {
            fetches: 1,
            ..Traversal::default()
        };
        for &sweep in request.direction.sweeps() {
            if traversal.truncated {
                break;
            }
            self.sweep(sweep, request, &mut traversal, deadline, cancel).await?;
        }

        if traversal.truncated {
            warn!(
                seed = %request.seed,
                nodes = traversal.node_count(),
                edges = traversal.edges.len(),
                paths = traversal.paths,
                "expansion hit a size cap; frontier truncated"
            );
        }

        checkpoint(deadline, cancel)?;
        let network = NetworkAssembler::new(self.config.aggregation, self.config.fetch_concurrency)
            .assemble(&self.graph, request, seed, traversal, started)
            .await?;
        // Hydration against a store that never yields is not bounded by
        // `tokio::time::timeout`.
        checkpoint(deadline, cancel)?;
        Ok(network)
    }

    /// Breadth-first walk in one direction, level by level.
    async fn sweep(
        &self,
        sweep: Sweep,
        request: &ExpandRequest,
        traversal: &mut Traversal,
        deadline: Option<Deadline>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut arena = vec![PathRecord {
            entity: request.seed.clone(),
            parent: None,
            effective: Percentage::FULL,
            hops: 0,
        }];
        let mut frontier: Vec<usize> = vec![0];

        for depth in 0..request.max_hops {
            if frontier.is_empty() {
                break;
            }
            checkpoint(deadline, cancel)?;

            let adjacency = self.fetch_level(sweep, &arena, &frontier).await?;
            traversal.fetches += adjacency.len();

            let hops = depth + 1;
            let mut next = Vec::new();
            let mut pruned = 0usize;

            let mut candidates: Vec<Extension<'_>> = Vec::new();
            for &idx in &frontier {
                let Some(edges) = adjacency.get(&arena[idx].entity) else {
                    continue;
                };
                for edge in edges {
                    let Some(weight) = edge_weight(edge, self.config.structural_edges) else {
                        continue;
                    };
                    let peer = edge.peer(sweep);
                    if path_contains(&arena, idx, peer) {
                        continue;
                    }
                    let effective = arena[idx].effective.chain(weight);
                    if !effective.meets(request.min_percentage) {
                        pruned += 1;
                        continue;
                    }
                    candidates.push(Extension {
                        parent: idx,
                        effective,
                        edge,
                    });
                }
            }
            // Strongest first, so a cap drops the weakest holdings of the level.
            candidates.sort_by(|a, b| {
                b.effective
                    .total_cmp(&a.effective)
                    .then_with(|| a.edge.peer(sweep).cmp(b.edge.peer(sweep)))
                    .then_with(|| a.parent.cmp(&b.parent))
            });

            for Extension {
                parent,
                effective,
                edge,
            } in candidates
            {
                let peer = edge.peer(sweep);
                let key = edge.key();
                let new_node = !traversal.reached.contains_key(peer);
                let new_edge = !traversal.edges.contains_key(&key);
                if !self.admits(traversal, new_node, new_edge) {
                    traversal.truncated = true;
                    break;
                }

                arena.push(PathRecord {
                    entity: peer.to_string(),
                    parent: Some(parent),
                    effective,
                    hops,
                });
                let record = arena.len() - 1;
                traversal.absorb(
                    sweep,
                    Contribution {
                        entity: peer.to_string(),
                        effective,
                        hops,
                        path: path_of(&arena, record),
                    },
                );
                if new_edge {
                    traversal.edges.insert(key, edge.clone());
                }
                traversal.paths += 1;
                traversal.max_depth = traversal.max_depth.max(hops);
                next.push(record);
            }

            debug!(
                %sweep,
                depth = hops,
                fetched = adjacency.len(),
                retained = next.len(),
                pruned,
                "expanded frontier level"
            );

            if traversal.truncated {
                break;
            }
            frontier = next;
        }

        Ok(())
    }

    /// Whether one more path fits under the node/edge/path caps.
    fn admits(&self, traversal: &Traversal, new_node: bool, new_edge: bool) -> bool {
        let nodes_ok = !new_node || traversal.node_count() < self.config.max_nodes;
        let edges_ok = !new_edge || traversal.edges.len() < self.config.max_edges;
        let paths_ok = traversal.paths < self.config.max_paths;
        nodes_ok && edges_ok && paths_ok
    }

    /// Fetch edges for every distinct entity on the frontier.
    ///
    /// Fetches run concurrently; results are keyed by entity id so completion
    /// order never influences the walk.
    async fn fetch_level(
        &self,
        sweep: Sweep,
        arena: &[PathRecord],
        frontier: &[usize],
    ) -> Result<BTreeMap<EntityId, Vec<OwnershipEdge>>> {
        let ids: BTreeSet<&str> = frontier
            .iter()
            .map(|&idx| arena[idx].entity.as_str())
            .collect();

        let graph = &self.graph;
        let fetched: Vec<(EntityId, Vec<OwnershipEdge>)> = stream::iter(ids)
            .map(move |id| async move {
                let edges = match sweep {
                    Sweep::Outgoing => graph.outgoing(id).await?,
                    Sweep::Incoming => graph.incoming(id).await?,
                };
                Ok::<_, NetworkError>((id.to_string(), normalize_edges(edges, sweep)))
            })
            .buffered(self.config.fetch_concurrency)
            .try_collect()
            .await?;

        Ok(fetched.into_iter().collect())
    }
}

fn checkpoint(deadline: Option<Deadline>, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(NetworkError::Cancelled);
    }
    match deadline {
        Some(deadline) if Instant::now() >= deadline.at => {
            Err(NetworkError::ExpansionTimeout(deadline.budget))
        }
        _ => Ok(()),
    }
}

fn path_contains(arena: &[PathRecord], mut idx: usize, entity: &str) -> bool {
    loop {
        let record = &arena[idx];
        if record.entity == entity {
            return true;
        }
        match record.parent {
            Some(parent) => idx = parent,
            None => return false,
        }
    }
}

fn path_of(arena: &[PathRecord], mut idx: usize) -> Vec<EntityId> {
    let mut path = vec![arena[idx].entity.clone()];
    while let Some(parent) = arena[idx].parent {
        path.push(arena[parent].entity.clone());
        idx = parent;
    }
    path.reverse();
    path
}

fn percentage_order(a: Option<Percentage>, b: Option<Percentage>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

/// Sort a fetch result by (peer, kind, percentage) and fold parallel edges of
/// the same kind between the same pair into one, summing their percentages.
fn normalize_edges(mut edges: Vec<OwnershipEdge>, sweep: Sweep) -> Vec<OwnershipEdge> {
    edges.sort_by(|a, b| {
        a.peer(sweep)
            .cmp(b.peer(sweep))
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| percentage_order(a.percentage, b.percentage))
    });

    let mut merged: Vec<OwnershipEdge> = Vec::with_capacity(edges.len());
    for edge in edges {
        match merged.last_mut() {
            Some(prev)
                if prev.source == edge.source
                    && prev.target == edge.target
                    && prev.kind == edge.kind =>
            {
                prev.percentage = match (prev.percentage, edge.percentage) {
                    (Some(a), Some(b)) => Some(a.saturating_add(b)),
                    (a, b) => a.or(b),
                };
            }
            _ => merged.push(edge),
        }
    }
    merged
}
