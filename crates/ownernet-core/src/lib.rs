//! Ownernet Core: ownership-network expansion and aggregation
//!
//! Given a seed entity, a hop limit and a minimum ownership threshold, the
//! engine walks the percentage-weighted ownership graph and returns the
//! induced sub-network: deduplicated nodes, deduplicated edges, and each
//! node's effective ownership relative to the seed.
//!
//! ```text
//!   ExpandRequest ──► NetworkExpander ──► NetworkAssembler ──► NetworkResult
//!                          │  ▲
//!                fetch     │  │ edges / details
//!                          ▼  │
//!                      GraphAccess (port)
//!                          │
//!                      StoreGraph ──► ownernet-store::OwnershipDB
//! ```
//!
//! ## Module Organization
//!
//! - `port`: the read-only graph capability and the embedded-store adapter
//! - `aggregate`: percentage chaining and multi-path aggregation
//! - `expand`: bounded breadth-first traversal (caps, timeout, cancellation)
//! - `assemble`: deterministic, serializable results
//! - `cache`: optional result cache keyed by snapshot version

pub mod aggregate;
pub mod assemble;
pub mod cache;
pub mod config;
pub mod error;
pub mod expand;
pub mod model;
pub mod port;
pub mod request;

// Re-export key types
pub use aggregate::{
    combine, edge_weight, AggregationMode, Contribution, NodeAggregate, Percentage,
    StructuralEdgePolicy,
};
pub use assemble::{NetworkAssembler, NetworkNode, NetworkResult, NetworkStats, Reach};
pub use cache::{CacheKey, CacheStats, CachedExpander, NetworkCache};
pub use config::ExpansionConfig;
pub use error::{AccessError, NetworkError, Result};
pub use expand::NetworkExpander;
pub use model::{Direction, EdgeKey, EdgeKind, Entity, EntityId, EntityKind, OwnershipEdge, Sweep};
pub use port::{GraphAccess, StoreGraph};
pub use request::{ExpandRequest, DEFAULT_MAX_HOPS, DEFAULT_MIN_PERCENTAGE};

pub use tokio_util::sync::CancellationToken;

// ============================================================================
// Convenience entry point
// ============================================================================

/// One-shot expansion with an explicit configuration.
pub async fn expand_network<G: GraphAccess>(
    graph: G,
    request: &ExpandRequest,
    config: ExpansionConfig,
) -> Result<NetworkResult> {
    NetworkExpander::with_config(graph, config)
        .expand(request)
        .await
}
