//! Bounded result cache keyed by request, policy and snapshot version.
//!
//! Results are only cached when the port reports a snapshot version, so a
//! write to the store naturally invalidates every entry built before it.

use crate::aggregate::{AggregationMode, StructuralEdgePolicy};
use crate::assemble::NetworkResult;
use crate::error::Result;
use crate::expand::NetworkExpander;
use crate::model::{Direction, EntityId};
use crate::port::GraphAccess;
use crate::request::ExpandRequest;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub seed: EntityId,
    pub max_hops: u8,
    /// `f64::to_bits` of the threshold, so the key stays `Eq + Hash`.
    pub min_percentage_bits: u64,
    pub direction: Direction,
    pub aggregation: AggregationMode,
    pub structural: StructuralEdgePolicy,
    pub snapshot_version: u64,
}

impl CacheKey {
    pub fn new(
        request: &ExpandRequest,
        aggregation: AggregationMode,
        structural: StructuralEdgePolicy,
        snapshot_version: u64,
    ) -> Self {
        Self {
            seed: request.seed.clone(),
            max_hops: request.max_hops,
            min_percentage_bits: request.min_percentage.to_bits(),
            direction: request.direction,
            aggregation,
            structural,
            snapshot_version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Arc<NetworkResult>>,
    order: VecDeque<CacheKey>,
}

/// FIFO-evicting map from [`CacheKey`] to finished networks.
pub struct NetworkCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NetworkCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<NetworkResult>> {
        let found = self.inner.lock().entries.get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: CacheKey, result: Arc<NetworkResult>) {
        let mut inner = self.inner.lock();
        if inner.entries.insert(key.clone(), result).is_some() {
            return;
        }
        inner.order.push_back(key);
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

/// [`NetworkExpander`] fronted by a [`NetworkCache`].
pub struct CachedExpander<G> {
    expander: NetworkExpander<G>,
    cache: NetworkCache,
}

impl<G: GraphAccess> CachedExpander<G> {
    pub fn new(expander: NetworkExpander<G>, capacity: usize) -> Self {
        Self {
            expander,
            cache: NetworkCache::new(capacity),
        }
    }

    pub fn expander(&self) -> &NetworkExpander<G> {
        &self.expander
    }

    pub fn cache(&self) -> &NetworkCache {
        &self.cache
    }

    pub async fn expand(&self, request: &ExpandRequest) -> Result<Arc<NetworkResult>> {
        self.expand_with_cancel(request, &CancellationToken::new()).await
    }

    pub async fn expand_with_cancel(
        &self,
        request: &ExpandRequest,
        cancel: &CancellationToken,
    ) -> Result<Arc<NetworkResult>> {
        let Some(version) = self.expander.graph().snapshot_version() else {
            let result = self.expander.expand_with_cancel(request, cancel).await?;
            return Ok(Arc::new(result));
        };

        let config = self.expander.config();
        let key = CacheKey::new(
            request,
            config.aggregation,
            config.structural_edges,
            version,
        );
        if let Some(hit) = self.cache.get(&key) {
            debug!(seed = %request.seed, version, "network cache hit");
            return Ok(hit);
        }

        let result = Arc::new(self.expander.expand_with_cancel(request, cancel).await?);
        // A write landed mid-run; the result may mix snapshots.
        if self.expander.graph().snapshot_version() == Some(version) {
            self.cache.insert(key, Arc::clone(&result));
        } else {
            debug!(seed = %request.seed, version, "snapshot moved during expansion; not caching");
        }
        Ok(result)
    }
}
