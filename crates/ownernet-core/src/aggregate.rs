//! Path Aggregator: percentage math along ownership chains.
//!
//! Effective ownership along a path is the running product of edge
//! percentages, scaled back into `[0, 100]`:
//!
//! ```text
//! effective(seed)        = 100
//! effective(path + edge) = effective(path) * edge / 100
//! ```
//!
//! Because every factor is at most 100, the effective percentage never grows
//! along a path, so threshold pruning can be applied as soon as a path drops
//! below the minimum.
//!
//! When several paths reach the same entity, the headline value is chosen by
//! [`AggregationMode`]. The default keeps the strongest single path; summing
//! independent paths is available as the explicitly named `Summed` mode.

use crate::model::{EdgeKind, EntityId, OwnershipEdge};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ============================================================================
// Percentage
// ============================================================================

/// An ownership percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Percentage(f64);

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Percentage::try_new(value).ok_or_else(|| {
            serde::de::Error::custom(format!("percentage {value} is outside [0, 100]"))
        })
    }
}

impl Percentage {
    pub const FULL: Percentage = Percentage(100.0);
    pub const ZERO: Percentage = Percentage(0.0);

    pub fn try_new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Extend a path's effective percentage by one edge.
    ///
    /// The result is clamped to `min(self, edge)` so that float rounding can
    /// never make a longer path stronger than its prefix.
    pub fn chain(self, edge: Percentage) -> Percentage {
        if self == Self::FULL {
            return edge;
        }
        let product = self.0 * edge.0 / 100.0;
        Percentage(product.min(self.0).min(edge.0))
    }

    /// Sum two percentages, saturating at 100.
    pub fn saturating_add(self, other: Percentage) -> Percentage {
        Percentage((self.0 + other.0).min(100.0))
    }

    pub fn total_cmp(&self, other: &Percentage) -> Ordering {
        self.0.total_cmp(&other.0)
    }

    pub fn meets(self, threshold: f64) -> bool {
        self.0 >= threshold
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

// ============================================================================
// Policies
// ============================================================================

/// How contributions from distinct paths to one entity are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Strongest single path (ultimate-beneficial-owner reading).
    #[default]
    Strongest,
    /// Sum of every retained path, capped at 100. Overstates control when
    /// paths share intermediate holdings; opt-in only.
    Summed,
}

impl std::str::FromStr for AggregationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strongest" | "max" => Ok(Self::Strongest),
            "summed" | "sum" => Ok(Self::Summed),
            other => Err(format!(
                "unknown aggregation mode `{other}` (expected strongest or summed)"
            )),
        }
    }
}

/// How non-ownership edges (board seats, partnerships) take part in a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralEdgePolicy {
    /// Only ownership edges are walked.
    #[default]
    Exclude,
    /// Structural edges are walked and count as 100% for multiplication.
    PassThrough,
}

/// Multiplication factor for an edge, or `None` if the edge is not walked.
pub fn edge_weight(edge: &OwnershipEdge, policy: StructuralEdgePolicy) -> Option<Percentage> {
    match (&edge.kind, policy) {
        (EdgeKind::Ownership, _) => edge.percentage.filter(|p| p.value() > 0.0),
        (_, StructuralEdgePolicy::Exclude) => None,
        (_, StructuralEdgePolicy::PassThrough) => Some(Percentage::FULL),
    }
}

// ============================================================================
// Contributions
// ============================================================================

/// One retained path's summary for the entity it reaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub entity: EntityId,
    pub effective: Percentage,
    pub hops: u8,
    /// Entities from the seed to `entity`, inclusive.
    pub path: Vec<EntityId>,
}

/// `Greater` when `a` is the better representative: higher effective
/// percentage first, then fewer hops.
pub fn rank(a: &Contribution, b: &Contribution) -> Ordering {
    a.effective
        .total_cmp(&b.effective)
        .then_with(|| b.hops.cmp(&a.hops))
}

/// Running aggregate of every contribution that reached one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAggregate {
    best: Contribution,
    total: Percentage,
    min_hops: u8,
    path_count: usize,
}

impl NodeAggregate {
    pub fn new(first: Contribution) -> Self {
        Self {
            total: first.effective,
            min_hops: first.hops,
            path_count: 1,
            best: first,
        }
    }

    /// Fold in another contribution. Ties keep the earlier one, so the
    /// outcome depends only on the order contributions arrive in.
    pub fn absorb(&mut self, next: Contribution) {
        self.total = self.total.saturating_add(next.effective);
        self.min_hops = self.min_hops.min(next.hops);
        self.path_count += 1;
        if rank(&next, &self.best) == Ordering::Greater {
            self.best = next;
        }
    }

    pub fn headline(&self, mode: AggregationMode) -> Percentage {
        match mode {
            AggregationMode::Strongest => self.best.effective,
            AggregationMode::Summed => self.total,
        }
    }

    pub fn best(&self) -> &Contribution {
        &self.best
    }

    pub fn min_hops(&self) -> u8 {
        self.min_hops
    }

    pub fn path_count(&self) -> usize {
        self.path_count
    }
}

/// Combine a set of contributions to the same entity.
pub fn combine(mode: AggregationMode, contributions: &[Contribution]) -> Option<Percentage> {
    let (first, rest) = contributions.split_first()?;
    let mut agg = NodeAggregate::new(first.clone());
    for c in rest {
        agg.absorb(c.clone());
    }
    Some(agg.headline(mode))
}
