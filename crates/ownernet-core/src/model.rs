//! Request-scoped views of the ownership graph.
//!
//! Everything here is materialized per request from the graph store and never
//! written back.

use crate::aggregate::Percentage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// External entity identifier, as assigned by the graph store.
pub type EntityId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Company,
    Unknown,
}

impl EntityKind {
    /// Map a store label (`Person`, `Company`, `Corporation`, ...) to a kind.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "person" | "individual" => Self::Person,
            "company" | "corporation" | "organisation" | "organization" => Self::Company,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Person => write!(f, "Person"),
            Self::Company => write!(f, "Company"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A person or company. Display attributes are opaque to the traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Direct shareholding; the only kind whose percentage is aggregated.
    Ownership,
    BoardPosition,
    Partnership,
    Other(String),
}

impl EdgeKind {
    /// Map a store relationship label (`OWNS`, `BOARD_MEMBER`, `PARTNER`, ...).
    pub fn from_label(label: &str) -> Self {
        match label {
            ownernet_store::REL_OWNS => Self::Ownership,
            ownernet_store::REL_BOARD_MEMBER => Self::BoardPosition,
            ownernet_store::REL_PARTNER => Self::Partnership,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_ownership(&self) -> bool {
        matches!(self, Self::Ownership)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ownership => write!(f, "owns"),
            Self::BoardPosition => write!(f, "board"),
            Self::Partnership => write!(f, "partner"),
            Self::Other(label) => write!(f, "{label}"),
        }
    }
}

/// A directed relationship `source -> target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipEdge {
    pub source: EntityId,
    pub target: EntityId,
    pub kind: EdgeKind,
    /// Present for ownership edges; structural kinds usually have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<Percentage>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl OwnershipEdge {
    pub fn ownership(source: &str, target: &str, percentage: Percentage) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind: EdgeKind::Ownership,
            percentage: Some(percentage),
            attributes: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            kind: self.kind.clone(),
        }
    }

    /// The entity on the far side of this edge when walked in `sweep` direction.
    pub fn peer(&self, sweep: Sweep) -> &str {
        match sweep {
            Sweep::Outgoing => &self.target,
            Sweep::Incoming => &self.source,
        }
    }
}

/// Edge identity for deduplication: one edge per (source, target, kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: EntityId,
    pub target: EntityId,
    pub kind: EdgeKind,
}

/// Which way to explore from the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// What the seed owns.
    #[default]
    Outgoing,
    /// Who owns the seed.
    Incoming,
    Both,
}

impl Direction {
    pub fn sweeps(self) -> &'static [Sweep] {
        match self {
            Self::Outgoing => &[Sweep::Outgoing],
            Self::Incoming => &[Sweep::Incoming],
            Self::Both => &[Sweep::Outgoing, Sweep::Incoming],
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outgoing" | "out" | "owns" => Ok(Self::Outgoing),
            "incoming" | "in" | "owners" => Ok(Self::Incoming),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown direction `{other}` (expected outgoing, incoming or both)"
            )),
        }
    }
}

/// A single directional sweep; `Direction::Both` runs two of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sweep {
    Outgoing,
    Incoming,
}

impl fmt::Display for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outgoing => write!(f, "outgoing"),
            Self::Incoming => write!(f, "incoming"),
        }
    }
}
