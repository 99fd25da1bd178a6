//! Expansion configuration.
//!
//! Loaded from JSON (every field optional) and overridable per invocation.

use crate::aggregate::{AggregationMode, StructuralEdgePolicy};
use crate::error::NetworkError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Cap on distinct entities in a result, seed included.
    pub max_nodes: usize,
    /// Cap on distinct edges in a result.
    pub max_edges: usize,
    /// Cap on retained paths; dense graphs can have far more paths than nodes.
    pub max_paths: usize,
    /// Wall-clock budget for one expansion, in milliseconds. `0` disables it.
    pub timeout_ms: u64,
    /// Concurrent store fetches per frontier level.
    pub fetch_concurrency: usize,
    pub aggregation: AggregationMode,
    pub structural_edges: StructuralEdgePolicy,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_nodes: 2_000,
            max_edges: 10_000,
            max_paths: 100_000,
            timeout_ms: 10_000,
            fetch_concurrency: 16,
            aggregation: AggregationMode::default(),
            structural_edges: StructuralEdgePolicy::default(),
        }
    }
}

impl ExpansionConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.max_nodes == 0 || self.max_edges == 0 || self.max_paths == 0 {
            return Err(NetworkError::InvalidParameters(
                "max_nodes, max_edges and max_paths must be at least 1".to_string(),
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(NetworkError::InvalidParameters(
                "fetch_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
