//! Expansion parameters and their validation.

use crate::error::NetworkError;
use crate::model::{Direction, EntityId};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const MAX_HOPS_RANGE: RangeInclusive<u8> = 1..=8;
pub const MIN_PERCENTAGE_RANGE: RangeInclusive<f64> = 0.0..=50.0;

pub const DEFAULT_MAX_HOPS: u8 = 3;
pub const DEFAULT_MIN_PERCENTAGE: f64 = 0.1;

/// One `expandNetwork` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandRequest {
    pub seed: EntityId,
    pub max_hops: u8,
    pub min_percentage: f64,
    pub direction: Direction,
}

impl ExpandRequest {
    pub fn new(seed: impl Into<EntityId>) -> Self {
        Self {
            seed: seed.into(),
            max_hops: DEFAULT_MAX_HOPS,
            min_percentage: DEFAULT_MIN_PERCENTAGE,
            direction: Direction::default(),
        }
    }

    pub fn max_hops(mut self, max_hops: u8) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn min_percentage(mut self, min_percentage: f64) -> Self {
        self.min_percentage = min_percentage;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Fast-fail check run before any store access.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.seed.trim().is_empty() {
            return Err(NetworkError::InvalidParameters(
                "seed id must not be empty".to_string(),
            ));
        }
        if !MAX_HOPS_RANGE.contains(&self.max_hops) {
            return Err(NetworkError::InvalidParameters(format!(
                "max_hops must be within {}..={}, got {}",
                MAX_HOPS_RANGE.start(),
                MAX_HOPS_RANGE.end(),
                self.max_hops
            )));
        }
        if !self.min_percentage.is_finite() || !MIN_PERCENTAGE_RANGE.contains(&self.min_percentage)
        {
            return Err(NetworkError::InvalidParameters(format!(
                "min_percentage must be within {}..={}, got {}",
                MIN_PERCENTAGE_RANGE.start(),
                MIN_PERCENTAGE_RANGE.end(),
                self.min_percentage
            )));
        }
        Ok(())
    }
}
