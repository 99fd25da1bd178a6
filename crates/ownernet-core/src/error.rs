//! Failure taxonomy for the expansion engine.
//!
//! Every failure propagates whole: an expansion either returns a complete
//! network or one of these errors, never a partial result.

use crate::model::EntityId;
use std::time::Duration;

/// Errors raised by a [`GraphAccess`](crate::port::GraphAccess) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("entity `{0}` not found")]
    NotFound(EntityId),
    #[error("graph store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The seed (or an entity referenced mid-traversal) is unknown to the store.
    #[error("entity `{0}` not found")]
    EntityNotFound(EntityId),
    /// Transient store failure. Expansions are side-effect free, so retrying is safe.
    #[error("graph store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("expansion exceeded its {0:?} budget")]
    ExpansionTimeout(Duration),
    #[error("expansion cancelled")]
    Cancelled,
    /// Rejected before any traversal starts.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

impl From<AccessError> for NetworkError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound(id) => NetworkError::EntityNotFound(id),
            AccessError::Unavailable(reason) => NetworkError::StoreUnavailable(reason),
        }
    }
}

impl NetworkError {
    /// `true` for failures a caller may retry unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetworkError::StoreUnavailable(_) | NetworkError::ExpansionTimeout(_)
        )
    }
}

pub type Result<T, E = NetworkError> = std::result::Result<T, E>;
