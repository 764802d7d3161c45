//! Error types for the grid algorithms.
//!
//! Expected absence (`NotFound`) is kept apart from contract violations
//! such as out-of-bounds positions so callers can match on it.

use thiserror::Error;

use crate::grid::GridPos;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("position {0} is outside the grid")]
    OutOfBounds(GridPos),
}

/// Failures reported by [`crate::search::Pathfinder`] and
/// [`crate::search::FillFinder`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("no search has been started")]
    NotInitialised,
    #[error("search has not reached a terminal state yet")]
    StillSearching,
    #[error("open set exhausted before reaching a goal")]
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpatialError {
    #[error("no object of the requested type is indexed")]
    NotFound,
    #[error("position {0} is outside the indexed world")]
    OutOfBounds(GridPos),
    #[error("member is not registered at {0}")]
    MemberMissing(GridPos),
    #[error("invalid tree shape: {0}")]
    InvalidShape(String),
}
