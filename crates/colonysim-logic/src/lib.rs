//! Pure grid algorithms for ColonySim.
//!
//! This crate contains the world-independent algorithms the simulation is
//! built on. Functions take plain data and return results, so everything
//! here is unit-testable without an ECS world or a scheduler.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`grid`] | Tile records, positions, directions, the `GridDomain` trait |
//! | [`search`] | Time-sliced A* pathfinder and flood fill |
//! | [`areas`] | Connectivity partition with incremental merge/split |
//! | [`spatial`] | Region tree for per-type counts and nearest-object queries |
//! | [`error`] | Typed failures for the above |

pub mod areas;
pub mod error;
pub mod grid;
pub mod search;
pub mod spatial;

pub use areas::{Area, AreaChange, AreaId, AreaManager};
pub use error::{GridError, SearchError, SpatialError};
pub use grid::{apply_directions, Direction, GridDomain, GridPos, Tile, TileGrid};
pub use search::{FillFinder, Goal, PathResult, PathfindRequest, Pathfinder, SearchState};
pub use spatial::{RegionNode, SpatialTree};
