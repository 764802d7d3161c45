//! ColonySim Core - Tile-World Colony Simulation Engine
//!
//! An ECS-based simulation of autonomous actors on a tile grid. Actors claim
//! work orders (designations), plan paths in budgeted slices, and carry out
//! jobs that reshape the world: harvesting, digging, building and hauling.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Actors, items, interactables, containers
//! - **Components**: Pure data attached to entities (GridPos, Mover, HeldItems, etc.)
//! - **States**: Each actor runs the top of its own state stack when its
//!   scheduled tick comes round
//!
//! Connectivity, path search and spatial lookup come from `colonysim-logic`.
//!
//! # Example
//!
//! ```rust,no_run
//! use colonysim_core::prelude::*;
//!
//! let templates = Templates::builtin().unwrap();
//! let layout = generate_cave(&CaveConfig::default(), &templates).unwrap();
//! let start = layout.open_tiles().next().unwrap();
//! let mut engine = SimulationEngine::new(SimConfig::default(), templates, layout).unwrap();
//!
//! engine.spawn_actor("settler", start).unwrap();
//! engine.run(1_000).unwrap();
//! ```

pub mod components;
pub mod config;
pub mod designation;
pub mod engine;
pub mod error;
pub mod generation;
pub mod jobs;
pub mod recording;
pub mod scheduler;
pub mod states;
pub mod templates;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::designation::{DesignationId, DesignationKind, DesignationStatus, HaulTarget};
    pub use crate::engine::SimulationEngine;
    pub use crate::error::EngineError;
    pub use crate::generation::{generate_cave, CaveConfig, WorldLayout};
    pub use crate::recording::{ChangeEvent, ChangeLog};
    pub use crate::templates::{ActionType, Templates};
}
