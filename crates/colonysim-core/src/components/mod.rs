//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities. Behaviour lives
//! in the actor states and the engine.

mod actors;
mod items;

pub use actors::*;
pub use items::*;

/// Tile position of an entity that is physically present in the world.
/// Items carried or stored somewhere have no `GridPos` component.
pub use colonysim_logic::GridPos;
