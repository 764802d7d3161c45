//! Generation - world layouts from ASCII maps or a seeded cave generator.

mod cave;
mod layout;

pub use cave::*;
pub use layout::*;
