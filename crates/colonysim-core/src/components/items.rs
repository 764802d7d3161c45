//! Item, interactable and container components.

use hecs::Entity;
use serde::{Deserialize, Serialize};

/// A movable object. `kind` is its item template name and its spatial key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub kind: String,
}

/// The inventory or actor an item currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredIn(pub Entity);

/// A fixed world object created from an interactable template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interactable {
    pub kind: String,
}

/// Yields items when harvested and slowly regrows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harvestable {
    pub yields: String,
    pub yield_amount: u32,
    pub remaining: u32,
    pub capacity: u32,
    pub regrow_interval: u64,
}

impl Harvestable {
    pub fn is_depleted(&self) -> bool {
        self.remaining == 0
    }

    /// Take one harvest. Returns false when nothing is left.
    pub fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Regrow one harvest. Returns true if anything changed.
    pub fn regrow(&mut self) -> bool {
        if self.remaining >= self.capacity {
            return false;
        }
        self.remaining += 1;
        true
    }
}

/// Marks an entity that stores items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container;

/// Items stored in an actor or container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub items: Vec<Entity>,
    pub capacity: Option<usize>,
}

impl Inventory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity: Some(capacity),
        }
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|c| self.items.len() >= c)
    }

    pub fn insert(&mut self, item: Entity) -> bool {
        if self.is_full() || self.items.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, item: Entity) -> bool {
        let before = self.items.len();
        self.items.retain(|e| *e != item);
        self.items.len() != before
    }
}
