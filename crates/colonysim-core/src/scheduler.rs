//! Time-ordered wake list.
//!
//! Every schedulable entity holds exactly one pending wake. Entities due on
//! the same tick come out in the order they were scheduled, so a run is
//! fully determined by its inputs.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use hecs::Entity;

#[derive(Debug, Clone, Copy)]
struct Wake {
    tick: u64,
    seq: u64,
    entity: Entity,
}

impl PartialEq for Wake {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Wake {}

impl PartialOrd for Wake {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Wake {
    // `seq` is unique, so the entity never takes part in the ordering.
    fn cmp(&self, other: &Self) -> Ordering {
        self.tick
            .cmp(&other.tick)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap of `(tick, insertion order) -> entity`.
#[derive(Debug, Clone, Default)]
pub struct WakeList {
    heap: BinaryHeap<Reverse<Wake>>,
    seq: u64,
}

impl WakeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake `entity` on `tick`.
    pub fn schedule(&mut self, entity: Entity, tick: u64) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Reverse(Wake { tick, seq, entity }));
    }

    /// Pop the next entity due on or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<Entity> {
        if self.heap.peek()?.0.tick > now {
            return None;
        }
        self.heap.pop().map(|Reverse(wake)| wake.entity)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
