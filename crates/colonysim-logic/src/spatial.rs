//! Hierarchical region index for "nearest object of type X" queries.
//!
//! The world rectangle is split into a fixed-depth tree: level `i` nodes
//! split into `branching[i] x branching[i]` children (clamped to the node's
//! extent), with integer-division sizes and the remainder absorbed by the
//! last child on each axis. The shape is fixed at construction; only the
//! per-type counts and the leaf membership lists change.
//!
//! Nodes live in one arena `Vec` and refer to each other by index. Every
//! node keeps a count per object-type key equal to the sum of its
//! children's counts (or its own list lengths for leaves). A flat
//! cell -> leaf table resolves positions in O(1).
//!
//! `find_closest` prunes level by level: for each child with a nonzero
//! count it takes the [min, max] Manhattan distance interval to the child's
//! rectangle and keeps every child whose minimum does not exceed the
//! smallest maximum seen at that level. At the leaves, the surviving
//! members are compared by exact distance, ties going to leaf order and
//! then insertion order.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use log::debug;

use crate::error::SpatialError;
use crate::grid::{axis_gap, GridPos};

const ROOT: usize = 0;

#[derive(Debug, Clone)]
pub struct RegionNode<K, M> {
    /// Inclusive corners.
    pub top_left: GridPos,
    pub bottom_right: GridPos,
    pub level: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    counts: HashMap<K, usize>,
    /// Leaf only: members per key with their position.
    members: HashMap<K, Vec<(GridPos, M)>>,
}

impl<K: Eq + Hash, M> RegionNode<K, M> {
    fn new(top_left: GridPos, bottom_right: GridPos, level: usize, parent: Option<usize>) -> Self {
        Self {
            top_left,
            bottom_right,
            level,
            parent,
            children: Vec::new(),
            counts: HashMap::new(),
            members: HashMap::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn count(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        pos.x >= self.top_left.x
            && pos.x <= self.bottom_right.x
            && pos.y >= self.top_left.y
            && pos.y <= self.bottom_right.y
    }

    /// Smallest and largest Manhattan distance from `point` to any cell of
    /// this region.
    pub fn distance_bounds(&self, point: GridPos) -> (u32, u32) {
        let min = axis_gap(point.x, self.top_left.x, self.bottom_right.x)
            + axis_gap(point.y, self.top_left.y, self.bottom_right.y);
        let max = point
            .x
            .abs_diff(self.top_left.x)
            .max(point.x.abs_diff(self.bottom_right.x))
            + point
                .y
                .abs_diff(self.top_left.y)
                .max(point.y.abs_diff(self.bottom_right.y));
        (min, max)
    }

    fn bump(&mut self, key: &K, delta: isize)
    where
        K: Clone,
    {
        let entry = self.counts.entry(key.clone()).or_insert(0);
        *entry = entry.saturating_add_signed(delta);
        if *entry == 0 {
            self.counts.remove(key);
        }
    }
}

/// Arena-backed region tree keyed by object type `K`, holding members `M`.
#[derive(Debug, Clone)]
pub struct SpatialTree<K, M> {
    width: i32,
    height: i32,
    nodes: Vec<RegionNode<K, M>>,
    leaf_lookup: Vec<usize>,
}

impl<K, M> SpatialTree<K, M>
where
    K: Eq + Hash + Clone + Debug,
    M: Copy + PartialEq + Debug,
{
    /// Build the tree for a `width x height` world. `branching[i]` is the
    /// per-axis split factor applied at level `i`; an empty slice yields a
    /// single leaf covering the whole world.
    pub fn initialise(width: u32, height: u32, branching: &[u32]) -> Result<Self, SpatialError> {
        if width == 0 || height == 0 {
            return Err(SpatialError::InvalidShape(format!(
                "world size {width}x{height} is empty"
            )));
        }
        if let Some(level) = branching.iter().position(|b| *b == 0) {
            return Err(SpatialError::InvalidShape(format!(
                "branching factor at level {level} is zero"
            )));
        }

        let mut tree = Self {
            width: width as i32,
            height: height as i32,
            nodes: vec![RegionNode::new(
                GridPos::new(0, 0),
                GridPos::new(width as i32 - 1, height as i32 - 1),
                0,
                None,
            )],
            leaf_lookup: vec![ROOT; (width * height) as usize],
        };
        tree.subdivide(ROOT, branching);
        debug!(
            "spatial tree {}x{} with {} nodes over {} levels",
            width,
            height,
            tree.nodes.len(),
            branching.len()
        );
        Ok(tree)
    }

    fn subdivide(&mut self, idx: usize, branching: &[u32]) {
        let Some((&factor, deeper)) = branching.split_first() else {
            self.register_leaf(idx);
            return;
        };
        let (tl, br, level) = {
            let node = &self.nodes[idx];
            (node.top_left, node.bottom_right, node.level)
        };
        let xs = split_axis(tl.x, br.x, factor);
        let ys = split_axis(tl.y, br.y, factor);

        for &(y0, y1) in &ys {
            for &(x0, x1) in &xs {
                let child = self.nodes.len();
                self.nodes.push(RegionNode::new(
                    GridPos::new(x0, y0),
                    GridPos::new(x1, y1),
                    level + 1,
                    Some(idx),
                ));
                self.nodes[idx].children.push(child);
                self.subdivide(child, deeper);
            }
        }
    }

    fn register_leaf(&mut self, idx: usize) {
        let (tl, br) = (self.nodes[idx].top_left, self.nodes[idx].bottom_right);
        for y in tl.y..=br.y {
            for x in tl.x..=br.x {
                let cell = (y * self.width + x) as usize;
                self.leaf_lookup[cell] = idx;
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, idx: usize) -> Option<&RegionNode<K, M>> {
        self.nodes.get(idx)
    }

    /// The leaf node whose region contains `pos`.
    pub fn leaf_of(&self, pos: GridPos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return None;
        }
        self.leaf_lookup
            .get((pos.y * self.width + pos.x) as usize)
            .copied()
    }

    /// World-wide count of objects of `key`.
    pub fn count(&self, key: &K) -> usize {
        self.region_count(ROOT, key)
    }

    pub fn region_count(&self, node: usize, key: &K) -> usize {
        self.nodes.get(node).map(|n| n.count(key)).unwrap_or(0)
    }

    /// Members of `key` registered in a leaf, with their positions.
    pub fn leaf_members(&self, leaf: usize, key: &K) -> &[(GridPos, M)] {
        self.nodes
            .get(leaf)
            .and_then(|n| n.members.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add(&mut self, pos: GridPos, key: K, member: M) -> Result<(), SpatialError> {
        let leaf = self.leaf_of(pos).ok_or(SpatialError::OutOfBounds(pos))?;
        self.nodes[leaf]
            .members
            .entry(key.clone())
            .or_default()
            .push((pos, member));
        self.propagate(leaf, &key, 1);
        Ok(())
    }

    pub fn remove(&mut self, pos: GridPos, key: &K, member: M) -> Result<(), SpatialError> {
        let leaf = self.leaf_of(pos).ok_or(SpatialError::OutOfBounds(pos))?;
        let list = self.nodes[leaf]
            .members
            .get_mut(key)
            .ok_or(SpatialError::MemberMissing(pos))?;
        let at = list
            .iter()
            .position(|(_, m)| *m == member)
            .ok_or(SpatialError::MemberMissing(pos))?;
        list.remove(at);
        if list.is_empty() {
            self.nodes[leaf].members.remove(key);
        }
        self.propagate(leaf, key, -1);
        Ok(())
    }

    /// Relocate a member. Counts are untouched when both positions fall in
    /// the same leaf; only the stored position is updated.
    pub fn move_member(
        &mut self,
        old: GridPos,
        new: GridPos,
        key: &K,
        member: M,
    ) -> Result<(), SpatialError> {
        let from = self.leaf_of(old).ok_or(SpatialError::OutOfBounds(old))?;
        let to = self.leaf_of(new).ok_or(SpatialError::OutOfBounds(new))?;
        if from == to {
            let entry = self.nodes[from]
                .members
                .get_mut(key)
                .and_then(|list| list.iter_mut().find(|(_, m)| *m == member))
                .ok_or(SpatialError::MemberMissing(old))?;
            entry.0 = new;
            return Ok(());
        }
        self.remove(old, key, member)?;
        self.add(new, key.clone(), member)
    }

    /// Nearest member of `key` to `point` by Manhattan distance.
    pub fn find_closest(&self, point: GridPos, key: &K) -> Result<(GridPos, M), SpatialError> {
        if self.count(key) == 0 {
            return Err(SpatialError::NotFound);
        }

        let mut frontier = vec![ROOT];
        while frontier.iter().any(|idx| !self.nodes[*idx].is_leaf()) {
            let candidates: Vec<(usize, u32, u32)> = frontier
                .iter()
                .flat_map(|idx| self.nodes[*idx].children.iter().copied())
                .filter(|child| self.nodes[*child].count(key) > 0)
                .map(|child| {
                    let (min, max) = self.nodes[child].distance_bounds(point);
                    (child, min, max)
                })
                .collect();
            let Some(bound) = candidates.iter().map(|(_, _, max)| *max).min() else {
                return Err(SpatialError::NotFound);
            };
            frontier = candidates
                .into_iter()
                .filter(|(_, min, _)| *min <= bound)
                .map(|(idx, _, _)| idx)
                .collect();
        }

        let mut best: Option<(u32, GridPos, M)> = None;
        for leaf in frontier {
            for (pos, member) in self.leaf_members(leaf, key) {
                let d = point.manhattan(*pos);
                if best.map_or(true, |(bd, _, _)| d < bd) {
                    best = Some((d, *pos, *member));
                }
            }
        }
        best.map(|(_, pos, member)| (pos, member))
            .ok_or(SpatialError::NotFound)
    }

    fn propagate(&mut self, leaf: usize, key: &K, delta: isize) {
        let mut cursor = Some(leaf);
        while let Some(idx) = cursor {
            let node = &mut self.nodes[idx];
            node.bump(key, delta);
            cursor = node.parent;
        }
    }
}

/// Split `[lo, hi]` into at most `factor` contiguous ranges.
fn split_axis(lo: i32, hi: i32, factor: u32) -> Vec<(i32, i32)> {
    let extent = hi - lo + 1;
    let parts = (factor as i32).min(extent).max(1);
    let size = extent / parts;
    (0..parts)
        .map(|i| {
            let start = lo + i * size;
            let end = if i == parts - 1 { hi } else { start + size - 1 };
            (start, end)
        })
        .collect()
}
