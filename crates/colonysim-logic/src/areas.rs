//! Connectivity areas: the partition of accessible tiles into mutually
//! reachable groups.
//!
//! `AreaManager::build` floods every ungrouped accessible tile once at
//! world construction. Afterwards `set_accessible` keeps the partition
//! current one tile flip at a time:
//!
//! - **opening** a tile joins it to its neighbours' area, merging
//!   neighbouring areas if they differ (larger absorbs smaller, equal sizes
//!   keep the lower id);
//! - **closing** a tile moves it to the wall area and re-floods from each
//!   former neighbour. If the old area fell apart, the largest piece keeps
//!   the old id and every other piece gets a fresh one.
//!
//! Area ids are never reused. An area emptied by a merge keeps its id
//! retired with zero members.

use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::grid::{GridPos, TileGrid};
use crate::search::FillFinder;

/// Identifier of a connectivity area. Inaccessible tiles carry [`AreaId::WALL`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AreaId(pub i32);

impl AreaId {
    pub const WALL: AreaId = AreaId(-1);

    pub fn is_wall(self) -> bool {
        self == Self::WALL
    }
}

impl std::fmt::Display for AreaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_wall() {
            write!(f, "wall")
        } else {
            write!(f, "area#{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    members: BTreeSet<GridPos>,
}

impl Area {
    fn new(id: AreaId) -> Self {
        Self {
            id,
            members: BTreeSet::new(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        self.members.contains(&pos)
    }
}

/// What a single accessibility flip did to the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaChange {
    /// The tile already had the requested accessibility.
    Unchanged,
    /// An isolated tile opened and received a fresh area.
    Created(AreaId),
    /// The tile opened next to exactly one area and joined it.
    Joined(AreaId),
    /// The tile opened between several areas which were merged.
    Merged {
        survivor: AreaId,
        absorbed: Vec<AreaId>,
    },
    /// The tile closed without disconnecting its old area.
    Removed(AreaId),
    /// The tile closed and its old area fell apart.
    Split { original: AreaId, pieces: Vec<AreaId> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaManager {
    areas: Vec<Area>,
}

impl AreaManager {
    /// Partition every accessible tile of `grid` and write the area ids
    /// into the tiles. Inaccessible tiles are set to [`AreaId::WALL`].
    pub fn build(grid: &mut TileGrid) -> Self {
        let mut manager = Self::default();
        let mut fill = FillFinder::new();
        let width = grid.width() as i32;
        let height = grid.height() as i32;

        for y in 0..height {
            for x in 0..width {
                if let Some(tile) = grid.tile_mut(GridPos::new(x, y)) {
                    tile.area = AreaId::WALL;
                }
            }
        }

        for y in 0..height {
            for x in 0..width {
                let pos = GridPos::new(x, y);
                if !grid.is_accessible(pos) || !grid.area_of(pos).is_wall() {
                    continue;
                }
                fill.new_fill(pos);
                fill.run_to_completion(&*grid);
                let component = fill.visited().map(<[GridPos]>::to_vec).unwrap_or_default();
                let id = manager.fresh_area();
                manager.assign(grid, id, component);
            }
        }

        info!(
            "partitioned {}x{} grid into {} areas",
            width,
            height,
            manager.areas.len()
        );
        manager
    }

    pub fn area(&self, id: AreaId) -> Option<&Area> {
        usize::try_from(id.0).ok().and_then(|i| self.areas.get(i))
    }

    /// Number of ids ever handed out, including retired ones.
    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    /// Areas that still have members.
    pub fn live_areas(&self) -> impl Iterator<Item = &Area> {
        self.areas.iter().filter(|a| a.member_count() > 0)
    }

    /// True if both positions are accessible and in the same area.
    pub fn reachable(grid: &TileGrid, a: GridPos, b: GridPos) -> bool {
        let area = grid.area_of(a);
        !area.is_wall() && area == grid.area_of(b)
    }

    /// Flip a tile's accessibility and repair the partition.
    pub fn set_accessible(
        &mut self,
        grid: &mut TileGrid,
        pos: GridPos,
        accessible: bool,
    ) -> Result<AreaChange, GridError> {
        let tile = grid.try_tile_mut(pos)?;
        if tile.accessible == accessible {
            return Ok(AreaChange::Unchanged);
        }
        tile.accessible = accessible;
        let change = if accessible {
            self.open_tile(grid, pos)
        } else {
            self.close_tile(grid, pos)
        };
        debug!("tile {} accessible={} -> {:?}", pos, accessible, change);
        Ok(change)
    }

    /// Merge two areas. The one with more members survives; on a tie the
    /// lower id survives. Returns the survivor.
    pub fn merge(&mut self, grid: &mut TileGrid, a: AreaId, b: AreaId) -> AreaId {
        if a == b {
            return a;
        }
        let count = |id: AreaId| self.area(id).map(Area::member_count).unwrap_or(0);
        let (survivor, absorbed) = match count(a).cmp(&count(b)) {
            std::cmp::Ordering::Greater => (a, b),
            std::cmp::Ordering::Less => (b, a),
            std::cmp::Ordering::Equal => (a.min(b), a.max(b)),
        };
        let moved = match self.area_mut(absorbed) {
            Some(area) => std::mem::take(&mut area.members),
            None => return survivor,
        };
        self.assign(grid, survivor, moved);
        survivor
    }

    fn open_tile(&mut self, grid: &mut TileGrid, pos: GridPos) -> AreaChange {
        let mut neighbour_areas: Vec<AreaId> = Vec::new();
        for n in grid.accessible_neighbours(pos) {
            let area = grid.area_of(n);
            if !area.is_wall() && !neighbour_areas.contains(&area) {
                neighbour_areas.push(area);
            }
        }

        let Some((&first, rest)) = neighbour_areas.split_first() else {
            let id = self.fresh_area();
            self.assign(grid, id, [pos]);
            return AreaChange::Created(id);
        };

        let mut survivor = first;
        for other in rest {
            survivor = self.merge(grid, survivor, *other);
        }
        self.assign(grid, survivor, [pos]);

        if rest.is_empty() {
            AreaChange::Joined(survivor)
        } else {
            let absorbed = neighbour_areas
                .iter()
                .copied()
                .filter(|id| *id != survivor)
                .collect();
            AreaChange::Merged { survivor, absorbed }
        }
    }

    fn close_tile(&mut self, grid: &mut TileGrid, pos: GridPos) -> AreaChange {
        let original = grid.area_of(pos);
        if let Some(tile) = grid.tile_mut(pos) {
            tile.area = AreaId::WALL;
        }
        if let Some(area) = self.area_mut(original) {
            area.members.remove(&pos);
        }
        if original.is_wall() {
            return AreaChange::Unchanged;
        }

        let seeds: Vec<GridPos> = grid
            .accessible_neighbours(pos)
            .filter(|n| grid.area_of(*n) == original)
            .collect();
        if seeds.len() < 2 {
            return AreaChange::Removed(original);
        }

        let mut components: Vec<Vec<GridPos>> = Vec::new();
        let mut fill = FillFinder::new();
        for seed in seeds {
            if components.iter().any(|c| c.contains(&seed)) {
                continue;
            }
            fill.new_fill(seed);
            fill.run_to_completion(&*grid);
            components.push(fill.visited().map(<[GridPos]>::to_vec).unwrap_or_default());
        }
        if components.len() < 2 {
            return AreaChange::Removed(original);
        }

        let keep = components
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.len().cmp(&b.len()).then(ib.cmp(ia)))
            .map(|(i, _)| i)
            .unwrap_or(0);

        let mut pieces = vec![original];
        for (i, component) in components.into_iter().enumerate() {
            if i == keep {
                continue;
            }
            if let Some(area) = self.area_mut(original) {
                for p in &component {
                    area.members.remove(p);
                }
            }
            let id = self.fresh_area();
            self.assign(grid, id, component);
            pieces.push(id);
        }
        AreaChange::Split { original, pieces }
    }

    fn fresh_area(&mut self) -> AreaId {
        let id = AreaId(self.areas.len() as i32);
        self.areas.push(Area::new(id));
        id
    }

    fn area_mut(&mut self, id: AreaId) -> Option<&mut Area> {
        usize::try_from(id.0).ok().and_then(|i| self.areas.get_mut(i))
    }

    fn assign(&mut self, grid: &mut TileGrid, id: AreaId, positions: impl IntoIterator<Item = GridPos>) {
        let Some(area) = self.area_mut(id) else {
            return;
        };
        for pos in positions {
            if let Some(tile) = grid.tile_mut(pos) {
                tile.area = id;
                area.members.insert(pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(pattern: &str) -> TileGrid {
        let bytes = pattern.as_bytes();
        TileGrid::from_fn(bytes.len() as u32, 1, |p| bytes[p.x as usize] == b'.')
    }

    #[test]
    fn test_build_partitions_components() {
        let mut grid = line("..#...#.");
        let areas = AreaManager::build(&mut grid);
        assert_eq!(areas.area_count(), 3);
        assert_eq!(grid.area_of(GridPos::new(0, 0)), grid.area_of(GridPos::new(1, 0)));
        assert_ne!(grid.area_of(GridPos::new(1, 0)), grid.area_of(GridPos::new(3, 0)));
        assert!(grid.area_of(GridPos::new(2, 0)).is_wall());
        let sizes: Vec<usize> = areas.live_areas().map(Area::member_count).collect();
        assert_eq!(sizes, vec![2, 3, 1]);
    }

    #[test]
    fn test_merge_larger_absorbs_smaller() {
        let mut grid = line("...#.....");
        let mut areas = AreaManager::build(&mut grid);
        let a = grid.area_of(GridPos::new(0, 0));
        let b = grid.area_of(GridPos::new(5, 0));
        let survivor = areas.merge(&mut grid, a, b);
        assert_eq!(survivor, b);
        assert_eq!(areas.area(b).unwrap().member_count(), 8);
        assert_eq!(areas.area(a).unwrap().member_count(), 0);
        assert_eq!(grid.area_of(GridPos::new(1, 0)), b);
    }

    #[test]
    fn test_merge_tie_keeps_lower_id() {
        let mut grid = line("..#..");
        let mut areas = AreaManager::build(&mut grid);
        let survivor = areas.merge(&mut grid, AreaId(1), AreaId(0));
        assert_eq!(survivor, AreaId(0));
    }

    #[test]
    fn test_opening_tile_merges_neighbours() {
        let mut grid = line("...#.....");
        let mut areas = AreaManager::build(&mut grid);
        let b = grid.area_of(GridPos::new(5, 0));
        let change = areas
            .set_accessible(&mut grid, GridPos::new(3, 0), true)
            .unwrap();
        assert_eq!(
            change,
            AreaChange::Merged {
                survivor: b,
                absorbed: vec![AreaId(0)]
            }
        );
        assert_eq!(areas.area(b).unwrap().member_count(), 9);
        assert!(grid.tiles().all(|t| t.area == b));
    }

    #[test]
    fn test_opening_isolated_tile_creates_area() {
        let mut grid = line("#####");
        let mut areas = AreaManager::build(&mut grid);
        assert_eq!(areas.area_count(), 0);
        let change = areas
            .set_accessible(&mut grid, GridPos::new(2, 0), true)
            .unwrap();
        assert_eq!(change, AreaChange::Created(AreaId(0)));
        assert_eq!(
            areas.set_accessible(&mut grid, GridPos::new(2, 0), true).unwrap(),
            AreaChange::Unchanged
        );
    }

    #[test]
    fn test_closing_tile_splits_area() {
        let mut grid = line(".....");
        let mut areas = AreaManager::build(&mut grid);
        let change = areas
            .set_accessible(&mut grid, GridPos::new(2, 0), false)
            .unwrap();
        assert_eq!(
            change,
            AreaChange::Split {
                original: AreaId(0),
                pieces: vec![AreaId(0), AreaId(1)]
            }
        );
        // Equal halves: the piece found first (east of the wall) keeps the id.
        assert_eq!(grid.area_of(GridPos::new(4, 0)), AreaId(0));
        assert_eq!(grid.area_of(GridPos::new(0, 0)), AreaId(1));
        assert!(grid.area_of(GridPos::new(2, 0)).is_wall());
        assert_eq!(areas.area(AreaId(0)).unwrap().member_count(), 2);
        assert!(!AreaManager::reachable(&grid, GridPos::new(0, 0), GridPos::new(4, 0)));
    }

    #[test]
    fn test_closing_tile_without_split() {
        let mut grid = TileGrid::open(3, 3);
        let mut areas = AreaManager::build(&mut grid);
        let change = areas
            .set_accessible(&mut grid, GridPos::new(1, 1), false)
            .unwrap();
        assert_eq!(change, AreaChange::Removed(AreaId(0)));
        assert_eq!(areas.area(AreaId(0)).unwrap().member_count(), 8);
    }
}
