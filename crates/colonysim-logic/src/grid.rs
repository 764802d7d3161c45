//! Tile grid model: positions, cardinal directions, tiles and the
//! `GridDomain` trait the searches run over.
//!
//! Tiles are created once per world cell and never destroyed. Only the
//! accessibility flag, the area identifier and the occupant list change
//! at runtime.

use serde::{Deserialize, Serialize};

use crate::areas::AreaId;
use crate::error::GridError;

/// Integer tile coordinate. `y` grows downward (row index).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position one step away in `dir`. Not bounds-checked.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal direction of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Expansion order used by every search. Changing it changes tie-breaking.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    const fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }
}

/// Distance from `v` to the closed interval `[lo, hi]`.
pub(crate) fn axis_gap(v: i32, lo: i32, hi: i32) -> u32 {
    if v < lo {
        lo.abs_diff(v)
    } else if v > hi {
        v.abs_diff(hi)
    } else {
        0
    }
}

/// Apply a direction sequence to a start position.
pub fn apply_directions(start: GridPos, directions: &[Direction]) -> GridPos {
    directions.iter().fold(start, |pos, dir| pos.step(*dir))
}

/// A grid-like domain the incremental searches can walk.
pub trait GridDomain {
    /// The position reached by stepping `dir` from `from`, if that
    /// position exists and can be entered.
    fn passable_step(&self, from: GridPos, dir: Direction) -> Option<GridPos>;

    /// Cost of moving between two adjacent positions.
    fn step_cost(&self, _from: GridPos, _to: GridPos) -> u32 {
        1
    }
}

/// One world cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub pos: GridPos,
    pub accessible: bool,
    pub area: AreaId,
    /// Cardinal neighbours in `Direction::ALL` order, `None` at world edges.
    pub adjacent: [Option<GridPos>; 4],
    /// Opaque ids of the actors standing on this tile.
    pub occupants: Vec<u64>,
}

impl Tile {
    pub fn neighbour(&self, dir: Direction) -> Option<GridPos> {
        self.adjacent[dir.index()]
    }
}

/// Row-major tile storage with fixed dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGrid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Build a grid, asking `accessible` for every cell.
    pub fn from_fn(width: u32, height: u32, mut accessible: impl FnMut(GridPos) -> bool) -> Self {
        let w = width as i32;
        let h = height as i32;
        let mut tiles = Vec::with_capacity((width * height) as usize);
        for y in 0..h {
            for x in 0..w {
                let pos = GridPos::new(x, y);
                let mut adjacent = [None; 4];
                for dir in Direction::ALL {
                    let next = pos.step(dir);
                    if next.x >= 0 && next.y >= 0 && next.x < w && next.y < h {
                        adjacent[dir.index()] = Some(next);
                    }
                }
                tiles.push(Tile {
                    pos,
                    accessible: accessible(pos),
                    area: AreaId::WALL,
                    adjacent,
                    occupants: Vec::new(),
                });
            }
        }
        Self {
            width: w,
            height: h,
            tiles,
        }
    }

    /// A grid where every tile is accessible.
    pub fn open(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_| true)
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    pub fn tile(&self, pos: GridPos) -> Option<&Tile> {
        let idx = self.index(pos)?;
        self.tiles.get(idx)
    }

    pub fn tile_mut(&mut self, pos: GridPos) -> Option<&mut Tile> {
        let idx = self.index(pos)?;
        self.tiles.get_mut(idx)
    }

    /// Like [`TileGrid::tile_mut`] but reports out-of-bounds as an error.
    pub fn try_tile_mut(&mut self, pos: GridPos) -> Result<&mut Tile, GridError> {
        self.tile_mut(pos).ok_or(GridError::OutOfBounds(pos))
    }

    pub fn is_accessible(&self, pos: GridPos) -> bool {
        self.tile(pos).map(|t| t.accessible).unwrap_or(false)
    }

    pub fn area_of(&self, pos: GridPos) -> AreaId {
        self.tile(pos).map(|t| t.area).unwrap_or(AreaId::WALL)
    }

    /// All tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// In-bounds cardinal neighbours of `pos`.
    pub fn neighbours(&self, pos: GridPos) -> impl Iterator<Item = GridPos> + '_ {
        self.tile(pos)
            .into_iter()
            .flat_map(|t| t.adjacent.iter().flatten().copied())
    }

    /// Accessible cardinal neighbours of `pos`.
    pub fn accessible_neighbours(&self, pos: GridPos) -> impl Iterator<Item = GridPos> + '_ {
        self.neighbours(pos).filter(|p| self.is_accessible(*p))
    }

    pub fn add_occupant(&mut self, pos: GridPos, occupant: u64) -> Result<(), GridError> {
        let tile = self.try_tile_mut(pos)?;
        if !tile.occupants.contains(&occupant) {
            tile.occupants.push(occupant);
        }
        Ok(())
    }

    pub fn remove_occupant(&mut self, pos: GridPos, occupant: u64) -> Result<(), GridError> {
        let tile = self.try_tile_mut(pos)?;
        tile.occupants.retain(|o| *o != occupant);
        Ok(())
    }
}

impl GridDomain for TileGrid {
    fn passable_step(&self, from: GridPos, dir: Direction) -> Option<GridPos> {
        let next = self.tile(from)?.neighbour(dir)?;
        self.is_accessible(next).then_some(next)
    }
}
