//! Designations - work orders placed on the world that idle actors claim.
//!
//! A designation is claimed by at most one actor at a time. Claiming is
//! a single call on the board, so two actors scanning in the same tick can
//! never both hold it. A claimed designation describes the ordered steps
//! needed to satisfy it; the claimant runs them inside SatisfyDesignation.

use std::collections::BTreeMap;

use colonysim_logic::{AreaId, GridPos, TileGrid};
use hecs::{Entity, World};
use serde::{Deserialize, Serialize};

use crate::components::{Destination, Harvestable, Inventory};
use crate::error::{DesignationError, EngineError};
use crate::jobs::Job;
use crate::states::ActorState;
use crate::templates::ActionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DesignationId(pub u32);

impl std::fmt::Display for DesignationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where hauled items end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaulTarget {
    Ground(GridPos),
    Container(Entity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignationKind {
    Harvest { target: Entity },
    Dig { tile: GridPos },
    Build { tile: GridPos },
    Haul { item: Entity, to: HaulTarget },
}

impl DesignationKind {
    pub fn job_type(&self) -> ActionType {
        match self {
            DesignationKind::Harvest { .. } => ActionType::Harvest,
            DesignationKind::Dig { .. } => ActionType::Dig,
            DesignationKind::Build { .. } => ActionType::Build,
            DesignationKind::Haul { .. } => ActionType::Haul,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignationStatus {
    Unclaimed,
    Claimed(Entity),
    Completed,
}

impl DesignationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DesignationStatus::Unclaimed => "unclaimed",
            DesignationStatus::Claimed(_) => "claimed",
            DesignationStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Designation {
    pub id: DesignationId,
    pub kind: DesignationKind,
    pub status: DesignationStatus,
    pub created_at: u64,
}

/// Tiles next to `pos` an actor can stand on, plus `pos` itself when open.
fn standing_points(grid: &TileGrid, pos: GridPos, include_self: bool) -> Vec<GridPos> {
    let mut points = Vec::with_capacity(5);
    if include_self && grid.is_accessible(pos) {
        points.push(pos);
    }
    points.extend(grid.accessible_neighbours(pos));
    points
}

impl Designation {
    pub fn job_type(&self) -> ActionType {
        self.kind.job_type()
    }

    /// The item a haul designation moves.
    pub fn hauled_item(&self) -> Option<Entity> {
        match self.kind {
            DesignationKind::Haul { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Where the work starts. `None` if the target has left the world.
    pub fn anchor(&self, world: &World) -> Option<GridPos> {
        match self.kind {
            DesignationKind::Harvest { target: entity } | DesignationKind::Haul { item: entity, .. } => {
                world.get::<&GridPos>(entity).ok().map(|pos| *pos)
            }
            DesignationKind::Dig { tile } | DesignationKind::Build { tile } => Some(tile),
        }
    }

    /// Tiles an actor may stand on to start the work.
    pub fn access_points(&self, world: &World, grid: &TileGrid) -> Vec<GridPos> {
        let Some(anchor) = self.anchor(world) else {
            return Vec::new();
        };
        match self.kind {
            DesignationKind::Build { .. } => standing_points(grid, anchor, false),
            _ => standing_points(grid, anchor, true),
        }
    }

    /// Whether the target can still be worked on at all.
    fn target_ready(&self, world: &World) -> bool {
        match self.kind {
            DesignationKind::Harvest { target } => world
                .get::<&Harvestable>(target)
                .map(|h| !h.is_depleted())
                .unwrap_or(false),
            DesignationKind::Haul {
                to: HaulTarget::Container(container),
                ..
            } => world
                .get::<&Inventory>(container)
                .map(|inv| !inv.is_full())
                .unwrap_or(false),
            _ => true,
        }
    }

    /// True if unclaimed, asking for `job_type`, and workable from `area`.
    pub fn is_claimable(
        &self,
        world: &World,
        grid: &TileGrid,
        area: AreaId,
        job_type: ActionType,
        requester: GridPos,
    ) -> bool {
        if self.status != DesignationStatus::Unclaimed || self.job_type() != job_type {
            return false;
        }
        if area.is_wall() || !self.target_ready(world) {
            return false;
        }
        let can_start = self
            .access_points(world, grid)
            .into_iter()
            .any(|p| p == requester || grid.area_of(p) == area);
        if !can_start {
            return false;
        }
        match self.drop_off_points(world, grid) {
            Some(points) => points.into_iter().any(|p| grid.area_of(p) == area),
            None => true,
        }
    }

    /// Tiles a haul may finish on. `None` for work that ends where it starts.
    fn drop_off_points(&self, world: &World, grid: &TileGrid) -> Option<Vec<GridPos>> {
        match self.kind {
            DesignationKind::Haul {
                to: HaulTarget::Ground(pos),
                ..
            } => Some(vec![pos]),
            DesignationKind::Haul {
                to: HaulTarget::Container(container),
                ..
            } => Some(
                world
                    .get::<&GridPos>(container)
                    .map(|at| standing_points(grid, *at, true))
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }
}

/// Every designation ever placed, by id. Completed work is archived so
/// scans only walk what is still open.
#[derive(Debug, Clone, Default)]
pub struct DesignationBoard {
    pending: BTreeMap<DesignationId, Designation>,
    completed: BTreeMap<DesignationId, Designation>,
    next_id: u32,
}

impl DesignationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: DesignationKind, tick: u64) -> DesignationId {
        let id = DesignationId(self.next_id);
        self.next_id += 1;
        self.pending.insert(
            id,
            Designation {
                id,
                kind,
                status: DesignationStatus::Unclaimed,
                created_at: tick,
            },
        );
        id
    }

    pub fn get(&self, id: DesignationId) -> Option<&Designation> {
        self.pending.get(&id).or_else(|| self.completed.get(&id))
    }

    /// Pending designations first, then the archive, each in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Designation> {
        self.pending.values().chain(self.completed.values())
    }

    /// Designations not yet completed.
    pub fn pending(&self) -> impl Iterator<Item = &Designation> {
        self.pending.values()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Nearest claimable designation for any of `jobs`, by Manhattan
    /// distance from `requester`; ties go to the lowest id.
    pub fn find_claimable(
        &self,
        world: &World,
        grid: &TileGrid,
        area: AreaId,
        jobs: &[ActionType],
        requester: GridPos,
    ) -> Option<DesignationId> {
        self.pending()
            .filter(|d| {
                jobs.iter()
                    .any(|job| d.is_claimable(world, grid, area, *job, requester))
            })
            .filter_map(|d| d.anchor(world).map(|at| (at.manhattan(requester), d.id)))
            .min()
            .map(|(_, id)| id)
    }

    fn entry(&mut self, id: DesignationId) -> Result<&mut Designation, DesignationError> {
        if self.completed.contains_key(&id) {
            return Err(DesignationError::AlreadyCompleted(id));
        }
        self.pending
            .get_mut(&id)
            .ok_or(DesignationError::NotFound(id))
    }

    /// Claim for `actor`. Fails if anyone, including `actor`, holds it.
    pub fn assign(&mut self, id: DesignationId, actor: Entity) -> Result<(), DesignationError> {
        let designation = self.entry(id)?;
        match designation.status {
            DesignationStatus::Unclaimed => {
                designation.status = DesignationStatus::Claimed(actor);
                Ok(())
            }
            DesignationStatus::Claimed(holder) => Err(DesignationError::AlreadyClaimed { id, holder }),
            DesignationStatus::Completed => Err(DesignationError::AlreadyCompleted(id)),
        }
    }

    /// Give up a claim so someone else can take it.
    pub fn release(&mut self, id: DesignationId, actor: Entity) -> Result<(), DesignationError> {
        let designation = self.entry(id)?;
        if designation.status != DesignationStatus::Claimed(actor) {
            return Err(DesignationError::NotClaimedBy { id, actor });
        }
        designation.status = DesignationStatus::Unclaimed;
        Ok(())
    }

    /// Mark finished and move it out of the pending pool.
    pub fn complete(&mut self, id: DesignationId, actor: Entity) -> Result<(), DesignationError> {
        if self.entry(id)?.status != DesignationStatus::Claimed(actor) {
            return Err(DesignationError::NotClaimedBy { id, actor });
        }
        let Some(mut designation) = self.pending.remove(&id) else {
            return Err(DesignationError::NotFound(id));
        };
        designation.status = DesignationStatus::Completed;
        self.completed.insert(id, designation);
        Ok(())
    }

    /// The ordered steps that satisfy a designation, plus its job type.
    pub fn state_steps(
        &self,
        id: DesignationId,
        world: &World,
        grid: &TileGrid,
    ) -> Result<(ActionType, Vec<ActorState>), EngineError> {
        let designation = self.get(id).ok_or(DesignationError::NotFound(id))?;
        let approach = designation.access_points(world, grid);
        if approach.is_empty() {
            return Err(DesignationError::TargetMissing(id).into());
        }
        let approach = ActorState::move_to(Destination::AnyOf(approach));

        let steps = match designation.kind {
            DesignationKind::Harvest { target } => {
                vec![approach, ActorState::perform(Job::Harvest { target })]
            }
            DesignationKind::Dig { tile } => vec![approach, ActorState::perform(Job::Dig { tile })],
            DesignationKind::Build { tile } => {
                vec![approach, ActorState::perform(Job::Build { tile })]
            }
            DesignationKind::Haul { item, to } => {
                let mut steps = vec![approach, ActorState::take_item(item)];
                match to {
                    HaulTarget::Ground(pos) => {
                        steps.push(ActorState::move_to(Destination::Point(pos)));
                        steps.push(ActorState::drop_held_item(item));
                    }
                    HaulTarget::Container(container) => {
                        let points = designation.drop_off_points(world, grid).unwrap_or_default();
                        if points.is_empty() {
                            return Err(DesignationError::TargetMissing(id).into());
                        }
                        steps.push(ActorState::move_to(Destination::AnyOf(points)));
                        steps.push(ActorState::place_item(item, container));
                    }
                }
                steps
            }
        };
        Ok((designation.job_type(), steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (World, TileGrid, Entity, Entity) {
        let mut world = World::new();
        let mut grid = TileGrid::from_fn(5, 3, |p| p != GridPos::new(2, 1));
        colonysim_logic::AreaManager::build(&mut grid);
        let a = world.spawn((GridPos::new(0, 0),));
        let b = world.spawn((GridPos::new(4, 2),));
        (world, grid, a, b)
    }

    #[test]
    fn test_assign_is_exclusive() {
        let (_, _, a, b) = setup();
        let mut board = DesignationBoard::new();
        let id = board.add(DesignationKind::Dig { tile: GridPos::new(2, 1) }, 0);

        board.assign(id, a).unwrap();
        assert_eq!(
            board.assign(id, b),
            Err(DesignationError::AlreadyClaimed { id, holder: a })
        );
        assert_eq!(
            board.release(id, b),
            Err(DesignationError::NotClaimedBy { id, actor: b })
        );
        board.release(id, a).unwrap();
        board.assign(id, b).unwrap();
        board.complete(id, b).unwrap();
        assert_eq!(board.assign(id, a), Err(DesignationError::AlreadyCompleted(id)));
        assert_eq!(board.completed_count(), 1);
        assert_eq!(board.pending().count(), 0);
    }

    #[test]
    fn test_find_claimable_prefers_nearest_then_lowest_id() {
        let (world, grid, _, _) = setup();
        let mut board = DesignationBoard::new();
        let far = board.add(DesignationKind::Dig { tile: GridPos::new(4, 0) }, 0);
        let near = board.add(DesignationKind::Dig { tile: GridPos::new(1, 0) }, 0);
        let also_near = board.add(DesignationKind::Dig { tile: GridPos::new(0, 1) }, 0);
        let area = grid.area_of(GridPos::new(0, 0));

        let found = board.find_claimable(&world, &grid, area, &[ActionType::Dig], GridPos::new(0, 0));
        assert_eq!(found, Some(near));
        assert!(near < also_near);
        assert_ne!(found, Some(far));

        let none = board.find_claimable(&world, &grid, area, &[ActionType::Build], GridPos::new(0, 0));
        assert_eq!(none, None);
    }

    #[test]
    fn test_claimable_requires_shared_area() {
        let mut world = World::new();
        // Two rooms split by a rock column.
        let mut grid = TileGrid::from_fn(5, 1, |p| p.x != 2);
        colonysim_logic::AreaManager::build(&mut grid);
        let mut board = DesignationBoard::new();
        let id = board.add(DesignationKind::Build { tile: GridPos::new(4, 0) }, 0);
        let west = grid.area_of(GridPos::new(0, 0));
        let east = grid.area_of(GridPos::new(3, 0));
        let designation = board.get(id).unwrap();
        assert!(!designation.is_claimable(&world, &grid, west, ActionType::Build, GridPos::new(0, 0)));
        assert!(designation.is_claimable(&world, &grid, east, ActionType::Build, GridPos::new(3, 0)));
        assert!(!designation.is_claimable(&world, &grid, east, ActionType::Dig, GridPos::new(3, 0)));

        let item = world.spawn((GridPos::new(1, 0),));
        let haul = board.add(
            DesignationKind::Haul {
                item,
                to: HaulTarget::Ground(GridPos::new(0, 0)),
            },
            0,
        );
        let haul = board.get(haul).unwrap();
        assert!(haul.is_claimable(&world, &grid, west, ActionType::Haul, GridPos::new(0, 0)));
        assert_eq!(haul.hauled_item(), Some(item));
    }

    #[test]
    fn test_haul_needs_drop_off_in_area() {
        let mut world = World::new();
        let mut grid = TileGrid::from_fn(5, 1, |p| p.x != 2);
        colonysim_logic::AreaManager::build(&mut grid);
        let west = grid.area_of(GridPos::new(0, 0));
        let item = world.spawn((GridPos::new(1, 0),));
        let chest = world.spawn((GridPos::new(4, 0), Inventory::with_capacity(4)));
        let mut board = DesignationBoard::new();
        let to_ground = board.add(
            DesignationKind::Haul {
                item,
                to: HaulTarget::Ground(GridPos::new(3, 0)),
            },
            0,
        );
        let to_chest = board.add(
            DesignationKind::Haul {
                item,
                to: HaulTarget::Container(chest),
            },
            0,
        );

        for id in [to_ground, to_chest] {
            let haul = board.get(id).unwrap();
            assert!(!haul.is_claimable(&world, &grid, west, ActionType::Haul, GridPos::new(0, 0)));
        }
        let found = board.find_claimable(&world, &grid, west, &[ActionType::Haul], GridPos::new(0, 0));
        assert_eq!(found, None);

        // A chest reachable from the west room makes the haul workable again.
        *world.get::<&mut GridPos>(chest).unwrap() = GridPos::new(0, 0);
        let found = board.find_claimable(&world, &grid, west, &[ActionType::Haul], GridPos::new(0, 0));
        assert_eq!(found, Some(to_chest));
    }

    #[test]
    fn test_completed_work_leaves_the_pending_pool() {
        let (world, grid, a, _) = setup();
        let mut board = DesignationBoard::new();
        let done = board.add(DesignationKind::Dig { tile: GridPos::new(1, 0) }, 0);
        let open = board.add(DesignationKind::Dig { tile: GridPos::new(4, 0) }, 1);
        let area = grid.area_of(GridPos::new(0, 0));

        board.assign(done, a).unwrap();
        board.complete(done, a).unwrap();

        let pending: Vec<_> = board.pending().map(|d| d.id).collect();
        assert_eq!(pending, vec![open]);
        let all: Vec<_> = board.iter().map(|d| d.id).collect();
        assert_eq!(all, vec![open, done]);
        assert_eq!(board.get(done).unwrap().status, DesignationStatus::Completed);
        assert_eq!(board.release(done, a), Err(DesignationError::AlreadyCompleted(done)));
        assert_eq!(board.complete(done, a), Err(DesignationError::AlreadyCompleted(done)));

        let found = board.find_claimable(&world, &grid, area, &[ActionType::Dig], GridPos::new(0, 0));
        assert_eq!(found, Some(open));
    }

    #[test]
    fn test_state_steps_for_haul_to_ground() {
        let (mut world, grid, _, _) = setup();
        let item = world.spawn((GridPos::new(0, 2),));
        let mut board = DesignationBoard::new();
        let id = board.add(
            DesignationKind::Haul {
                item,
                to: HaulTarget::Ground(GridPos::new(4, 0)),
            },
            0,
        );
        let (job, steps) = board.state_steps(id, &world, &grid).unwrap();
        assert_eq!(job, ActionType::Haul);
        let labels: Vec<_> = steps.iter().map(ActorState::label).collect();
        assert_eq!(labels, vec!["move", "take_item", "move", "drop_held_item"]);
    }

    #[test]
    fn test_state_steps_missing_target() {
        let (mut world, grid, _, _) = setup();
        let tree = world.spawn((GridPos::new(1, 1),));
        let mut board = DesignationBoard::new();
        let id = board.add(DesignationKind::Harvest { target: tree }, 0);
        world.despawn(tree).unwrap();
        assert!(matches!(
            board.state_steps(id, &world, &grid),
            Err(EngineError::Designation(DesignationError::TargetMissing(_)))
        ));
        assert!(matches!(
            board.state_steps(DesignationId(99), &world, &grid),
            Err(EngineError::Designation(DesignationError::NotFound(_)))
        ));
    }
}
