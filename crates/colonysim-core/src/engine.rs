//! Simulation engine - main entry point for running the simulation

use colonysim_logic::{AreaChange, AreaManager, GridError, GridPos, SpatialTree, TileGrid};
use hecs::{Entity, World};
use log::{debug, info, warn};

use crate::components::*;
use crate::config::SimConfig;
use crate::designation::{Designation, DesignationBoard, DesignationId, DesignationKind, HaulTarget};
use crate::error::EngineError;
use crate::generation::WorldLayout;
use crate::recording::{ChangeLog, ChangeValue, Property, Subject};
use crate::scheduler::WakeList;
use crate::states::{ActorState, StateStack, TickContext, ACTOR_KEY};
use crate::templates::Templates;

/// Spatial key under which containers are registered.
pub const CONTAINER_KEY: &str = "container";

/// Main simulation engine
pub struct SimulationEngine {
    /// ECS world containing all entities
    pub world: World,
    grid: TileGrid,
    layout: WorldLayout,
    areas: AreaManager,
    spatial: SpatialTree<String, Entity>,
    designations: DesignationBoard,
    schedule: WakeList,
    changes: ChangeLog,
    templates: Templates,
    config: SimConfig,
    /// Current global tick. Everything due on it runs in the next `update`.
    tick: u64,
}

impl SimulationEngine {
    /// Build the world: tiles, areas and an empty spatial index.
    pub fn new(config: SimConfig, templates: Templates, layout: WorldLayout) -> Result<Self, EngineError> {
        let mut grid = layout.to_grid();
        let areas = AreaManager::build(&mut grid);
        let spatial = SpatialTree::initialise(grid.width(), grid.height(), &config.spatial_branching)?;
        info!(
            "World {}x{} built with {} areas",
            grid.width(),
            grid.height(),
            areas.live_areas().count()
        );
        Ok(Self {
            world: World::new(),
            grid,
            layout,
            areas,
            spatial,
            designations: DesignationBoard::new(),
            schedule: WakeList::new(),
            changes: ChangeLog::new(config.record_changes),
            templates,
            config,
            tick: 0,
        })
    }

    fn context(&mut self) -> TickContext<'_> {
        TickContext {
            world: &mut self.world,
            grid: &mut self.grid,
            layout: &mut self.layout,
            areas: &mut self.areas,
            spatial: &mut self.spatial,
            designations: &mut self.designations,
            changes: &mut self.changes,
            templates: &self.templates,
            config: &self.config,
            tick: self.tick,
        }
    }

    fn require_open(&self, pos: GridPos) -> Result<(), EngineError> {
        if !self.grid.in_bounds(pos) {
            return Err(GridError::OutOfBounds(pos).into());
        }
        if !self.grid.is_accessible(pos) {
            return Err(EngineError::Inaccessible(pos));
        }
        Ok(())
    }

    // ── Spawning ──────────────────────────────────────────────────────

    /// Spawn an actor from a template. It wakes on the current tick.
    pub fn spawn_actor(&mut self, template: &str, pos: GridPos) -> Result<Entity, EngineError> {
        let definition = self.templates.actor(template)?;
        let actor_info = Actor {
            template: template.to_string(),
            texture: definition.texture.clone(),
        };
        let skills = JobSkills::from_template(definition);
        self.require_open(pos)?;

        let actor = self.world.spawn((
            actor_info,
            pos,
            Mover::default(),
            skills,
            HeldItems::default(),
            Inventory::default(),
            StateStack::new(),
        ));
        self.grid.add_occupant(pos, actor.to_bits().get())?;
        self.spatial.add(pos, ACTOR_KEY.to_string(), actor)?;
        self.schedule.schedule(actor, self.tick);
        self.changes.record(
            self.tick,
            Subject::Entity(actor),
            Property::Spawned,
            ChangeValue::None,
            ChangeValue::Position(pos),
        );
        debug!("Spawned {} {:?} at {}", template, actor, pos);
        Ok(actor)
    }

    pub fn spawn_item(&mut self, kind: &str, pos: GridPos) -> Result<Entity, EngineError> {
        self.context().spawn_ground_item(kind, pos)
    }

    /// Spawn a harvestable world object at full growth.
    pub fn spawn_interactable(&mut self, template: &str, pos: GridPos) -> Result<Entity, EngineError> {
        let definition = self.templates.interactable(template)?;
        let harvestable = Harvestable {
            yields: definition.yields.clone(),
            yield_amount: definition.yield_amount,
            remaining: definition.capacity,
            capacity: definition.capacity,
            regrow_interval: definition.regrow_interval.max(1),
        };
        if !self.grid.in_bounds(pos) {
            return Err(GridError::OutOfBounds(pos).into());
        }
        let wake = self.tick + harvestable.regrow_interval;
        let entity = self.world.spawn((
            Interactable {
                kind: template.to_string(),
            },
            pos,
            harvestable,
        ));
        self.spatial.add(pos, template.to_string(), entity)?;
        self.schedule.schedule(entity, wake);
        self.changes.record(
            self.tick,
            Subject::Entity(entity),
            Property::Spawned,
            ChangeValue::None,
            ChangeValue::Position(pos),
        );
        Ok(entity)
    }

    pub fn spawn_container(&mut self, pos: GridPos, capacity: usize) -> Result<Entity, EngineError> {
        if !self.grid.in_bounds(pos) {
            return Err(GridError::OutOfBounds(pos).into());
        }
        let entity = self
            .world
            .spawn((Container, pos, Inventory::with_capacity(capacity)));
        self.spatial.add(pos, CONTAINER_KEY.to_string(), entity)?;
        Ok(entity)
    }

    // ── Designations ──────────────────────────────────────────────────

    fn designate(&mut self, kind: DesignationKind) -> DesignationId {
        let id = self.designations.add(kind, self.tick);
        self.changes.record(
            self.tick,
            Subject::Designation(id.0),
            Property::DesignationStatus,
            ChangeValue::None,
            ChangeValue::Label("unclaimed".to_string()),
        );
        debug!("Designated {} {:?}", id, kind);
        id
    }

    pub fn designate_harvest(&mut self, target: Entity) -> Result<DesignationId, EngineError> {
        self.world
            .get::<&Harvestable>(target)
            .map_err(|e| EngineError::from_component::<Harvestable>(target, e))?;
        Ok(self.designate(DesignationKind::Harvest { target }))
    }

    /// Designate the nearest interactable of `kind` to `from` for harvest.
    pub fn designate_nearest_harvest(&mut self, from: GridPos, kind: &str) -> Result<DesignationId, EngineError> {
        let (_, target) = self.spatial.find_closest(from, &kind.to_string())?;
        self.designate_harvest(target)
    }

    pub fn designate_dig(&mut self, tile: GridPos) -> Result<DesignationId, EngineError> {
        if !self.grid.in_bounds(tile) {
            return Err(GridError::OutOfBounds(tile).into());
        }
        Ok(self.designate(DesignationKind::Dig { tile }))
    }

    pub fn designate_build(&mut self, tile: GridPos) -> Result<DesignationId, EngineError> {
        if !self.grid.in_bounds(tile) {
            return Err(GridError::OutOfBounds(tile).into());
        }
        Ok(self.designate(DesignationKind::Build { tile }))
    }

    pub fn designate_haul(&mut self, item: Entity, to: HaulTarget) -> Result<DesignationId, EngineError> {
        self.world
            .get::<&Item>(item)
            .map_err(|e| EngineError::from_component::<Item>(item, e))?;
        match to {
            HaulTarget::Ground(pos) => self.require_open(pos)?,
            HaulTarget::Container(container) => {
                self.world
                    .get::<&Inventory>(container)
                    .map_err(|e| EngineError::from_component::<Inventory>(container, e))?;
            }
        }
        Ok(self.designate(DesignationKind::Haul { item, to }))
    }

    // ── World edits ───────────────────────────────────────────────────

    /// Open or close a tile directly, repairing areas.
    pub fn set_tile_accessible(&mut self, pos: GridPos, accessible: bool) -> Result<AreaChange, EngineError> {
        self.context().set_accessible(pos, accessible)
    }

    /// Send an actor somewhere, suspending whatever it was doing.
    pub fn order_move(&mut self, actor: Entity, destination: Destination) -> Result<(), EngineError> {
        if destination == Destination::Unreachable {
            return Err(EngineError::InvalidDestination);
        }
        let mut stack = self.take_stack(actor)?;
        stack.push(ActorState::move_to(destination));
        self.restore_stack(actor, stack);
        Ok(())
    }

    /// Pull an actor back to Idle, releasing any designation it holds.
    /// Returns false if it is in the middle of something uninterruptible.
    pub fn interrupt_actor(&mut self, actor: Entity) -> Result<bool, EngineError> {
        let mut stack = self.take_stack(actor)?;
        let result = stack.interrupt(actor, &mut self.context());
        self.restore_stack(actor, stack);
        result
    }

    // ── Ticking ───────────────────────────────────────────────────────

    /// Advance one tick: wake everything due now, in schedule order.
    ///
    /// An entity whose wake fails is retried after the idle rescan delay;
    /// the rest of the tick still runs and the first error is returned.
    pub fn update(&mut self) -> Result<(), EngineError> {
        let now = self.tick;
        let mut first_error = None;
        while let Some(entity) = self.schedule.pop_due(now) {
            match self.wake(entity) {
                Ok(Some(delay)) => self.schedule.schedule(entity, now + delay),
                Ok(None) => {}
                Err(err) => {
                    warn!("{:?} failed on tick {}: {}", entity, now, err);
                    let retry = now + self.config.idle_rescan_delay.max(1);
                    self.schedule.schedule(entity, retry);
                    first_error.get_or_insert(err);
                }
            }
        }
        self.tick += 1;
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn run(&mut self, ticks: u64) -> Result<(), EngineError> {
        for _ in 0..ticks {
            self.update()?;
        }
        Ok(())
    }

    /// Returns the delay until the entity's next wake, or `None` if it no
    /// longer needs waking.
    fn wake(&mut self, entity: Entity) -> Result<Option<u64>, EngineError> {
        if !self.world.contains(entity) {
            return Ok(None);
        }
        if self.world.get::<&StateStack>(entity).is_ok() {
            return self.tick_actor(entity).map(Some);
        }
        if self.world.get::<&Harvestable>(entity).is_ok() {
            return self.regrow(entity).map(Some);
        }
        Ok(None)
    }

    fn take_stack(&mut self, actor: Entity) -> Result<StateStack, EngineError> {
        let mut slot = self
            .world
            .get::<&mut StateStack>(actor)
            .map_err(|e| EngineError::from_component::<StateStack>(actor, e))?;
        Ok(std::mem::take(&mut *slot))
    }

    fn restore_stack(&mut self, actor: Entity, stack: StateStack) {
        if let Ok(mut slot) = self.world.get::<&mut StateStack>(actor) {
            *slot = stack;
        }
    }

    fn tick_actor(&mut self, actor: Entity) -> Result<u64, EngineError> {
        let mut stack = self.take_stack(actor)?;
        let before = stack.active_label();
        let mut ctx = self.context();
        let result = stack.run(actor, &mut ctx);
        ctx.record(
            Subject::Entity(actor),
            Property::ActiveState,
            ChangeValue::Label(before.to_string()),
            ChangeValue::Label(stack.active_label().to_string()),
        );
        self.restore_stack(actor, stack);
        result
    }

    fn regrow(&mut self, entity: Entity) -> Result<u64, EngineError> {
        let (before, after, interval) = {
            let mut harvestable = self
                .world
                .get::<&mut Harvestable>(entity)
                .map_err(|e| EngineError::from_component::<Harvestable>(entity, e))?;
            let before = harvestable.remaining;
            harvestable.regrow();
            (before, harvestable.remaining, harvestable.regrow_interval)
        };
        self.changes.record(
            self.tick,
            Subject::Entity(entity),
            Property::Remaining,
            ChangeValue::Count(before),
            ChangeValue::Count(after),
        );
        Ok(interval.max(1))
    }

    // ── Queries ───────────────────────────────────────────────────────

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn layout(&self) -> &WorldLayout {
        &self.layout
    }

    pub fn areas(&self) -> &AreaManager {
        &self.areas
    }

    pub fn spatial(&self) -> &SpatialTree<String, Entity> {
        &self.spatial
    }

    pub fn designations(&self) -> &DesignationBoard {
        &self.designations
    }

    pub fn designation(&self, id: DesignationId) -> Option<&Designation> {
        self.designations.get(id)
    }

    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    /// Take every change recorded so far.
    pub fn drain_changes(&mut self) -> Vec<crate::recording::ChangeEvent> {
        self.changes.drain()
    }

    /// All actors, in spawn order.
    pub fn actors(&self) -> Vec<Entity> {
        let mut actors: Vec<Entity> = self
            .world
            .query::<&Actor>()
            .iter()
            .map(|(entity, _)| entity)
            .collect();
        actors.sort_by_key(|e| e.id());
        actors
    }

    /// Position of any entity that is physically in the world.
    pub fn position(&self, entity: Entity) -> Option<GridPos> {
        self.world.get::<&GridPos>(entity).ok().map(|pos| *pos)
    }

    pub fn actor_position(&self, actor: Entity) -> Result<GridPos, EngineError> {
        self.world
            .get::<&GridPos>(actor)
            .map(|pos| *pos)
            .map_err(|e| EngineError::from_component::<GridPos>(actor, e))
    }

    /// State labels from the bottom of the actor's stack up.
    pub fn actor_states(&self, actor: Entity) -> Result<Vec<&'static str>, EngineError> {
        self.world
            .get::<&StateStack>(actor)
            .map(|stack| stack.labels())
            .map_err(|e| EngineError::from_component::<StateStack>(actor, e))
    }

    pub fn actor_designation(&self, actor: Entity) -> Result<Option<DesignationId>, EngineError> {
        self.world
            .get::<&StateStack>(actor)
            .map(|stack| stack.designation())
            .map_err(|e| EngineError::from_component::<StateStack>(actor, e))
    }

    pub fn held_items(&self, actor: Entity) -> Result<Vec<Entity>, EngineError> {
        self.world
            .get::<&HeldItems>(actor)
            .map(|held| held.0.clone())
            .map_err(|e| EngineError::from_component::<HeldItems>(actor, e))
    }

    pub fn inventory(&self, holder: Entity) -> Result<Vec<Entity>, EngineError> {
        self.world
            .get::<&Inventory>(holder)
            .map(|inventory| inventory.items.clone())
            .map_err(|e| EngineError::from_component::<Inventory>(holder, e))
    }

    pub fn harvestable(&self, entity: Entity) -> Option<Harvestable> {
        self.world
            .get::<&Harvestable>(entity)
            .ok()
            .map(|h| (*h).clone())
    }

    /// Nearest entity registered under `key`.
    pub fn find_nearest(&self, from: GridPos, key: &str) -> Result<(GridPos, Entity), EngineError> {
        Ok(self.spatial.find_closest(from, &key.to_string())?)
    }

    /// Ground items of `kind` lying on `pos`.
    pub fn items_at(&self, pos: GridPos, kind: &str) -> Vec<Entity> {
        let key = kind.to_string();
        self.spatial
            .leaf_of(pos)
            .map(|leaf| {
                self.spatial
                    .leaf_members(leaf, &key)
                    .iter()
                    .filter(|(at, _)| *at == pos)
                    .map(|(_, item)| *item)
                    .collect()
            })
            .unwrap_or_default()
    }
}
