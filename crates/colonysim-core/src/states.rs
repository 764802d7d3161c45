//! Actor behaviour - a stack of states per actor.
//!
//! Only the top of an actor's [`StateStack`] runs. A state's tick returns a
//! [`StateOutcome`]: keep going after a delay, finish (the state below
//! resumes in the same tick), push a new state on top, or fail. Idle sits
//! at the bottom of every stack and is never popped.
//!
//! [`TickContext`] bundles the mutable world pieces a state may touch while
//! it runs. It is built by the engine for the duration of one actor's tick.

use colonysim_logic::{
    AreaChange, AreaManager, GridError, GridPos, PathfindRequest, Pathfinder, SearchState,
    SpatialTree, TileGrid,
};
use hecs::{Entity, World};
use log::{debug, warn};

use crate::components::{
    Destination, HeldItems, Inventory, Item, JobSkills, Mover, StoredIn,
};
use crate::config::SimConfig;
use crate::designation::{DesignationBoard, DesignationId};
use crate::error::EngineError;
use crate::generation::WorldLayout;
use crate::jobs::{Job, JobOutcome};
use crate::recording::{ChangeLog, ChangeValue, Property, Subject};
use crate::templates::{ActionType, Templates};

/// Spatial key under which every actor is registered.
pub const ACTOR_KEY: &str = "actor";

/// Mutable view of the world handed to a state while it ticks.
pub struct TickContext<'a> {
    pub world: &'a mut World,
    pub grid: &'a mut TileGrid,
    pub layout: &'a mut WorldLayout,
    pub areas: &'a mut AreaManager,
    pub spatial: &'a mut SpatialTree<String, Entity>,
    pub designations: &'a mut DesignationBoard,
    pub changes: &'a mut ChangeLog,
    pub templates: &'a Templates,
    pub config: &'a SimConfig,
    pub tick: u64,
}

impl TickContext<'_> {
    /// Clone a component out of the world.
    pub fn get<T: hecs::Component + Clone>(&self, entity: Entity) -> Result<T, EngineError> {
        self.world
            .get::<&T>(entity)
            .map(|c| (*c).clone())
            .map_err(|e| EngineError::from_component::<T>(entity, e))
    }

    /// Run `f` against a component in place.
    pub fn update<T: hecs::Component, R>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, EngineError> {
        let mut component = self
            .world
            .get::<&mut T>(entity)
            .map_err(|e| EngineError::from_component::<T>(entity, e))?;
        Ok(f(&mut *component))
    }

    pub fn position(&self, entity: Entity) -> Result<GridPos, EngineError> {
        self.get::<GridPos>(entity)
    }

    /// Ticks an action takes this actor: the timing table entry scaled by
    /// the actor's proficiency, never less than one.
    pub fn action_delay(&self, actor: Entity, action: ActionType) -> u64 {
        let base = self
            .templates
            .duration(action)
            .unwrap_or(self.config.default_action_ticks);
        let multiplier = self
            .world
            .get::<&JobSkills>(actor)
            .map(|skills| skills.multiplier(action))
            .unwrap_or(1.0);
        ((base as f32 * multiplier).round() as u64).max(1)
    }

    pub fn record(&mut self, subject: Subject, property: Property, old: ChangeValue, new: ChangeValue) {
        self.changes.record(self.tick, subject, property, old, new);
    }

    /// Move an actor one tile, keeping occupants and the spatial index in step.
    pub fn relocate_actor(&mut self, actor: Entity, to: GridPos) -> Result<(), EngineError> {
        let from = self.position(actor)?;
        let id = actor.to_bits().get();
        self.grid.remove_occupant(from, id)?;
        self.grid.add_occupant(to, id)?;
        self.spatial
            .move_member(from, to, &ACTOR_KEY.to_string(), actor)?;
        self.update::<GridPos, _>(actor, |pos| *pos = to)?;
        self.record(
            Subject::Entity(actor),
            Property::Position,
            ChangeValue::Position(from),
            ChangeValue::Position(to),
        );
        Ok(())
    }

    /// Open or close a tile and repair the area partition.
    pub fn set_accessible(&mut self, pos: GridPos, accessible: bool) -> Result<AreaChange, EngineError> {
        let was = self.grid.is_accessible(pos);
        let old_area = self.grid.area_of(pos);
        let change = self.areas.set_accessible(self.grid, pos, accessible)?;
        if let Some(kind) = self.templates.tile_with_access(accessible) {
            self.layout.set_tile(pos, kind, accessible);
        }
        self.record(
            Subject::Tile(pos),
            Property::Accessible,
            ChangeValue::Flag(was),
            ChangeValue::Flag(accessible),
        );
        self.record(
            Subject::Tile(pos),
            Property::Area,
            ChangeValue::Area(old_area),
            ChangeValue::Area(self.grid.area_of(pos)),
        );
        Ok(change)
    }

    /// Spawn an item lying on the ground.
    pub fn spawn_ground_item(&mut self, kind: &str, pos: GridPos) -> Result<Entity, EngineError> {
        self.templates.item(kind)?;
        if !self.grid.in_bounds(pos) {
            return Err(GridError::OutOfBounds(pos).into());
        }
        let item = self.world.spawn((
            Item {
                kind: kind.to_string(),
            },
            pos,
        ));
        self.spatial.add(pos, kind.to_string(), item)?;
        self.record(
            Subject::Entity(item),
            Property::Spawned,
            ChangeValue::None,
            ChangeValue::Position(pos),
        );
        Ok(item)
    }

    /// Take an item off the ground or out of whatever holds it.
    fn detach_item(&mut self, item: Entity) -> Result<(), EngineError> {
        let kind = self.get::<Item>(item)?.kind;
        if let Ok(pos) = self.position(item) {
            self.spatial.remove(pos, &kind, item)?;
            self.world
                .remove_one::<GridPos>(item)
                .map_err(|e| EngineError::from_component::<GridPos>(item, e))?;
        }
        if let Ok(StoredIn(holder)) = self.get::<StoredIn>(item) {
            if let Ok(mut held) = self.world.get::<&mut HeldItems>(holder) {
                held.remove(item);
            }
            if let Ok(mut inventory) = self.world.get::<&mut Inventory>(holder) {
                inventory.remove(item);
            }
            self.world
                .remove_one::<StoredIn>(item)
                .map_err(|e| EngineError::from_component::<StoredIn>(item, e))?;
        }
        Ok(())
    }

    fn held_count(&self, actor: Entity) -> u32 {
        self.world
            .get::<&HeldItems>(actor)
            .map(|held| held.0.len() as u32)
            .unwrap_or(0)
    }

    /// Put an item into an actor's hands.
    pub fn pick_up(&mut self, actor: Entity, item: Entity) -> Result<(), EngineError> {
        let before = self.held_count(actor);
        self.detach_item(item)?;
        self.update::<HeldItems, _>(actor, |held| held.0.push(item))?;
        self.world
            .insert_one(item, StoredIn(actor))
            .map_err(|_| EngineError::NoSuchEntity(item))?;
        self.record(
            Subject::Entity(actor),
            Property::HeldItems,
            ChangeValue::Count(before),
            ChangeValue::Count(before + 1),
        );
        Ok(())
    }

    /// Drop a held item where the actor stands.
    pub fn put_down(&mut self, actor: Entity, item: Entity) -> Result<GridPos, EngineError> {
        let before = self.held_count(actor);
        let pos = self.position(actor)?;
        let kind = self.get::<Item>(item)?.kind;
        self.detach_item(item)?;
        self.world
            .insert_one(item, pos)
            .map_err(|_| EngineError::NoSuchEntity(item))?;
        self.spatial.add(pos, kind, item)?;
        self.record(
            Subject::Entity(actor),
            Property::HeldItems,
            ChangeValue::Count(before),
            ChangeValue::Count(before.saturating_sub(1)),
        );
        self.record(
            Subject::Entity(item),
            Property::Position,
            ChangeValue::None,
            ChangeValue::Position(pos),
        );
        Ok(pos)
    }

    /// Move a held item into an inventory. Returns false if it is full.
    pub fn stow(&mut self, actor: Entity, item: Entity, container: Entity) -> Result<bool, EngineError> {
        let full = self
            .world
            .get::<&Inventory>(container)
            .map_err(|e| EngineError::from_component::<Inventory>(container, e))?
            .is_full();
        if full {
            return Ok(false);
        }
        let before = self.held_count(actor);
        self.detach_item(item)?;
        self.update::<Inventory, _>(container, |inventory| inventory.insert(item))?;
        self.world
            .insert_one(item, StoredIn(container))
            .map_err(|_| EngineError::NoSuchEntity(item))?;
        self.record(
            Subject::Entity(actor),
            Property::HeldItems,
            ChangeValue::Count(before),
            ChangeValue::Count(before.saturating_sub(1)),
        );
        Ok(true)
    }

    /// Drop `item` if the actor is still carrying it.
    pub fn drop_if_held(&mut self, actor: Entity, item: Entity) -> Result<(), EngineError> {
        let held = self
            .world
            .get::<&HeldItems>(actor)
            .map(|held| held.contains(item))
            .unwrap_or(false);
        if held {
            self.put_down(actor, item)?;
        }
        Ok(())
    }

    pub fn claim_designation(&mut self, id: DesignationId, actor: Entity) -> Result<(), EngineError> {
        self.designations.assign(id, actor)?;
        self.record_status(id, "unclaimed", "claimed");
        Ok(())
    }

    pub fn release_designation(&mut self, id: DesignationId, actor: Entity) -> Result<(), EngineError> {
        if let Some(item) = self.designations.get(id).and_then(|d| d.hauled_item()) {
            self.drop_if_held(actor, item)?;
        }
        self.designations.release(id, actor)?;
        self.record_status(id, "claimed", "unclaimed");
        Ok(())
    }

    pub fn complete_designation(&mut self, id: DesignationId, actor: Entity) -> Result<(), EngineError> {
        self.designations.complete(id, actor)?;
        self.record_status(id, "claimed", "completed");
        Ok(())
    }

    fn record_status(&mut self, id: DesignationId, old: &str, new: &str) {
        self.record(
            Subject::Designation(id.0),
            Property::DesignationStatus,
            ChangeValue::Label(old.to_string()),
            ChangeValue::Label(new.to_string()),
        );
    }
}

/// What a state wants after one tick.
#[derive(Debug)]
pub enum StateOutcome {
    /// Run again after `delay` ticks.
    Continue { delay: u64 },
    /// Pop this state; the one below resumes this tick.
    Finished,
    /// Suspend this state under a new one which runs this tick.
    Push(ActorState),
    /// Pop this state and report why.
    Failed(String),
}

/// Walk to a destination, planning a path in budgeted slices first.
#[derive(Debug, Clone)]
pub struct MoveState {
    pub destination: Destination,
    search: Option<Pathfinder>,
    planned: bool,
}

impl MoveState {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            search: None,
            planned: false,
        }
    }

    fn request(&self, start: GridPos, actor: Entity) -> Result<PathfindRequest, EngineError> {
        let requester = actor.to_bits().get();
        match &self.destination {
            Destination::Point(goal) => Ok(PathfindRequest::to_point(start, *goal, requester)),
            Destination::AnyOf(goals) => Ok(PathfindRequest::to_any(
                start,
                goals.iter().copied(),
                requester,
            )),
            Destination::Unreachable => Err(EngineError::InvalidDestination),
        }
    }

    fn tick(&mut self, actor: Entity, ctx: &mut TickContext) -> Result<StateOutcome, EngineError> {
        let pos = ctx.position(actor)?;
        if !self.planned {
            if self.search.is_none() {
                let request = self.request(pos, actor)?;
                if matches!(&self.destination, Destination::AnyOf(goals) if goals.is_empty()) {
                    return Ok(StateOutcome::Failed("no tile to move to".to_string()));
                }
                let destination = self.destination.clone();
                ctx.update::<Mover, _>(actor, |mover| {
                    mover.destination = Some(destination);
                    mover.queue.clear();
                })?;
                let mut search = Pathfinder::new();
                search.new_search(request);
                self.search = Some(search);
            }
            let search = self.search.get_or_insert_with(Pathfinder::new);
            match search.step(&*ctx.grid, ctx.config.path_budget_per_tick) {
                SearchState::Searching => return Ok(StateOutcome::Continue { delay: 1 }),
                SearchState::Succeeded => {
                    let directions = search.final_result()?.directions.clone();
                    ctx.update::<Mover, _>(actor, |mover| mover.queue = directions.into())?;
                    self.search = None;
                    self.planned = true;
                }
                SearchState::Failed | SearchState::NotInitialised => {
                    self.search = None;
                    ctx.update::<Mover, _>(actor, Mover::clear)?;
                    return Ok(StateOutcome::Failed(format!(
                        "no path from {} to {:?}",
                        pos, self.destination
                    )));
                }
            }
        }

        let Some(dir) = ctx.update::<Mover, _>(actor, |mover| mover.queue.pop_front())? else {
            ctx.update::<Mover, _>(actor, Mover::clear)?;
            return Ok(StateOutcome::Finished);
        };
        let next = pos.step(dir);
        if !ctx.grid.is_accessible(next) {
            debug!("{:?} blocked at {}, replanning", actor, next);
            self.planned = false;
            ctx.update::<Mover, _>(actor, |mover| mover.queue.clear())?;
            return Ok(StateOutcome::Continue { delay: 1 });
        }
        ctx.relocate_actor(actor, next)?;
        Ok(StateOutcome::Continue {
            delay: ctx.action_delay(actor, ActionType::Walk),
        })
    }
}

/// Run one job to completion.
#[derive(Debug, Clone)]
pub struct JobState {
    pub job: Job,
    started: bool,
}

impl JobState {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            started: false,
        }
    }

    fn tick(&mut self, actor: Entity, ctx: &mut TickContext) -> Result<StateOutcome, EngineError> {
        if !self.started {
            if let JobOutcome::Blocked(reason) = self.job.check(actor, ctx)? {
                return Ok(StateOutcome::Failed(reason));
            }
            self.started = true;
            return Ok(StateOutcome::Continue {
                delay: ctx.action_delay(actor, self.job.action_type()),
            });
        }
        match self.job.apply(actor, ctx)? {
            JobOutcome::Done => Ok(StateOutcome::Finished),
            JobOutcome::Blocked(reason) => Ok(StateOutcome::Failed(reason)),
        }
    }
}

/// Work through the steps of a claimed designation.
#[derive(Debug, Clone)]
pub struct SatisfyState {
    pub designation: DesignationId,
    pub job_type: ActionType,
    /// Remaining steps; the last element runs next.
    steps: Vec<ActorState>,
}

impl SatisfyState {
    /// `steps` are given in execution order.
    pub fn new(designation: DesignationId, job_type: ActionType, mut steps: Vec<ActorState>) -> Self {
        steps.reverse();
        Self {
            designation,
            job_type,
            steps,
        }
    }

    pub fn current(&self) -> Option<&ActorState> {
        self.steps.last()
    }

    pub fn remaining_steps(&self) -> usize {
        self.steps.len()
    }

    fn tick(&mut self, actor: Entity, ctx: &mut TickContext) -> Result<StateOutcome, EngineError> {
        for _ in 0..ctx.config.max_transitions_per_tick {
            let Some(current) = self.steps.last_mut() else {
                ctx.complete_designation(self.designation, actor)?;
                debug!("{:?} completed designation {}", actor, self.designation);
                return Ok(StateOutcome::Finished);
            };
            match current.tick(actor, ctx)? {
                StateOutcome::Continue { delay } => return Ok(StateOutcome::Continue { delay }),
                StateOutcome::Finished => {
                    self.steps.pop();
                }
                StateOutcome::Push(state) => self.steps.push(state),
                StateOutcome::Failed(reason) => {
                    self.abandon(actor, ctx)?;
                    return Ok(StateOutcome::Failed(reason));
                }
            }
        }
        Ok(StateOutcome::Continue { delay: 1 })
    }

    fn abandon(&mut self, actor: Entity, ctx: &mut TickContext) -> Result<(), EngineError> {
        self.steps.clear();
        ctx.update::<Mover, _>(actor, Mover::clear)?;
        ctx.release_designation(self.designation, actor)
    }
}

/// One entry of an actor's state stack.
#[derive(Debug, Clone)]
pub enum ActorState {
    Idle,
    Move(MoveState),
    PerformJob(JobState),
    SatisfyDesignation(SatisfyState),
    TakeItem { item: Entity, done: bool },
    PlaceItem { item: Entity, container: Entity, done: bool },
    DropHeldItem { item: Entity, done: bool },
}

impl ActorState {
    pub fn move_to(destination: Destination) -> Self {
        ActorState::Move(MoveState::new(destination))
    }

    pub fn perform(job: Job) -> Self {
        ActorState::PerformJob(JobState::new(job))
    }

    pub fn take_item(item: Entity) -> Self {
        ActorState::TakeItem { item, done: false }
    }

    pub fn place_item(item: Entity, container: Entity) -> Self {
        ActorState::PlaceItem {
            item,
            container,
            done: false,
        }
    }

    pub fn drop_held_item(item: Entity) -> Self {
        ActorState::DropHeldItem { item, done: false }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActorState::Idle => "idle",
            ActorState::Move(_) => "move",
            ActorState::PerformJob(_) => "perform_job",
            ActorState::SatisfyDesignation(_) => "satisfy_designation",
            ActorState::TakeItem { .. } => "take_item",
            ActorState::PlaceItem { .. } => "place_item",
            ActorState::DropHeldItem { .. } => "drop_held_item",
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            ActorState::Idle => ActionType::Idle,
            ActorState::Move(_) => ActionType::Walk,
            ActorState::PerformJob(state) => state.job.action_type(),
            ActorState::SatisfyDesignation(state) => state.job_type,
            ActorState::TakeItem { .. } => ActionType::TakeItem,
            ActorState::PlaceItem { .. } => ActionType::PlaceItem,
            ActorState::DropHeldItem { .. } => ActionType::DropItem,
        }
    }

    /// Whether the actor can be pulled out of this state mid-way.
    pub fn is_interruptible(&self) -> bool {
        match self {
            ActorState::Idle | ActorState::Move(_) => true,
            ActorState::SatisfyDesignation(state) => {
                state.current().map_or(true, ActorState::is_interruptible)
            }
            ActorState::PerformJob(_)
            | ActorState::TakeItem { .. }
            | ActorState::PlaceItem { .. }
            | ActorState::DropHeldItem { .. } => false,
        }
    }

    pub fn tick(&mut self, actor: Entity, ctx: &mut TickContext) -> Result<StateOutcome, EngineError> {
        match self {
            ActorState::Idle => tick_idle(actor, ctx),
            ActorState::Move(state) => state.tick(actor, ctx),
            ActorState::PerformJob(state) => state.tick(actor, ctx),
            ActorState::SatisfyDesignation(state) => state.tick(actor, ctx),
            ActorState::TakeItem { item, done } => {
                if *done {
                    return Ok(StateOutcome::Finished);
                }
                let here = ctx.position(actor)?;
                match ctx.position(*item) {
                    Ok(at) if at.manhattan(here) <= 1 => {}
                    _ => return Ok(StateOutcome::Failed(format!("{:?} is out of reach", item))),
                }
                ctx.pick_up(actor, *item)?;
                *done = true;
                Ok(StateOutcome::Continue {
                    delay: ctx.action_delay(actor, ActionType::TakeItem),
                })
            }
            ActorState::PlaceItem {
                item,
                container,
                done,
            } => {
                if *done {
                    return Ok(StateOutcome::Finished);
                }
                if !held_by(ctx, actor, *item) {
                    return Ok(StateOutcome::Failed(format!("{:?} is not held", item)));
                }
                let here = ctx.position(actor)?;
                let reachable = *container == actor
                    || ctx
                        .position(*container)
                        .map(|at| at.manhattan(here) <= 1)
                        .unwrap_or(false);
                if !reachable {
                    return Ok(StateOutcome::Failed(format!("{:?} is out of reach", container)));
                }
                if !ctx.stow(actor, *item, *container)? {
                    return Ok(StateOutcome::Failed(format!("{:?} is full", container)));
                }
                *done = true;
                Ok(StateOutcome::Continue {
                    delay: ctx.action_delay(actor, ActionType::PlaceItem),
                })
            }
            ActorState::DropHeldItem { item, done } => {
                if *done {
                    return Ok(StateOutcome::Finished);
                }
                if !held_by(ctx, actor, *item) {
                    return Ok(StateOutcome::Failed(format!("{:?} is not held", item)));
                }
                ctx.put_down(actor, *item)?;
                *done = true;
                Ok(StateOutcome::Continue {
                    delay: ctx.action_delay(actor, ActionType::DropItem),
                })
            }
        }
    }
}

fn held_by(ctx: &TickContext, actor: Entity, item: Entity) -> bool {
    ctx.world
        .get::<&HeldItems>(actor)
        .map(|held| held.contains(item))
        .unwrap_or(false)
}

fn tick_idle(actor: Entity, ctx: &mut TickContext) -> Result<StateOutcome, EngineError> {
    let rescan = StateOutcome::Continue {
        delay: ctx.config.idle_rescan_delay,
    };
    let jobs = ctx
        .world
        .get::<&JobSkills>(actor)
        .map(|skills| skills.performable())
        .unwrap_or_default();
    if jobs.is_empty() {
        return Ok(rescan);
    }

    let pos = ctx.position(actor)?;
    let area = ctx.grid.area_of(pos);
    let Some(id) = ctx
        .designations
        .find_claimable(ctx.world, ctx.grid, area, &jobs, pos)
    else {
        return Ok(rescan);
    };

    ctx.claim_designation(id, actor)?;
    match ctx.designations.state_steps(id, ctx.world, ctx.grid) {
        Ok((job_type, steps)) => {
            debug!("{:?} claimed designation {} ({})", actor, id, job_type);
            Ok(StateOutcome::Push(ActorState::SatisfyDesignation(
                SatisfyState::new(id, job_type, steps),
            )))
        }
        Err(err) => {
            warn!("{:?} could not plan designation {}: {}", actor, id, err);
            ctx.release_designation(id, actor)?;
            Ok(rescan)
        }
    }
}

/// An actor's behaviour stack. Idle is always at the bottom.
#[derive(Debug, Clone, Default)]
pub struct StateStack {
    states: Vec<ActorState>,
}

impl StateStack {
    pub fn new() -> Self {
        Self {
            states: vec![ActorState::Idle],
        }
    }

    pub fn states(&self) -> &[ActorState] {
        &self.states
    }

    pub fn top(&self) -> Option<&ActorState> {
        self.states.last()
    }

    /// Suspend the current state under `state`.
    pub fn push(&mut self, state: ActorState) {
        self.states.push(state);
    }

    /// The designation this actor is working on, if any.
    pub fn designation(&self) -> Option<DesignationId> {
        self.states.iter().rev().find_map(|state| match state {
            ActorState::SatisfyDesignation(satisfy) => Some(satisfy.designation),
            _ => None,
        })
    }

    /// Labels from the bottom of the stack up, including the steps active
    /// inside a designation.
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        for state in &self.states {
            labels.push(state.label());
            let mut inner = state;
            while let ActorState::SatisfyDesignation(satisfy) = inner {
                match satisfy.current() {
                    Some(step) => {
                        labels.push(step.label());
                        inner = step;
                    }
                    None => break,
                }
            }
        }
        labels
    }

    /// The innermost running state.
    pub fn active_label(&self) -> &'static str {
        self.labels().last().copied().unwrap_or("idle")
    }

    /// Run the top state, following same-tick transitions up to the
    /// configured cap. Returns the delay until the actor next wakes.
    pub fn run(&mut self, actor: Entity, ctx: &mut TickContext) -> Result<u64, EngineError> {
        for _ in 0..ctx.config.max_transitions_per_tick {
            let Some(top) = self.states.last_mut() else {
                self.states.push(ActorState::Idle);
                continue;
            };
            match top.tick(actor, ctx)? {
                StateOutcome::Continue { delay } => return Ok(delay.max(1)),
                StateOutcome::Finished => {
                    if let Some(done) = self.states.pop() {
                        debug!("{:?} finished {}", actor, done.label());
                    }
                }
                StateOutcome::Push(state) => {
                    debug!("{:?} pushed {}", actor, state.label());
                    self.states.push(state);
                }
                StateOutcome::Failed(reason) => {
                    if let Some(failed) = self.states.pop() {
                        warn!("{:?} {} failed: {}", actor, failed.label(), reason);
                    }
                    if self.states.is_empty() {
                        self.states.push(ActorState::Idle);
                    }
                    return Ok(ctx.config.idle_rescan_delay.max(1));
                }
            }
            if self.states.is_empty() {
                self.states.push(ActorState::Idle);
            }
        }
        debug!("{:?} hit the transition cap", actor);
        Ok(1)
    }

    /// Abandon everything above Idle if every such state allows it.
    /// Returns false, changing nothing, when something is uninterruptible.
    pub fn interrupt(&mut self, actor: Entity, ctx: &mut TickContext) -> Result<bool, EngineError> {
        if !self.states.iter().all(ActorState::is_interruptible) {
            return Ok(false);
        }
        while self.states.len() > 1 {
            if let Some(ActorState::SatisfyDesignation(mut satisfy)) = self.states.pop() {
                satisfy.abandon(actor, ctx)?;
            }
        }
        self.states.truncate(1);
        if self.states.is_empty() {
            self.states.push(ActorState::Idle);
        }
        ctx.update::<Mover, _>(actor, Mover::clear)?;
        Ok(true)
    }
}
