//! Jobs - the work an actor performs once it stands next to its target.

use colonysim_logic::GridPos;
use hecs::Entity;

use crate::components::Harvestable;
use crate::error::EngineError;
use crate::recording::{ChangeValue, Property, Subject};
use crate::states::TickContext;
use crate::templates::ActionType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Take one harvest from an interactable; its yield lands at the
    /// actor's feet.
    Harvest { target: Entity },
    /// Open a rock tile.
    Dig { tile: GridPos },
    /// Close an open tile.
    Build { tile: GridPos },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Blocked(String),
}

fn in_reach(a: GridPos, b: GridPos) -> bool {
    a.manhattan(b) <= 1
}

impl Job {
    pub fn action_type(&self) -> ActionType {
        match self {
            Job::Harvest { .. } => ActionType::Harvest,
            Job::Dig { .. } => ActionType::Dig,
            Job::Build { .. } => ActionType::Build,
        }
    }

    /// Whether the job can go ahead right now.
    pub fn check(&self, actor: Entity, ctx: &TickContext) -> Result<JobOutcome, EngineError> {
        let here = ctx.position(actor)?;
        let outcome = match self {
            Job::Harvest { target } => {
                let Ok(at) = ctx.position(*target) else {
                    return Ok(JobOutcome::Blocked(format!("{:?} is gone", target)));
                };
                let depleted = ctx
                    .world
                    .get::<&Harvestable>(*target)
                    .map(|h| h.is_depleted())
                    .unwrap_or(true);
                if !in_reach(here, at) {
                    JobOutcome::Blocked(format!("{} is out of reach", at))
                } else if depleted {
                    JobOutcome::Blocked(format!("{:?} has nothing to harvest", target))
                } else {
                    JobOutcome::Done
                }
            }
            Job::Dig { tile } | Job::Build { tile } => {
                if !in_reach(here, *tile) {
                    JobOutcome::Blocked(format!("{} is out of reach", tile))
                } else if matches!(self, Job::Build { .. }) && here == *tile {
                    JobOutcome::Blocked(format!("standing on {}", tile))
                } else {
                    JobOutcome::Done
                }
            }
        };
        Ok(outcome)
    }

    /// Finish the job. Digging an open tile or building on a closed one
    /// has nothing left to do and succeeds.
    pub fn apply(&self, actor: Entity, ctx: &mut TickContext) -> Result<JobOutcome, EngineError> {
        if let JobOutcome::Blocked(reason) = self.check(actor, ctx)? {
            return Ok(JobOutcome::Blocked(reason));
        }
        match self {
            Job::Harvest { target } => {
                let (yields, amount, before) = ctx.update::<Harvestable, _>(*target, |h| {
                    let before = h.remaining;
                    h.take();
                    (h.yields.clone(), h.yield_amount, before)
                })?;
                ctx.record(
                    Subject::Entity(*target),
                    Property::Remaining,
                    ChangeValue::Count(before),
                    ChangeValue::Count(before.saturating_sub(1)),
                );
                let at = ctx.position(actor)?;
                for _ in 0..amount {
                    ctx.spawn_ground_item(&yields, at)?;
                }
                log::debug!("{:?} harvested {} {} from {:?}", actor, amount, yields, target);
            }
            Job::Dig { tile } => {
                let change = ctx.set_accessible(*tile, true)?;
                log::debug!("{:?} dug {}: {:?}", actor, tile, change);
            }
            Job::Build { tile } => {
                let occupied = ctx
                    .grid
                    .tile(*tile)
                    .is_some_and(|t| !t.occupants.is_empty());
                if occupied {
                    return Ok(JobOutcome::Blocked(format!("{} is occupied", tile)));
                }
                let change = ctx.set_accessible(*tile, false)?;
                log::debug!("{:?} built on {}: {:?}", actor, tile, change);
            }
        }
        Ok(JobOutcome::Done)
    }
}
