//! Actor components: identity, movement and job proficiency.

use std::collections::{HashMap, VecDeque};

use colonysim_logic::{Direction, GridPos};
use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::templates::{ActionType, ActorTemplate};

/// Marks an entity as an autonomous actor created from a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub template: String,
    /// Opaque presentation data carried through from the template.
    pub texture: String,
}

/// Where an actor is heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Point(GridPos),
    /// Any of the listed positions will do; the nearest reachable is used.
    AnyOf(Vec<GridPos>),
    /// Sentinel for "nowhere". Asking to move here is an error.
    Unreachable,
}

/// Movement bookkeeping read by whatever renders actors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub destination: Option<Destination>,
    /// Directions still to be walked, front first.
    pub queue: VecDeque<Direction>,
}

impl Mover {
    pub fn is_moving(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.destination = None;
        self.queue.clear();
    }
}

/// Time multipliers per action. Jobs listed here are the jobs the actor
/// is willing to claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSkills {
    pub multipliers: HashMap<ActionType, f32>,
}

impl JobSkills {
    pub fn from_template(template: &ActorTemplate) -> Self {
        let multipliers = template
            .proficiency
            .iter()
            .filter_map(|(name, m)| ActionType::from_name(name).map(|a| (a, *m)))
            .collect();
        Self { multipliers }
    }

    /// Multiplier for an action, 1.0 when unlisted.
    pub fn multiplier(&self, action: ActionType) -> f32 {
        self.multipliers.get(&action).copied().unwrap_or(1.0)
    }

    /// Job types this actor can perform, in a stable order.
    pub fn performable(&self) -> Vec<ActionType> {
        ActionType::JOBS
            .into_iter()
            .filter(|job| self.multipliers.contains_key(job))
            .collect()
    }
}

/// Items an actor is carrying in hand, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeldItems(pub Vec<Entity>);

impl HeldItems {
    pub fn contains(&self, item: Entity) -> bool {
        self.0.contains(&item)
    }

    pub fn remove(&mut self, item: Entity) -> bool {
        let before = self.0.len();
        self.0.retain(|e| *e != item);
        self.0.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skills_from_template() {
        let mut template = ActorTemplate::default();
        template.proficiency.insert("dig".into(), 0.5);
        template.proficiency.insert("walk".into(), 2.0);
        template.proficiency.insert("nonsense".into(), 9.0);
        let skills = JobSkills::from_template(&template);
        assert_eq!(skills.performable(), vec![ActionType::Dig]);
        assert_eq!(skills.multiplier(ActionType::Walk), 2.0);
        assert_eq!(skills.multiplier(ActionType::Build), 1.0);
    }

    #[test]
    fn test_held_items_remove() {
        let mut world = hecs::World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let mut held = HeldItems(vec![a, b]);
        assert!(held.remove(a));
        assert!(!held.remove(a));
        assert!(held.contains(b));
    }
}
