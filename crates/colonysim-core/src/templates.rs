//! Content templates - actor, item, tile and interactable definitions plus
//! the action timing table.
//!
//! Templates are loaded once from JSON when the world is built and handed
//! to the engine by value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, TemplateError};

/// The kind of in-world action a state performs. Timing and proficiency
/// tables are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionType {
    Idle,
    Walk,
    Harvest,
    Dig,
    Build,
    Haul,
    TakeItem,
    PlaceItem,
    DropItem,
}

impl ActionType {
    /// Action types that designations can ask for.
    pub const JOBS: [ActionType; 4] = [
        ActionType::Harvest,
        ActionType::Dig,
        ActionType::Build,
        ActionType::Haul,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActionType::Idle => "idle",
            ActionType::Walk => "walk",
            ActionType::Harvest => "harvest",
            ActionType::Dig => "dig",
            ActionType::Build => "build",
            ActionType::Haul => "haul",
            ActionType::TakeItem => "take_item",
            ActionType::PlaceItem => "place_item",
            ActionType::DropItem => "drop_item",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let action = match name {
            "idle" => ActionType::Idle,
            "walk" => ActionType::Walk,
            "harvest" => ActionType::Harvest,
            "dig" => ActionType::Dig,
            "build" => ActionType::Build,
            "haul" => ActionType::Haul,
            "take_item" => ActionType::TakeItem,
            "place_item" => ActionType::PlaceItem,
            "drop_item" => ActionType::DropItem,
            _ => return None,
        };
        Some(action)
    }

    pub fn is_job(self) -> bool {
        Self::JOBS.contains(&self)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorTemplate {
    #[serde(default)]
    pub texture: String,
    /// Action name to time multiplier. Job actions listed here are the
    /// jobs this actor will claim.
    #[serde(default)]
    pub proficiency: HashMap<String, f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemTemplate {
    #[serde(default)]
    pub texture: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileTemplate {
    pub glyph: char,
    pub accessible: bool,
    #[serde(default)]
    pub texture: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractableTemplate {
    #[serde(default)]
    pub texture: String,
    /// Item template produced when harvested.
    pub yields: String,
    pub yield_amount: u32,
    /// Harvests available when fully grown.
    pub capacity: u32,
    /// Ticks between regrowing one harvest.
    pub regrow_interval: u64,
}

/// Every named template the world can instantiate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Templates {
    #[serde(default)]
    pub actors: HashMap<String, ActorTemplate>,
    #[serde(default)]
    pub items: HashMap<String, ItemTemplate>,
    #[serde(default)]
    pub tiles: HashMap<String, TileTemplate>,
    #[serde(default)]
    pub interactables: HashMap<String, InteractableTemplate>,
    /// Action name to duration in ticks.
    #[serde(default)]
    pub action_timings: HashMap<String, u64>,
}

impl Templates {
    /// Parse and validate a JSON template document.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let templates: Templates = serde_json::from_str(json)?;
        templates.validate()?;
        log::info!(
            "Loaded templates: {} actors, {} items, {} tiles, {} interactables",
            templates.actors.len(),
            templates.items.len(),
            templates.tiles.len(),
            templates.interactables.len()
        );
        Ok(templates)
    }

    /// The content bundled with the crate.
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::from_json(include_str!("../data/templates.json"))
    }

    fn validate(&self) -> Result<(), TemplateError> {
        let action_names = self
            .action_timings
            .keys()
            .chain(self.actors.values().flat_map(|a| a.proficiency.keys()));
        for name in action_names {
            if ActionType::from_name(name).is_none() {
                return Err(TemplateError::UnknownAction(name.clone()));
            }
        }
        for (name, interactable) in &self.interactables {
            if !self.items.contains_key(&interactable.yields) {
                return Err(TemplateError::UnknownYield {
                    interactable: name.clone(),
                    item: interactable.yields.clone(),
                });
            }
        }
        let mut glyphs = std::collections::HashSet::new();
        for tile in self.tiles.values() {
            if !glyphs.insert(tile.glyph) {
                return Err(TemplateError::DuplicateGlyph(tile.glyph));
            }
        }
        Ok(())
    }

    pub fn actor(&self, name: &str) -> Result<&ActorTemplate, EngineError> {
        self.actors.get(name).ok_or_else(|| EngineError::UnknownTemplate {
            kind: "actor",
            name: name.to_string(),
        })
    }

    pub fn item(&self, name: &str) -> Result<&ItemTemplate, EngineError> {
        self.items.get(name).ok_or_else(|| EngineError::UnknownTemplate {
            kind: "item",
            name: name.to_string(),
        })
    }

    pub fn interactable(&self, name: &str) -> Result<&InteractableTemplate, EngineError> {
        self.interactables
            .get(name)
            .ok_or_else(|| EngineError::UnknownTemplate {
                kind: "interactable",
                name: name.to_string(),
            })
    }

    /// Tile template name and definition for a layout glyph.
    pub fn tile_for_glyph(&self, glyph: char) -> Option<(&str, &TileTemplate)> {
        self.tiles
            .iter()
            .find(|(_, t)| t.glyph == glyph)
            .map(|(name, t)| (name.as_str(), t))
    }

    /// First tile template with the requested accessibility, by name order.
    pub fn tile_with_access(&self, accessible: bool) -> Option<&str> {
        let mut names: Vec<&String> = self
            .tiles
            .iter()
            .filter(|(_, t)| t.accessible == accessible)
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names.first().map(|n| n.as_str())
    }

    /// Base duration of an action, if the timing table lists it.
    pub fn duration(&self, action: ActionType) -> Option<u64> {
        self.action_timings.get(action.name()).copied()
    }
}
