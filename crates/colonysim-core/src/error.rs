//! Error types for the simulation engine.

use colonysim_logic::{GridError, GridPos, SearchError, SpatialError};
use hecs::Entity;
use thiserror::Error;

use crate::designation::DesignationId;

/// Failures surfaced by [`crate::engine::SimulationEngine`] and the actor states.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Spatial(#[from] SpatialError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Designation(#[from] DesignationError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// A move was requested towards a destination marked unreachable.
    #[error("movement requested towards an unreachable destination")]
    InvalidDestination,
    #[error("unknown {kind} template '{name}'")]
    UnknownTemplate { kind: &'static str, name: String },
    #[error("entity {0:?} has no {1} component")]
    MissingComponent(Entity, &'static str),
    #[error("entity {0:?} does not exist")]
    NoSuchEntity(Entity),
    #[error("tile {0} is not accessible")]
    Inaccessible(GridPos),
}

impl EngineError {
    pub(crate) fn from_component<T>(entity: Entity, err: hecs::ComponentError) -> Self {
        match err {
            hecs::ComponentError::NoSuchEntity => EngineError::NoSuchEntity(entity),
            hecs::ComponentError::MissingComponent(_) => {
                EngineError::MissingComponent(entity, std::any::type_name::<T>())
            }
        }
    }
}

/// Designation protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignationError {
    #[error("designation {0} does not exist")]
    NotFound(DesignationId),
    #[error("designation {id} is already claimed by {holder:?}")]
    AlreadyClaimed { id: DesignationId, holder: Entity },
    #[error("designation {id} is not claimed by {actor:?}")]
    NotClaimedBy { id: DesignationId, actor: Entity },
    #[error("designation {0} is already completed")]
    AlreadyCompleted(DesignationId),
    #[error("the target of designation {0} no longer exists")]
    TargetMissing(DesignationId),
}

/// Problems loading template data or world layouts.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to parse templates: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown action type '{0}'")]
    UnknownAction(String),
    #[error("interactable '{interactable}' yields unknown item '{item}'")]
    UnknownYield { interactable: String, item: String },
    #[error("no tile template uses glyph '{0}'")]
    UnknownGlyph(char),
    #[error("tile glyph '{0}' is used by more than one template")]
    DuplicateGlyph(char),
    #[error("layout row {row} has width {found}, expected {expected}")]
    RaggedLayout {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("layout is empty")]
    EmptyLayout,
    #[error("no tile template with accessible={0}")]
    NoTileTemplate(bool),
}

/// Failures reading or writing a change recording.
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("recording version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}
