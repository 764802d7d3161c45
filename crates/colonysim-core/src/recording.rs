//! Change notifications and their binary recording.
//!
//! Every observable state change the engine makes (an actor stepping to a
//! new tile, a tile opening up, a designation being claimed) is appended
//! to the [`ChangeLog`] as a [`ChangeEvent`]. Presentation layers can drain
//! the log each tick; tests and tools can save it with bincode.

use std::io::{Read, Write};

use colonysim_logic::{AreaId, GridPos};
use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::error::RecordingError;

/// Version number for the recording format (increment when it changes)
const RECORDING_VERSION: u32 = 1;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    Entity(Entity),
    Tile(GridPos),
    Designation(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    Position,
    Accessible,
    Area,
    ActiveState,
    DesignationStatus,
    HeldItems,
    Remaining,
    Spawned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeValue {
    None,
    Position(GridPos),
    Flag(bool),
    Area(AreaId),
    Count(u32),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub tick: u64,
    pub subject: Subject,
    pub property: Property,
    pub old: ChangeValue,
    pub new: ChangeValue,
}

#[derive(Serialize, Deserialize)]
struct Recording {
    version: u32,
    events: Vec<ChangeEvent>,
}

/// Append-only list of change events.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    events: Vec<ChangeEvent>,
    enabled: bool,
}

impl ChangeLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            events: Vec::new(),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(
        &mut self,
        tick: u64,
        subject: Subject,
        property: Property,
        old: ChangeValue,
        new: ChangeValue,
    ) {
        if !self.enabled || old == new {
            return;
        }
        self.events.push(ChangeEvent {
            tick,
            subject,
            property,
            old,
            new,
        });
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    /// Events concerning one subject, oldest first.
    pub fn for_subject(&self, subject: Subject) -> impl Iterator<Item = &ChangeEvent> {
        self.events.iter().filter(move |e| e.subject == subject)
    }

    /// Take every pending event, leaving the log empty.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Write the log to a writer.
    pub fn save<W: Write>(&self, writer: W) -> Result<(), RecordingError> {
        let recording = Recording {
            version: RECORDING_VERSION,
            events: self.events.clone(),
        };
        bincode::serialize_into(writer, &recording)?;
        Ok(())
    }

    /// Read a log previously written by [`ChangeLog::save`].
    pub fn load<R: Read>(reader: R) -> Result<Self, RecordingError> {
        let recording: Recording = bincode::deserialize_from(reader)?;
        if recording.version != RECORDING_VERSION {
            return Err(RecordingError::VersionMismatch {
                expected: RECORDING_VERSION,
                found: recording.version,
            });
        }
        Ok(Self {
            events: recording.events,
            enabled: true,
        })
    }

    /// Save to a file path.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), RecordingError> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        self.save(writer)
    }

    /// Load from a file path.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, RecordingError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Self::load(reader)
    }
}
