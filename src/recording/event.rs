// src/recording/event.rs
//! Match event model
//!
//! A [`MatchEvent`] is one occurrence during a match: a timestamp, a kind and
//! the kind-dependent payload. The payload is a closed enum, so the typed
//! factories cannot produce a field that is illegal for their kind. Sparse
//! input (decoded rows, collaborator-built records) goes through
//! [`MatchEvent::from_fields`], which rejects illegal and missing fields.

use crate::utils::errors::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event kinds
///
/// The integer persisted in the `event_type` column comes from
/// [`EventKind::ordinal`], never from the variant order. Ordinals are
/// append-only: existing values are never reassigned or removed, new kinds
/// take the next free value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MatchStart,
    MatchEnd,
    Spawn,
    Death,
    Position,
    WoolTouch,
    WoolCapture,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::MatchStart,
        EventKind::MatchEnd,
        EventKind::Spawn,
        EventKind::Death,
        EventKind::Position,
        EventKind::WoolTouch,
        EventKind::WoolCapture,
    ];

    /// Persisted ordinal
    pub fn ordinal(self) -> i32 {
        match self {
            EventKind::MatchStart => 0,
            EventKind::MatchEnd => 1,
            EventKind::Spawn => 2,
            EventKind::Death => 3,
            EventKind::Position => 4,
            EventKind::WoolTouch => 5,
            EventKind::WoolCapture => 6,
        }
    }

    /// Kind for a persisted ordinal, `None` for ordinals this build does not know
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        match ordinal {
            0 => Some(EventKind::MatchStart),
            1 => Some(EventKind::MatchEnd),
            2 => Some(EventKind::Spawn),
            3 => Some(EventKind::Death),
            4 => Some(EventKind::Position),
            5 => Some(EventKind::WoolTouch),
            6 => Some(EventKind::WoolCapture),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::MatchStart => "match_start",
            EventKind::MatchEnd => "match_end",
            EventKind::Spawn => "spawn",
            EventKind::Death => "death",
            EventKind::Position => "position",
            EventKind::WoolTouch => "wool_touch",
            EventKind::WoolCapture => "wool_capture",
        }
    }

    /// Every optional field that may be populated for this kind
    pub fn legal_fields(self) -> &'static [Field] {
        use Field::*;
        match self {
            EventKind::MatchStart => &[MapName],
            EventKind::MatchEnd => &[],
            EventKind::Spawn => &[SubjectId, X, Y, Z],
            EventKind::Death => &[SubjectId, X, Y, Z, KillerId],
            EventKind::Position => &[SubjectId, X, Y, Z, HeldItem, InventoryCount],
            EventKind::WoolTouch | EventKind::WoolCapture => &[SubjectId, X, Y, Z, ObjectiveId],
        }
    }

    /// Fields that must be populated for this kind
    pub fn required_fields(self) -> &'static [Field] {
        use Field::*;
        match self {
            EventKind::MatchStart | EventKind::MatchEnd => &[],
            EventKind::Spawn
            | EventKind::Death
            | EventKind::WoolTouch
            | EventKind::WoolCapture => &[SubjectId, X, Y, Z],
            EventKind::Position => &[SubjectId, X, Y, Z, InventoryCount],
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional event fields, named after their artifact columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SubjectId,
    X,
    Y,
    Z,
    HeldItem,
    InventoryCount,
    KillerId,
    ObjectiveId,
    MapName,
}

impl Field {
    pub fn column_name(self) -> &'static str {
        match self {
            Field::SubjectId => "player_id",
            Field::X => "x",
            Field::Y => "y",
            Field::Z => "z",
            Field::HeldItem => "held_item",
            Field::InventoryCount => "inventory_count",
            Field::KillerId => "killer_id",
            Field::ObjectiveId => "wool_id",
            Field::MapName => "map_name",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Integer block coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing a raw world position (truncates toward zero)
    pub fn from_world(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: x as i32,
            y: y as i32,
            z: z as i32,
        }
    }
}

/// Sparse field set, one `Option` per optional column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    #[serde(rename = "player_id", skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_item: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killer_id: Option<i32>,
    #[serde(rename = "wool_id", skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
}

impl EventFields {
    pub fn is_present(&self, field: Field) -> bool {
        match field {
            Field::SubjectId => self.subject_id.is_some(),
            Field::X => self.x.is_some(),
            Field::Y => self.y.is_some(),
            Field::Z => self.z.is_some(),
            Field::HeldItem => self.held_item.is_some(),
            Field::InventoryCount => self.inventory_count.is_some(),
            Field::KillerId => self.killer_id.is_some(),
            Field::ObjectiveId => self.objective_id.is_some(),
            Field::MapName => self.map_name.is_some(),
        }
    }

    /// Populated fields, in column order
    pub fn present(&self) -> Vec<Field> {
        const ORDER: [Field; 9] = [
            Field::SubjectId,
            Field::X,
            Field::Y,
            Field::Z,
            Field::HeldItem,
            Field::InventoryCount,
            Field::KillerId,
            Field::ObjectiveId,
            Field::MapName,
        ];
        ORDER.into_iter().filter(|f| self.is_present(*f)).collect()
    }

    fn position(&self) -> Option<BlockPos> {
        Some(BlockPos::new(self.x?, self.y?, self.z?))
    }
}

/// Kind-dependent payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    MatchStart {
        map_name: Option<String>,
    },
    MatchEnd,
    Spawn {
        subject_id: i32,
        pos: BlockPos,
    },
    Death {
        subject_id: i32,
        pos: BlockPos,
        killer_id: Option<i32>,
    },
    Position {
        subject_id: i32,
        pos: BlockPos,
        held_item: Option<i32>,
        inventory_count: i32,
    },
    WoolTouch {
        subject_id: i32,
        pos: BlockPos,
        objective_id: Option<i32>,
    },
    WoolCapture {
        subject_id: i32,
        pos: BlockPos,
        objective_id: Option<i32>,
    },
}

/// One recorded occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    timestamp: i32,
    body: EventBody,
}

impl MatchEvent {
    /// Match start, always at timestamp 0
    pub fn match_start(map_name: Option<String>) -> Self {
        Self {
            timestamp: 0,
            body: EventBody::MatchStart { map_name },
        }
    }

    pub fn match_end(timestamp: i32) -> Self {
        Self {
            timestamp,
            body: EventBody::MatchEnd,
        }
    }

    pub fn spawn(timestamp: i32, subject_id: i32, pos: BlockPos) -> Self {
        Self {
            timestamp,
            body: EventBody::Spawn { subject_id, pos },
        }
    }

    pub fn death(timestamp: i32, subject_id: i32, pos: BlockPos, killer_id: Option<i32>) -> Self {
        Self {
            timestamp,
            body: EventBody::Death {
                subject_id,
                pos,
                killer_id,
            },
        }
    }

    pub fn position(
        timestamp: i32,
        subject_id: i32,
        pos: BlockPos,
        held_item: Option<i32>,
        inventory_count: i32,
    ) -> Self {
        Self {
            timestamp,
            body: EventBody::Position {
                subject_id,
                pos,
                held_item,
                inventory_count,
            },
        }
    }

    pub fn wool_touch(timestamp: i32, subject_id: i32, pos: BlockPos, objective_id: Option<i32>) -> Self {
        Self {
            timestamp,
            body: EventBody::WoolTouch {
                subject_id,
                pos,
                objective_id,
            },
        }
    }

    pub fn wool_capture(timestamp: i32, subject_id: i32, pos: BlockPos, objective_id: Option<i32>) -> Self {
        Self {
            timestamp,
            body: EventBody::WoolCapture {
                subject_id,
                pos,
                objective_id,
            },
        }
    }

    /// Build an event from a sparse field set.
    ///
    /// Fails with [`TelemetryError::InvalidEvent`] if a field is populated
    /// that `kind` does not allow, or a field `kind` requires is missing.
    pub fn from_fields(timestamp: i32, kind: EventKind, fields: EventFields) -> Result<Self> {
        for field in fields.present() {
            if !kind.legal_fields().contains(&field) {
                return Err(TelemetryError::InvalidEvent(format!(
                    "{} is not legal for {}",
                    field, kind
                )));
            }
        }
        for field in kind.required_fields() {
            if !fields.is_present(*field) {
                return Err(TelemetryError::InvalidEvent(format!(
                    "{} is required for {}",
                    field, kind
                )));
            }
        }

        // Required fields were checked above.
        let missing = || TelemetryError::InvalidEvent(format!("incomplete {} fields", kind));
        let body = match kind {
            EventKind::MatchStart => EventBody::MatchStart {
                map_name: fields.map_name,
            },
            EventKind::MatchEnd => EventBody::MatchEnd,
            EventKind::Spawn => EventBody::Spawn {
                subject_id: fields.subject_id.ok_or_else(missing)?,
                pos: fields.position().ok_or_else(missing)?,
            },
            EventKind::Death => EventBody::Death {
                subject_id: fields.subject_id.ok_or_else(missing)?,
                pos: fields.position().ok_or_else(missing)?,
                killer_id: fields.killer_id,
            },
            EventKind::Position => EventBody::Position {
                subject_id: fields.subject_id.ok_or_else(missing)?,
                pos: fields.position().ok_or_else(missing)?,
                held_item: fields.held_item,
                inventory_count: fields.inventory_count.ok_or_else(missing)?,
            },
            EventKind::WoolTouch => EventBody::WoolTouch {
                subject_id: fields.subject_id.ok_or_else(missing)?,
                pos: fields.position().ok_or_else(missing)?,
                objective_id: fields.objective_id,
            },
            EventKind::WoolCapture => EventBody::WoolCapture {
                subject_id: fields.subject_id.ok_or_else(missing)?,
                pos: fields.position().ok_or_else(missing)?,
                objective_id: fields.objective_id,
            },
        };

        Ok(Self { timestamp, body })
    }

    pub fn timestamp(&self) -> i32 {
        self.timestamp
    }

    pub fn body(&self) -> &EventBody {
        &self.body
    }

    pub fn kind(&self) -> EventKind {
        match self.body {
            EventBody::MatchStart { .. } => EventKind::MatchStart,
            EventBody::MatchEnd => EventKind::MatchEnd,
            EventBody::Spawn { .. } => EventKind::Spawn,
            EventBody::Death { .. } => EventKind::Death,
            EventBody::Position { .. } => EventKind::Position,
            EventBody::WoolTouch { .. } => EventKind::WoolTouch,
            EventBody::WoolCapture { .. } => EventKind::WoolCapture,
        }
    }

    /// Subject the event concerns, if any
    pub fn subject_id(&self) -> Option<i32> {
        match self.body {
            EventBody::MatchStart { .. } | EventBody::MatchEnd => None,
            EventBody::Spawn { subject_id, .. }
            | EventBody::Death { subject_id, .. }
            | EventBody::Position { subject_id, .. }
            | EventBody::WoolTouch { subject_id, .. }
            | EventBody::WoolCapture { subject_id, .. } => Some(subject_id),
        }
    }

    /// Sparse field set for this event; absent fields stay `None`
    pub fn fields(&self) -> EventFields {
        let located = |subject_id: i32, pos: BlockPos| EventFields {
            subject_id: Some(subject_id),
            x: Some(pos.x),
            y: Some(pos.y),
            z: Some(pos.z),
            ..EventFields::default()
        };

        match &self.body {
            EventBody::MatchStart { map_name } => EventFields {
                map_name: map_name.clone(),
                ..EventFields::default()
            },
            EventBody::MatchEnd => EventFields::default(),
            EventBody::Spawn { subject_id, pos } => located(*subject_id, *pos),
            EventBody::Death {
                subject_id,
                pos,
                killer_id,
            } => EventFields {
                killer_id: *killer_id,
                ..located(*subject_id, *pos)
            },
            EventBody::Position {
                subject_id,
                pos,
                held_item,
                inventory_count,
            } => EventFields {
                held_item: *held_item,
                inventory_count: Some(*inventory_count),
                ..located(*subject_id, *pos)
            },
            EventBody::WoolTouch {
                subject_id,
                pos,
                objective_id,
            }
            | EventBody::WoolCapture {
                subject_id,
                pos,
                objective_id,
            } => EventFields {
                objective_id: *objective_id,
                ..located(*subject_id, *pos)
            },
        }
    }
}
