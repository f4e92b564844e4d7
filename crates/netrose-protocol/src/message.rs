//! The event vocabulary exchanged between the authoritative server and its
//! client replicas.
//!
//! Every message travels inside an [`Envelope`] scoped by `(scope, object)`.
//! The `data` payload of the snapshot messages is generic: its schema is known
//! to both ends, and the raw-bytes default ([`RawData`]) is carried
//! length-prefixed.
//!
//! # Wire order
//!
//! The declaration order of [`Message`] variants is the wire variant index and
//! must not change: `Spawned` = 0, `Refreshed` = 1, `Despawned` = 2,
//! `Attached` = 3, `Detached` = 4, `Teleported` = 5, `MovementStarted` = 6,
//! `MovementCancelled` = 7, `MovementFinished` = 8, `SpeedChanged` = 9,
//! `OrientationChanged` = 10.

use netrose_grid::direction::{Direction, GridPosition};
use netrose_grid::map::MapId;
use serde::{Deserialize, Serialize};

use crate::ids::{EntityHandle, ObjectId, ScopeId};

/// Default snapshot payload: opaque, length-prefixed bytes.
pub type RawData = Vec<u8>;

// ---------------------------------------------------------------------------
// Snapshot payloads
// ---------------------------------------------------------------------------

/// Where an object is: the map it is attached to and its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub map: MapId,
    pub position: GridPosition,
}

impl Attachment {
    pub fn new(map: MapId, x: u16, y: u16) -> Self {
        Self {
            map,
            position: GridPosition::new(x, y),
        }
    }
}

/// Full state sent when an object becomes visible to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpawned<D = RawData> {
    pub data: D,
    pub orientation: Direction,
    pub speed: u32,
    pub attachment: Option<Attachment>,
    /// Direction of the step in progress on the server, if any.
    pub movement: Option<Direction>,
}

/// Periodic resynchronization of an already visible object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRefreshed<D = RawData> {
    pub data: D,
    pub attachment: Option<Attachment>,
    pub movement: Option<Direction>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One synchronization event for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message<D = RawData> {
    Spawned(ObjectSpawned<D>),
    Refreshed(ObjectRefreshed<D>),
    Despawned,
    Attached { map: MapId, x: u16, y: u16 },
    Detached,
    Teleported { x: u16, y: u16 },
    /// A step started on the server from `(x, y)`.
    MovementStarted { x: u16, y: u16, direction: Direction },
    /// A step was aborted on the server; the object is back at `(x, y)`.
    MovementCancelled { x: u16, y: u16 },
    /// A step completed on the server; the object landed on `(x, y)`.
    MovementFinished { x: u16, y: u16 },
    SpeedChanged { speed: u32 },
    OrientationChanged { direction: Direction },
}

impl<D> Message<D> {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Spawned(_) => "spawned",
            Message::Refreshed(_) => "refreshed",
            Message::Despawned => "despawned",
            Message::Attached { .. } => "attached",
            Message::Detached => "detached",
            Message::Teleported { .. } => "teleported",
            Message::MovementStarted { .. } => "movement_started",
            Message::MovementCancelled { .. } => "movement_cancelled",
            Message::MovementFinished { .. } => "movement_finished",
            Message::SpeedChanged { .. } => "speed_changed",
            Message::OrientationChanged { .. } => "orientation_changed",
        }
    }

    /// Whether this message carries a full or partial state snapshot.
    pub fn is_snapshot(&self) -> bool {
        matches!(self, Message::Spawned(_) | Message::Refreshed(_))
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A [`Message`] addressed to one object of one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<D = RawData> {
    pub scope: ScopeId,
    pub object: ObjectId,
    pub message: Message<D>,
}

impl<D> Envelope<D> {
    pub fn new(handle: EntityHandle, message: Message<D>) -> Self {
        Self {
            scope: handle.scope,
            object: handle.object,
            message,
        }
    }

    pub fn handle(&self) -> EntityHandle {
        EntityHandle::new(self.scope, self.object)
    }
}
