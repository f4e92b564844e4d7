//! The grid motion contract consumed by network synchronization.
//!
//! [`GridMotion`] is the interface a command queue drives: queries for the
//! current cell and orientation, commands that attach, teleport and move the
//! object, and an event subscription reporting movement start, finish and
//! cancellation.
//!
//! # Subscriptions
//!
//! [`GridMotion::subscribe`] hands out a [`MotionSubscription`]. The
//! subscription owns the receiving half of an unbounded channel; dropping it
//! deregisters the listener. Implementations keep their listeners in a
//! [`MotionListeners`] set, which prunes closed listeners on every emission, so
//! a subscription scoped to one movement never leaks past that movement.

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::direction::{Direction, GridPosition};
use crate::map::MapId;
use crate::GridError;

// ---------------------------------------------------------------------------
// MotionEvent
// ---------------------------------------------------------------------------

/// A state change reported by a grid motion model, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionEvent {
    /// The object was placed on a map.
    Attached {
        map: MapId,
        position: GridPosition,
        silent: bool,
    },
    /// The object was removed from its map.
    Detached,
    /// The object jumped to a cell without moving through the cells between.
    Teleported { position: GridPosition, silent: bool },
    /// A one-cell step started from `from`.
    MovementStarted {
        from: GridPosition,
        direction: Direction,
        silent: bool,
    },
    /// A step ended; `position` is the cell the object landed on.
    MovementFinished {
        position: GridPosition,
        direction: Direction,
    },
    /// A step was aborted; `position` is the cell the object rolled back to.
    MovementCancelled {
        position: GridPosition,
        direction: Direction,
    },
    SpeedChanged { speed: u32 },
    OrientationChanged { direction: Direction },
}

impl MotionEvent {
    /// Whether this event ends an in-progress step (finish or cancel).
    pub fn ends_movement(&self) -> bool {
        matches!(
            self,
            MotionEvent::MovementFinished { .. } | MotionEvent::MovementCancelled { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// MotionSubscription / MotionListeners
// ---------------------------------------------------------------------------

/// A live registration for [`MotionEvent`]s. Dropping it deregisters.
#[derive(Debug)]
pub struct MotionSubscription {
    rx: Receiver<MotionEvent>,
}

impl MotionSubscription {
    /// Take every event delivered since the last drain, oldest first.
    pub fn drain(&self) -> Vec<MotionEvent> {
        self.rx.try_iter().collect()
    }

    /// Number of undelivered events.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// The listener set behind [`GridMotion::subscribe`].
#[derive(Debug, Default)]
pub struct MotionListeners {
    senders: Vec<Sender<MotionEvent>>,
}

impl MotionListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener.
    pub fn subscribe(&mut self) -> MotionSubscription {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders.push(tx);
        MotionSubscription { rx }
    }

    /// Deliver `event` to every live listener and forget the closed ones.
    pub fn emit(&mut self, event: MotionEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Listeners still registered as of the last emission.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

// ---------------------------------------------------------------------------
// MotionState
// ---------------------------------------------------------------------------

/// A serializable view of everything a grid motion model knows.
///
/// Two models with equal `MotionState` are indistinguishable to network
/// synchronization; [`state_hash`](Self::state_hash) is used to compare a
/// client replica against the authoritative object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionState {
    pub map: Option<MapId>,
    pub position: Option<GridPosition>,
    pub orientation: Direction,
    pub movement: Option<Direction>,
    pub speed: u32,
}

impl MotionState {
    /// BLAKE3 hex digest of the canonical JSON encoding of this state.
    pub fn state_hash(&self) -> String {
        blake3::hash(&self.canonical_bytes()).to_hex().to_string()
    }

    /// Canonical byte encoding used for hashing (field order is fixed by the
    /// struct definition).
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Serializing plain data with derived impls cannot fail; fall back to
        // an empty buffer rather than panicking.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// GridMotion
// ---------------------------------------------------------------------------

/// A discrete grid object that moves one cell at a time.
///
/// While a step is in progress, [`position`](Self::position) still reports the
/// start cell; the destination becomes the position once the step finishes.
/// Cancelling a step rolls the object back to its start cell.
///
/// `silent` operations change state without movement visuals. They are still
/// reported through the subscription, flagged as silent.
pub trait GridMotion {
    // -- queries ------------------------------------------------------------

    /// The map the object is attached to, if any.
    fn map(&self) -> Option<MapId>;

    /// The current cell, if attached.
    fn position(&self) -> Option<GridPosition>;

    fn orientation(&self) -> Direction;

    /// The direction of the step in progress, if any.
    fn movement(&self) -> Option<Direction>;

    fn is_moving(&self) -> bool {
        self.movement().is_some()
    }

    /// Cells per second.
    fn speed(&self) -> u32;

    fn state(&self) -> MotionState {
        MotionState {
            map: self.map(),
            position: self.position(),
            orientation: self.orientation(),
            movement: self.movement(),
            speed: self.speed(),
        }
    }

    // -- commands -----------------------------------------------------------

    /// Place the object on `map` at `(x, y)`, aborting any step in progress.
    fn attach(&mut self, map: MapId, x: u16, y: u16, silent: bool) -> Result<(), GridError>;

    /// Remove the object from its map, aborting any step in progress.
    fn detach(&mut self);

    /// Jump to `(x, y)` on the current map, aborting any step in progress.
    fn teleport(&mut self, x: u16, y: u16, silent: bool) -> Result<(), GridError>;

    /// Try to start a step. Returns whether the step was accepted.
    ///
    /// `continuated` means the caller considers this step a continuation of
    /// the current one, so an in-progress step does not cause a rejection.
    fn start_movement(&mut self, direction: Direction, continuated: bool, silent: bool) -> bool;

    /// Land the step in progress on its destination immediately.
    fn finish_movement(&mut self);

    /// Abort the step in progress and roll back to its start cell.
    fn cancel_movement(&mut self);

    fn set_speed(&mut self, speed: u32);

    fn set_orientation(&mut self, direction: Direction);

    /// Advance the step in progress by `dt` seconds.
    fn advance(&mut self, dt: f64);

    /// Register for [`MotionEvent`]s. Dropping the subscription deregisters.
    fn subscribe(&mut self) -> MotionSubscription;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
