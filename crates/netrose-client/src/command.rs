//! Replay commands: the unit of work a [`CommandQueue`](crate::queue::CommandQueue)
//! executes against a grid motion model.
//!
//! A [`Command`] knows how to apply itself ([`Command::execute`]). Every
//! variant except [`Command::StartMovement`] completes instantly; a movement
//! only *starts* here and is then tracked by the queue until the model reports
//! that the step finished or was cancelled.
//!
//! # Drift correction
//!
//! A `StartMovement` records the start cell reported by the server. If the
//! model is somewhere else when the command runs (skipped or batched updates,
//! an earlier correction upstream), the command first teleports silently to the
//! recorded cell and only then starts the step, so the step always lands where
//! the server's did.

use std::fmt;

use netrose_grid::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// CommandTicket
// ---------------------------------------------------------------------------

/// Identifies one enqueued command for the lifetime of its queue.
///
/// Tickets are handed out in strictly increasing order, so comparing two
/// tickets compares their enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandTicket(pub u64);

impl fmt::Display for CommandTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One replayable state change for a networked object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Place the object on `map` at `(x, y)`.
    Attach { map: MapId, x: u16, y: u16 },
    /// Jump to `(x, y)` on the current map.
    Teleport { x: u16, y: u16 },
    /// Start a one-cell step in `direction` from the server-reported cell.
    StartMovement {
        direction: Direction,
        start_x: u16,
        start_y: u16,
    },
    SpeedChange { speed: u32 },
    OrientationChange { direction: Direction },
    Detach,
}

/// What happened when a command was executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// An instant command took effect.
    Applied,
    /// A step started and must now be tracked until it ends.
    MovementStarted {
        /// Whether a silent teleport to the recorded start cell was needed.
        corrected: bool,
    },
    /// The model refused to start the step.
    MovementRejected { corrected: bool },
    /// The model refused the command outright.
    Failed(GridError),
}

impl Command {
    /// Whether this command drives a step that outlives its execution.
    pub fn is_movement(&self) -> bool {
        matches!(self, Command::StartMovement { .. })
    }

    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Attach { .. } => "attach",
            Command::Teleport { .. } => "teleport",
            Command::StartMovement { .. } => "start_movement",
            Command::SpeedChange { .. } => "speed_change",
            Command::OrientationChange { .. } => "orientation_change",
            Command::Detach => "detach",
        }
    }

    /// Apply this command to `model`.
    ///
    /// Position changes made here are silent: the command replays state the
    /// server already animated. Only the step started by `StartMovement` is
    /// animated.
    pub fn execute<M: GridMotion>(&self, model: &mut M) -> Execution {
        let result = match *self {
            Command::Attach { map, x, y } => model.attach(map, x, y, true),
            Command::Teleport { x, y } => model.teleport(x, y, true),
            Command::StartMovement {
                direction,
                start_x,
                start_y,
            } => return start_movement(model, direction, GridPosition::new(start_x, start_y)),
            Command::SpeedChange { speed } => {
                model.set_speed(speed);
                Ok(())
            }
            Command::OrientationChange { direction } => {
                model.set_orientation(direction);
                Ok(())
            }
            Command::Detach => {
                model.detach();
                Ok(())
            }
        };
        match result {
            Ok(()) => Execution::Applied,
            Err(e) => Execution::Failed(e),
        }
    }
}

/// Reconcile drift against `start`, then try to start the step.
fn start_movement<M: GridMotion>(model: &mut M, direction: Direction, start: GridPosition) -> Execution {
    let corrected = model.position() != Some(start);
    if corrected {
        debug!(
            from = ?model.position(),
            to = %start,
            "correcting drift before movement"
        );
        if let Err(e) = model.teleport(start.x, start.y, true) {
            return Execution::Failed(e);
        }
    }

    // Never a continuation: the queue only starts steps on an idle model.
    if model.start_movement(direction, false, false) {
        Execution::MovementStarted { corrected }
    } else {
        Execution::MovementRejected { corrected }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn object_at(x: u16, y: u16) -> MapObject {
        let catalog = Arc::new(
            MapCatalog::new()
                .with_map(GridMap::new(MapId(1), 10, 10).with_blocked(0, 9))
                .with_map(GridMap::new(MapId(2), 4, 4)),
        );
        let mut obj = MapObject::new(catalog);
        obj.attach(MapId(1), x, y, true).unwrap();
        obj
    }

    fn start(direction: Direction, x: u16, y: u16) -> Command {
        Command::StartMovement {
            direction,
            start_x: x,
            start_y: y,
        }
    }

    #[test]
    fn instant_commands_apply() {
        let mut obj = object_at(1, 1);

        assert_eq!(Command::SpeedChange { speed: 9 }.execute(&mut obj), Execution::Applied);
        assert_eq!(obj.speed(), 9);

        let turn = Command::OrientationChange { direction: Direction::Left };
        assert_eq!(turn.execute(&mut obj), Execution::Applied);
        assert_eq!(obj.orientation(), Direction::Left);

        let attach = Command::Attach { map: MapId(2), x: 3, y: 3 };
        assert_eq!(attach.execute(&mut obj), Execution::Applied);
        assert_eq!(obj.map(), Some(MapId(2)));

        assert_eq!(Command::Detach.execute(&mut obj), Execution::Applied);
        assert_eq!(obj.map(), None);
    }

    #[test]
    fn failing_instant_command_reports_grid_error() {
        let mut obj = object_at(1, 1);
        let result = Command::Teleport { x: 50, y: 0 }.execute(&mut obj);
        assert!(matches!(result, Execution::Failed(GridError::OutOfBounds { .. })));
        assert_eq!(obj.position(), Some(GridPosition::new(1, 1)));
    }

    #[test]
    fn movement_from_current_cell_needs_no_correction() {
        let mut obj = object_at(5, 5);
        let result = start(Direction::Right, 5, 5).execute(&mut obj);
        assert_eq!(result, Execution::MovementStarted { corrected: false });
        assert_eq!(obj.movement(), Some(Direction::Right));
    }

    #[test]
    fn drifted_movement_teleports_silently_first() {
        let mut obj = object_at(2, 2);
        let events = obj.subscribe();

        let result = start(Direction::Up, 7, 7).execute(&mut obj);
        assert_eq!(result, Execution::MovementStarted { corrected: true });

        let events = events.drain();
        assert_eq!(
            events[0],
            MotionEvent::Teleported {
                position: GridPosition::new(7, 7),
                silent: true
            }
        );
        obj.finish_movement();
        assert_eq!(obj.position(), Some(GridPosition::new(7, 8)));
    }

    #[test]
    fn blocked_movement_is_rejected_after_correction() {
        let mut obj = object_at(3, 3);
        let result = start(Direction::Up, 0, 8).execute(&mut obj);
        assert_eq!(result, Execution::MovementRejected { corrected: true });
        assert_eq!(obj.position(), Some(GridPosition::new(0, 8)));
        assert!(!obj.is_moving());
    }

    #[test]
    fn movement_on_detached_model_fails() {
        let mut obj = object_at(3, 3);
        obj.detach();
        let result = start(Direction::Up, 3, 3).execute(&mut obj);
        assert_eq!(result, Execution::Failed(GridError::NotAttached));
    }

    #[test]
    fn only_start_movement_is_movement() {
        assert!(start(Direction::Down, 0, 0).is_movement());
        assert!(!Command::Detach.is_movement());
        assert!(!Command::Teleport { x: 0, y: 0 }.is_movement());
    }
}
