//! [`MapObject`] -- the reference [`GridMotion`] implementation.
//!
//! A `MapObject` lives on one map of a shared [`MapCatalog`]. Steps take
//! `1 / speed` seconds of [`advance`](GridMotion::advance) time. Authoritative
//! servers and client replicas use the same type, so a replica that replays
//! the server's events ends in the same [`MotionState`](crate::motion::MotionState).

use std::sync::Arc;

use tracing::trace;

use crate::direction::{Direction, GridPosition};
use crate::map::{MapCatalog, MapId};
use crate::motion::{GridMotion, MotionEvent, MotionListeners, MotionSubscription};
use crate::GridError;

/// Speed given to new objects, in cells per second.
pub const DEFAULT_SPEED: u32 = 4;

/// Progress at or above this value counts as a completed step.
const STEP_COMPLETE: f64 = 1.0 - 1e-9;

/// A step in progress.
#[derive(Debug, Clone, Copy)]
struct Step {
    direction: Direction,
    destination: GridPosition,
    /// Fraction of the step already covered, in `[0, 1)`.
    progress: f64,
}

/// A grid object bound to at most one map at a time.
#[derive(Debug)]
pub struct MapObject {
    catalog: Arc<MapCatalog>,
    map: Option<MapId>,
    position: Option<GridPosition>,
    orientation: Direction,
    step: Option<Step>,
    speed: u32,
    listeners: MotionListeners,
}

impl MapObject {
    /// Create a detached object facing down at [`DEFAULT_SPEED`].
    pub fn new(catalog: Arc<MapCatalog>) -> Self {
        Self {
            catalog,
            map: None,
            position: None,
            orientation: Direction::Down,
            step: None,
            speed: DEFAULT_SPEED,
            listeners: MotionListeners::new(),
        }
    }

    /// Builder-style: set the initial speed without emitting an event.
    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    /// Fraction of the current step already covered, if moving.
    pub fn step_progress(&self) -> Option<f64> {
        self.step.map(|s| s.progress)
    }

    /// BLAKE3 digest of [`GridMotion::state`].
    pub fn state_hash(&self) -> String {
        self.state().state_hash()
    }

    /// Listeners registered as of the last emitted event.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn catalog(&self) -> &Arc<MapCatalog> {
        &self.catalog
    }

    // -- internal helpers ---------------------------------------------------

    fn land(&mut self) {
        if let Some(step) = self.step.take() {
            self.position = Some(step.destination);
            trace!(direction = %step.direction, to = %step.destination, "step finished");
            self.listeners.emit(MotionEvent::MovementFinished {
                position: step.destination,
                direction: step.direction,
            });
        }
    }

    fn abort(&mut self) {
        if let Some(step) = self.step.take() {
            if let Some(position) = self.position {
                trace!(direction = %step.direction, at = %position, "step cancelled");
                self.listeners.emit(MotionEvent::MovementCancelled {
                    position,
                    direction: step.direction,
                });
            }
        }
    }
}

impl GridMotion for MapObject {
    fn map(&self) -> Option<MapId> {
        self.map
    }

    fn position(&self) -> Option<GridPosition> {
        self.position
    }

    fn orientation(&self) -> Direction {
        self.orientation
    }

    fn movement(&self) -> Option<Direction> {
        self.step.map(|s| s.direction)
    }

    fn speed(&self) -> u32 {
        self.speed
    }

    fn attach(&mut self, map: MapId, x: u16, y: u16, silent: bool) -> Result<(), GridError> {
        let position = GridPosition::new(x, y);
        self.catalog.resolve(map)?.check_bounds(position)?;

        self.abort();
        self.map = Some(map);
        self.position = Some(position);
        self.listeners.emit(MotionEvent::Attached {
            map,
            position,
            silent,
        });
        Ok(())
    }

    fn detach(&mut self) {
        if self.map.is_none() {
            return;
        }
        self.abort();
        self.map = None;
        self.position = None;
        self.listeners.emit(MotionEvent::Detached);
    }

    fn teleport(&mut self, x: u16, y: u16, silent: bool) -> Result<(), GridError> {
        let map = self.map.ok_or(GridError::NotAttached)?;
        let position = GridPosition::new(x, y);
        self.catalog.resolve(map)?.check_bounds(position)?;

        self.abort();
        self.position = Some(position);
        self.listeners
            .emit(MotionEvent::Teleported { position, silent });
        Ok(())
    }

    fn start_movement(&mut self, direction: Direction, continuated: bool, silent: bool) -> bool {
        if self.step.is_some() {
            if !continuated {
                return false;
            }
            self.land();
        }
        let (Some(map_id), Some(from)) = (self.map, self.position) else {
            return false;
        };
        if self.speed == 0 {
            return false;
        }
        let Some(destination) = from.step(direction) else {
            return false;
        };
        let walkable = self
            .catalog
            .get(map_id)
            .is_some_and(|map| map.is_walkable(destination));
        if !walkable {
            return false;
        }

        self.orientation = direction;
        self.step = Some(Step {
            direction,
            destination,
            progress: 0.0,
        });
        self.listeners.emit(MotionEvent::MovementStarted {
            from,
            direction,
            silent,
        });
        true
    }

    fn finish_movement(&mut self) {
        self.land();
    }

    fn cancel_movement(&mut self) {
        self.abort();
    }

    fn set_speed(&mut self, speed: u32) {
        if self.speed != speed {
            self.speed = speed;
            self.listeners.emit(MotionEvent::SpeedChanged { speed });
        }
    }

    fn set_orientation(&mut self, direction: Direction) {
        if self.orientation != direction {
            self.orientation = direction;
            self.listeners
                .emit(MotionEvent::OrientationChanged { direction });
        }
    }

    fn advance(&mut self, dt: f64) {
        let speed = f64::from(self.speed);
        if let Some(step) = self.step.as_mut() {
            step.progress += dt * speed;
            if step.progress >= STEP_COMPLETE {
                self.land();
            }
        }
    }

    fn subscribe(&mut self) -> MotionSubscription {
        self.listeners.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
