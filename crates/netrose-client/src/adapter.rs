//! Per-entity bridge between decoded wire events and a [`CommandQueue`].
//!
//! A [`SyncAdapter`] is the only way network state reaches an entity's grid
//! motion model. Attach, detach and teleport redefine where the entity is, so
//! they clear the queue and apply immediately. Movement, speed and orientation
//! are replayed through the queue in arrival order.
//!
//! The adapter gates everything on spawn: until a spawn snapshot has been
//! applied, and after despawn, every event is discarded.

use netrose_grid::prelude::*;
use netrose_protocol::prelude::*;
use tracing::{debug, trace, warn};

use crate::command::{Command, CommandTicket};
use crate::config::SyncConfig;
use crate::queue::CommandQueue;
use crate::SyncError;

/// Replica of one networked object.
#[derive(Debug)]
pub struct SyncAdapter<M: GridMotion, D = RawData> {
    handle: EntityHandle,
    queue: CommandQueue<M>,
    spawned: bool,
    data: Option<D>,
}

impl<M: GridMotion, D> SyncAdapter<M, D> {
    /// Wrap `model` in an unspawned adapter.
    pub fn new(handle: EntityHandle, model: M, config: &SyncConfig) -> Self {
        Self {
            handle,
            queue: CommandQueue::new(model, config),
            spawned: false,
            data: None,
        }
    }

    // -- snapshots ----------------------------------------------------------

    /// Apply a spawn snapshot and open the gate.
    ///
    /// Also used to resynchronize an already spawned entity. On error nothing
    /// is applied and the spawned state is unchanged.
    pub fn inflate_from(&mut self, snapshot: ObjectSpawned<D>) -> Result<(), SyncError> {
        validate(snapshot.attachment, snapshot.movement)?;

        self.place(snapshot.attachment)?;
        self.queue.clear();
        let model = self.queue.model_mut();
        model.set_speed(snapshot.speed);
        model.set_orientation(snapshot.orientation);
        self.data = Some(snapshot.data);
        self.replay_movement(snapshot.attachment, snapshot.movement);

        if !self.spawned {
            debug!(handle = %self.handle, "entity spawned");
        }
        self.spawned = true;
        Ok(())
    }

    /// Apply a periodic refresh. Ignored while unspawned.
    pub fn update_from(&mut self, snapshot: ObjectRefreshed<D>) -> Result<(), SyncError> {
        if !self.gate("refresh") {
            return Ok(());
        }
        validate(snapshot.attachment, snapshot.movement)?;

        self.place(snapshot.attachment)?;
        self.queue.clear();
        self.data = Some(snapshot.data);
        self.replay_movement(snapshot.attachment, snapshot.movement);
        trace!(handle = %self.handle, "entity refreshed");
        Ok(())
    }

    /// Close the gate and drop all queued work. Always succeeds.
    pub fn despawn(&mut self) {
        self.queue.clear();
        if self.spawned {
            debug!(handle = %self.handle, "entity despawned");
        }
        self.spawned = false;
        self.data = None;
    }

    // -- immediate events ---------------------------------------------------

    pub fn on_attached(&mut self, map: MapId, x: u16, y: u16) -> Result<(), SyncError> {
        if !self.gate("attached") {
            return Ok(());
        }
        self.queue.clear();
        self.queue.model_mut().attach(map, x, y, true)?;
        Ok(())
    }

    pub fn on_detached(&mut self) {
        if !self.gate("detached") {
            return;
        }
        self.queue.clear();
        self.queue.model_mut().detach();
    }

    pub fn on_teleported(&mut self, x: u16, y: u16) -> Result<(), SyncError> {
        if !self.gate("teleported") {
            return Ok(());
        }
        self.queue.clear();
        self.queue.model_mut().teleport(x, y, true)?;
        Ok(())
    }

    // -- queued events ------------------------------------------------------

    pub fn on_movement_started(&mut self, x: u16, y: u16, direction: Direction) -> Option<CommandTicket> {
        if !self.gate("movement started") {
            return None;
        }
        Some(self.queue.enqueue(Command::StartMovement {
            direction,
            start_x: x,
            start_y: y,
        }))
    }

    /// Route a cancel to the last enqueued movement.
    pub fn on_movement_cancelled(&mut self, x: u16, y: u16) {
        if !self.gate("movement cancelled") {
            return;
        }
        if !self.queue.mark_cancelled() {
            trace!(handle = %self.handle, x, y, "cancel matched no movement");
        }
    }

    /// Route a finish to the last enqueued movement.
    pub fn on_movement_finished(&mut self, x: u16, y: u16) {
        if !self.gate("movement finished") {
            return;
        }
        if !self.queue.mark_will_finish() {
            trace!(handle = %self.handle, x, y, "finish matched no movement");
        }
    }

    pub fn on_speed_changed(&mut self, speed: u32) {
        if self.gate("speed changed") {
            self.queue.enqueue(Command::SpeedChange { speed });
        }
    }

    pub fn on_orientation_changed(&mut self, direction: Direction) {
        if self.gate("orientation changed") {
            self.queue.enqueue(Command::OrientationChange { direction });
        }
    }

    /// Dispatch one decoded message to its handler.
    pub fn handle_message(&mut self, message: Message<D>) -> Result<(), SyncError> {
        match message {
            Message::Spawned(snapshot) => self.inflate_from(snapshot)?,
            Message::Refreshed(snapshot) => self.update_from(snapshot)?,
            Message::Despawned => self.despawn(),
            Message::Attached { map, x, y } => self.on_attached(map, x, y)?,
            Message::Detached => self.on_detached(),
            Message::Teleported { x, y } => self.on_teleported(x, y)?,
            Message::MovementStarted { x, y, direction } => {
                self.on_movement_started(x, y, direction);
            }
            Message::MovementCancelled { x, y } => self.on_movement_cancelled(x, y),
            Message::MovementFinished { x, y } => self.on_movement_finished(x, y),
            Message::SpeedChanged { speed } => self.on_speed_changed(speed),
            Message::OrientationChanged { direction } => self.on_orientation_changed(direction),
        }
        Ok(())
    }

    /// Advance the model by `dt` and run one poll of the queue. Does nothing
    /// while unspawned.
    pub fn tick(&mut self, dt: f64) {
        if self.spawned {
            self.queue.tick(dt);
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    /// The payload of the latest applied snapshot.
    pub fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    pub fn queue(&self) -> &CommandQueue<M> {
        &self.queue
    }

    pub fn model(&self) -> &M {
        self.queue.model()
    }

    /// Whether the entity has no queued work and is standing still.
    pub fn is_settled(&self) -> bool {
        self.queue.is_idle() && !self.queue.model().is_moving()
    }

    // -- internal helpers ---------------------------------------------------

    fn gate(&self, event: &'static str) -> bool {
        if !self.spawned {
            debug!(handle = %self.handle, event, "event for unspawned entity discarded");
        }
        self.spawned
    }

    /// Attach to the snapshot's cell, or detach when it has none.
    fn place(&mut self, attachment: Option<Attachment>) -> Result<(), SyncError> {
        let model = self.queue.model_mut();
        match attachment {
            Some(Attachment { map, position }) => {
                model.attach(map, position.x, position.y, true).map_err(|e| {
                    warn!(handle = %self.handle, %map, %position, error = %e, "snapshot attachment refused");
                    SyncError::from(e)
                })
            }
            None => {
                model.detach();
                Ok(())
            }
        }
    }

    fn replay_movement(&mut self, attachment: Option<Attachment>, movement: Option<Direction>) {
        if let (Some(at), Some(direction)) = (attachment, movement) {
            self.queue.enqueue(Command::StartMovement {
                direction,
                start_x: at.position.x,
                start_y: at.position.y,
            });
        }
    }
}

/// Reject contradictory snapshots before anything is applied.
fn validate(attachment: Option<Attachment>, movement: Option<Direction>) -> Result<(), SyncError> {
    match (attachment, movement) {
        (None, Some(direction)) => {
            warn!(%direction, "snapshot has movement but no attachment");
            Err(SyncError::MovementWithoutAttachment { direction })
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
