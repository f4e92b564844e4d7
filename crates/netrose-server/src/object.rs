//! One authoritative networked object.

use netrose_grid::prelude::*;
use netrose_protocol::prelude::*;
use tracing::trace;

use crate::ServerError;

/// An authoritative grid object and the payload clients see with it.
///
/// Every change to the model is observed through a subscription and turned
/// into a [`Message`] by [`drain_messages`](Self::drain_messages), in the
/// order the model emitted it.
#[derive(Debug)]
pub struct ServerObject<D = RawData> {
    handle: EntityHandle,
    model: MapObject,
    events: MotionSubscription,
    data: D,
}

impl<D> ServerObject<D> {
    /// Take ownership of `model`. Changes made to it before this call are
    /// not reported; they are part of the spawn snapshot.
    pub fn new(handle: EntityHandle, mut model: MapObject, data: D) -> Self {
        let events = model.subscribe();
        Self {
            handle,
            model,
            events,
            data,
        }
    }

    // -- authoritative operations --------------------------------------------

    pub fn attach(&mut self, map: MapId, x: u16, y: u16) -> Result<(), ServerError> {
        self.model.attach(map, x, y, false)?;
        Ok(())
    }

    pub fn detach(&mut self) {
        self.model.detach();
    }

    pub fn teleport(&mut self, x: u16, y: u16) -> Result<(), ServerError> {
        self.model.teleport(x, y, false)?;
        Ok(())
    }

    /// Start a step. Returns whether the model accepted it.
    pub fn start_movement(&mut self, direction: Direction) -> bool {
        self.model.start_movement(direction, false, false)
    }

    /// Land the current step (if any) and start the next one in one go.
    pub fn continue_movement(&mut self, direction: Direction) -> bool {
        self.model.start_movement(direction, true, false)
    }

    pub fn finish_movement(&mut self) {
        self.model.finish_movement();
    }

    pub fn cancel_movement(&mut self) {
        self.model.cancel_movement();
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.model.set_speed(speed);
    }

    pub fn set_orientation(&mut self, direction: Direction) {
        self.model.set_orientation(direction);
    }

    pub fn advance(&mut self, dt: f64) {
        self.model.advance(dt);
    }

    pub fn set_data(&mut self, data: D) {
        self.data = data;
    }

    // -- outbound -------------------------------------------------------------

    /// Translate every change since the last drain into wire messages.
    pub fn drain_messages(&self) -> Vec<Message<D>> {
        self.events
            .drain()
            .into_iter()
            .map(|event| {
                let message = to_message(event);
                trace!(handle = %self.handle, kind = message.kind(), "outgoing");
                message
            })
            .collect()
    }

    /// Full snapshot for a client that starts seeing this object.
    pub fn spawn_envelope(&self) -> Envelope<D>
    where
        D: Clone,
    {
        Envelope::new(
            self.handle,
            Message::Spawned(ObjectSpawned {
                data: self.data.clone(),
                orientation: self.model.orientation(),
                speed: self.model.speed(),
                attachment: self.attachment(),
                movement: self.model.movement(),
            }),
        )
    }

    /// Periodic resynchronization snapshot.
    pub fn refresh_envelope(&self) -> Envelope<D>
    where
        D: Clone,
    {
        Envelope::new(
            self.handle,
            Message::Refreshed(ObjectRefreshed {
                data: self.data.clone(),
                attachment: self.attachment(),
                movement: self.model.movement(),
            }),
        )
    }

    // -- accessors ------------------------------------------------------------

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    pub fn model(&self) -> &MapObject {
        &self.model
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    fn attachment(&self) -> Option<Attachment> {
        match (self.model.map(), self.model.position()) {
            (Some(map), Some(position)) => Some(Attachment { map, position }),
            _ => None,
        }
    }
}

/// The wire form of one model event.
fn to_message<D>(event: MotionEvent) -> Message<D> {
    match event {
        MotionEvent::Attached { map, position, .. } => Message::Attached {
            map,
            x: position.x,
            y: position.y,
        },
        MotionEvent::Detached => Message::Detached,
        MotionEvent::Teleported { position, .. } => Message::Teleported {
            x: position.x,
            y: position.y,
        },
        MotionEvent::MovementStarted { from, direction, .. } => Message::MovementStarted {
            x: from.x,
            y: from.y,
            direction,
        },
        MotionEvent::MovementCancelled { position, .. } => Message::MovementCancelled {
            x: position.x,
            y: position.y,
        },
        MotionEvent::MovementFinished { position, .. } => Message::MovementFinished {
            x: position.x,
            y: position.y,
        },
        MotionEvent::SpeedChanged { speed } => Message::SpeedChanged { speed },
        MotionEvent::OrientationChanged { direction } => Message::OrientationChanged { direction },
    }
}
