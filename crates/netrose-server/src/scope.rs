//! A group of authoritative objects visible together, and their outbox.
//!
//! The outbox keeps, per object, the exact order in which things happened:
//! the spawn snapshot first, then every model change, then the despawn.
//! Object changes are collected lazily; [`flush`](ServerScope::flush) pulls
//! them in, and every operation that appends a snapshot flushes first.

use std::collections::BTreeMap;

use netrose_grid::prelude::*;
use netrose_protocol::prelude::*;
use serde::Serialize;
use tracing::{debug, debug_span};

use crate::object::ServerObject;
use crate::ServerError;

#[derive(Debug)]
pub struct ServerScope<D = RawData> {
    id: ScopeId,
    objects: BTreeMap<ObjectId, ServerObject<D>>,
    outbox: Vec<Envelope<D>>,
}

impl<D: Clone> ServerScope<D> {
    pub fn new(id: ScopeId) -> Self {
        Self {
            id,
            objects: BTreeMap::new(),
            outbox: Vec::new(),
        }
    }

    /// Add an object and queue its spawn snapshot.
    pub fn spawn(&mut self, object: ObjectId, model: MapObject, data: D) -> Result<EntityHandle, ServerError> {
        let handle = EntityHandle::new(self.id, object);
        if self.objects.contains_key(&object) {
            return Err(ServerError::DuplicateObject { handle });
        }
        let obj = ServerObject::new(handle, model, data);
        self.outbox.push(obj.spawn_envelope());
        self.objects.insert(object, obj);
        debug!(%handle, "object spawned");
        Ok(handle)
    }

    /// Remove an object, queueing its pending changes and then the despawn.
    pub fn despawn(&mut self, object: ObjectId) -> Result<ServerObject<D>, ServerError> {
        let handle = EntityHandle::new(self.id, object);
        let obj = self
            .objects
            .remove(&object)
            .ok_or(ServerError::UnknownObject { handle })?;
        for message in obj.drain_messages() {
            self.outbox.push(Envelope::new(handle, message));
        }
        self.outbox.push(Envelope::new(handle, Message::Despawned));
        debug!(%handle, "object despawned");
        Ok(obj)
    }

    pub fn object(&self, object: ObjectId) -> Result<&ServerObject<D>, ServerError> {
        self.objects.get(&object).ok_or(ServerError::UnknownObject {
            handle: EntityHandle::new(self.id, object),
        })
    }

    pub fn object_mut(&mut self, object: ObjectId) -> Result<&mut ServerObject<D>, ServerError> {
        let handle = EntityHandle::new(self.id, object);
        self.objects
            .get_mut(&object)
            .ok_or(ServerError::UnknownObject { handle })
    }

    /// Advance every object by `dt` seconds and collect what changed.
    pub fn advance(&mut self, dt: f64) {
        let _span = debug_span!("advance", scope = self.id.0, dt).entered();
        for obj in self.objects.values_mut() {
            obj.advance(dt);
        }
        self.flush();
    }

    /// Queue a refresh snapshot for every object.
    pub fn refresh_all(&mut self) {
        self.flush();
        for obj in self.objects.values() {
            self.outbox.push(obj.refresh_envelope());
        }
    }

    /// Queue a full spawn snapshot for every object. Clients that already
    /// know an object treat it as a resynchronization, which also restores
    /// speed and orientation.
    pub fn resync_all(&mut self) {
        self.flush();
        for obj in self.objects.values() {
            self.outbox.push(obj.spawn_envelope());
        }
    }

    /// Move pending object changes into the outbox.
    pub fn flush(&mut self) {
        for obj in self.objects.values() {
            let handle = obj.handle();
            for message in obj.drain_messages() {
                self.outbox.push(Envelope::new(handle, message));
            }
        }
    }

    /// Take everything queued so far.
    pub fn drain_outbox(&mut self) -> Vec<Envelope<D>> {
        self.flush();
        std::mem::take(&mut self.outbox)
    }

    /// Take and encode everything queued so far.
    pub fn encode_outbox(&mut self) -> Result<Vec<Vec<u8>>, ServerError>
    where
        D: Serialize,
    {
        let envelopes = self.drain_outbox();
        Ok(codec::encode_all(&envelopes)?)
    }

    /// Envelopes queued but not yet drained (changes not yet flushed are not
    /// counted).
    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Whether no object has a step in progress.
    pub fn is_settled(&self) -> bool {
        self.objects.values().all(|o| !o.model().is_moving())
    }

    /// Every object's motion state, in object order.
    pub fn states(&self) -> impl Iterator<Item = (EntityHandle, MotionState)> + '_ {
        self.objects.values().map(|o| (o.handle(), o.model().state()))
    }

    /// Digest of every object's state, comparable to a client's
    /// `scope_state_hash` for the same scope.
    pub fn state_hash(&self) -> String {
        states_hash(self.states())
    }
}
