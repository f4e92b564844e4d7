//! Client-side registry, dispatcher and fixed-timestep loop.
//!
//! The [`ClientWorld`] owns one [`SyncAdapter`] per visible object, keyed by
//! [`EntityHandle`]. The transport hands it raw envelopes
//! ([`receive`](ClientWorld::receive)) or decoded ones
//! ([`dispatch`](ClientWorld::dispatch)); the game loop calls
//! [`tick`](ClientWorld::tick) once per frame.
//!
//! Each tick advances every adapter by the same `fixed_dt`, in handle order,
//! and each adapter runs exactly one cooperative poll of its queue.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use netrose_client::prelude::*;
//! use netrose_grid::prelude::*;
//! use netrose_protocol::prelude::*;
//!
//! let catalog = Arc::new(MapCatalog::new().with_map(GridMap::new(MapId(1), 16, 16)));
//! let mut world: ClientWorld<MapObject> =
//!     ClientWorld::new(ClientConfig::default(), move |_| MapObject::new(catalog.clone()));
//!
//! let handle = EntityHandle::new(ScopeId(1), ObjectId(1));
//! world.dispatch(Envelope::new(handle, Message::Spawned(ObjectSpawned {
//!     data: Vec::new(),
//!     orientation: Direction::Down,
//!     speed: 4,
//!     attachment: Some(Attachment::new(MapId(1), 5, 5)),
//!     movement: Some(Direction::Right),
//! }))).unwrap();
//!
//! world.run_ticks(30);
//! let state = world.adapter(handle).unwrap().model().state();
//! assert_eq!(state.position, Some(GridPosition::new(6, 5)));
//! ```

use std::collections::BTreeMap;

use netrose_grid::prelude::*;
use netrose_protocol::prelude::*;
use serde::de::DeserializeOwned;
use tracing::{debug, debug_span, warn};

use crate::adapter::SyncAdapter;
use crate::config::ClientConfig;
use crate::ClientError;

/// Builds the grid motion model for a newly spawned entity.
pub type ModelFactory<M> = Box<dyn FnMut(EntityHandle) -> M>;

/// All replicas known to one client.
pub struct ClientWorld<M: GridMotion, D = RawData> {
    adapters: BTreeMap<EntityHandle, SyncAdapter<M, D>>,
    factory: ModelFactory<M>,
    config: ClientConfig,
    tick_counter: u64,
}

impl<M: GridMotion, D> ClientWorld<M, D> {
    /// Create an empty world.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(config: ClientConfig, factory: impl FnMut(EntityHandle) -> M + 'static) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            adapters: BTreeMap::new(),
            factory: Box::new(factory),
            config,
            tick_counter: 0,
        }
    }

    // -- inbound ------------------------------------------------------------

    /// Decode one envelope and dispatch it.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<(), ClientError>
    where
        D: DeserializeOwned,
    {
        let envelope = codec::decode(bytes)?;
        self.dispatch(envelope)
    }

    /// Route one envelope to its entity.
    ///
    /// A protocol violation is returned as [`ClientError::Sync`]; the entity
    /// keeps its last good state and the caller decides whether to despawn it.
    pub fn dispatch(&mut self, envelope: Envelope<D>) -> Result<(), ClientError> {
        let handle = envelope.handle();
        let _span = debug_span!("dispatch", %handle, kind = envelope.message.kind()).entered();

        match envelope.message {
            Message::Spawned(snapshot) => {
                if let Some(adapter) = self.adapters.get_mut(&handle) {
                    debug!("spawn for known entity; resynchronizing");
                    return adapter
                        .inflate_from(snapshot)
                        .map_err(|source| sync_error(handle, source));
                }
                let model = (self.factory)(handle);
                let mut adapter = SyncAdapter::new(handle, model, &self.config.sync);
                adapter
                    .inflate_from(snapshot)
                    .map_err(|source| sync_error(handle, source))?;
                self.adapters.insert(handle, adapter);
                Ok(())
            }
            Message::Despawned => {
                match self.adapters.remove(&handle) {
                    Some(mut adapter) => adapter.despawn(),
                    None => debug!("despawn for unknown entity discarded"),
                }
                Ok(())
            }
            message => match self.adapters.get_mut(&handle) {
                Some(adapter) => adapter
                    .handle_message(message)
                    .map_err(|source| sync_error(handle, source)),
                None => {
                    debug!("event for unknown entity discarded");
                    Ok(())
                }
            },
        }
    }

    /// Despawn and forget one entity. Returns whether it existed.
    pub fn despawn(&mut self, handle: EntityHandle) -> bool {
        match self.adapters.remove(&handle) {
            Some(mut adapter) => {
                adapter.despawn();
                true
            }
            None => false,
        }
    }

    // -- simulation ---------------------------------------------------------

    /// Advance every entity by one fixed time step.
    pub fn tick(&mut self) {
        let dt = self.config.fixed_dt;
        for adapter in self.adapters.values_mut() {
            adapter.tick(dt);
        }
        self.tick_counter += 1;
    }

    /// Run `count` ticks in sequence.
    pub fn run_ticks(&mut self, count: u64) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Tick until every entity is settled, up to `max_ticks`. Returns the
    /// number of ticks run.
    pub fn run_until_settled(&mut self, max_ticks: u64) -> u64 {
        let mut ran = 0;
        while ran < max_ticks && !self.is_settled() {
            self.tick();
            ran += 1;
        }
        ran
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Computed as `tick_count * fixed_dt`.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.config.fixed_dt
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.adapters.contains_key(&handle)
    }

    pub fn adapter(&self, handle: EntityHandle) -> Option<&SyncAdapter<M, D>> {
        self.adapters.get(&handle)
    }

    pub fn adapter_mut(&mut self, handle: EntityHandle) -> Option<&mut SyncAdapter<M, D>> {
        self.adapters.get_mut(&handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.adapters.keys().copied()
    }

    /// Every entity's motion state, in handle order.
    pub fn states(&self) -> impl Iterator<Item = (EntityHandle, MotionState)> + '_ {
        self.adapters.iter().map(|(h, a)| (*h, a.model().state()))
    }

    /// Whether no entity has queued work or a step in progress.
    pub fn is_settled(&self) -> bool {
        self.adapters.values().all(SyncAdapter::is_settled)
    }

    /// Digest of every entity's state.
    pub fn state_hash(&self) -> String {
        states_hash(self.states())
    }

    /// Digest of the entities in one scope, comparable to the server scope's.
    pub fn scope_state_hash(&self, scope: ScopeId) -> String {
        let hash = states_hash(self.states().filter(|(h, _)| h.scope == scope));
        if !self.adapters.keys().any(|h| h.scope == scope) {
            warn!(scope = scope.0, "hashing a scope with no entities");
        }
        hash
    }
}

fn sync_error(handle: EntityHandle, source: crate::SyncError) -> ClientError {
    warn!(%handle, error = %source, "entity left in last good state");
    ClientError::Sync { handle, source }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
