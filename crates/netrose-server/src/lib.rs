//! NetRose Server -- the authoritative side of map-object synchronization.
//!
//! A [`ServerScope`](scope::ServerScope) owns the authoritative
//! [`ServerObject`](object::ServerObject)s visible together to a set of
//! clients. Game logic mutates objects directly; the scope translates what
//! their grid models report into ordered [`Envelope`](netrose_protocol::message::Envelope)s
//! ready for the wire.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use netrose_grid::prelude::*;
//! use netrose_protocol::prelude::*;
//! use netrose_server::prelude::*;
//!
//! let catalog = Arc::new(MapCatalog::new().with_map(GridMap::new(MapId(1), 16, 16)));
//! let mut scope: ServerScope = ServerScope::new(ScopeId(1));
//!
//! let mut model = MapObject::new(catalog);
//! model.attach(MapId(1), 2, 2, true).unwrap();
//! scope.spawn(ObjectId(1), model, Vec::new()).unwrap();
//!
//! scope.object_mut(ObjectId(1)).unwrap().start_movement(Direction::Up);
//! scope.advance(1.0);
//!
//! let kinds: Vec<_> = scope.drain_outbox().iter().map(|e| e.message.kind()).collect();
//! assert_eq!(kinds, ["spawned", "movement_started", "movement_finished"]);
//! ```

#![deny(unsafe_code)]

pub mod object;
pub mod scope;

use netrose_grid::prelude::GridError;
use netrose_protocol::prelude::{EntityHandle, ProtocolError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by authoritative operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("no object {handle} in scope")]
    UnknownObject { handle: EntityHandle },

    #[error("object {handle} already exists in scope")]
    DuplicateObject { handle: EntityHandle },

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::object::ServerObject;
    pub use crate::scope::ServerScope;
    pub use crate::ServerError;
}
