//! NetRose Grid -- discrete tile-grid motion for networked map objects.
//!
//! This crate is the foundation the synchronization layer drives: a
//! four-connected [`Direction`](direction::Direction), integer
//! [`GridPosition`](direction::GridPosition)s, bounded maps, and the
//! [`GridMotion`](motion::GridMotion) contract with its reference
//! implementation [`MapObject`](object::MapObject).
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use netrose_grid::prelude::*;
//!
//! let catalog = Arc::new(MapCatalog::new().with_map(GridMap::new(MapId(1), 16, 16)));
//! let mut object = MapObject::new(catalog);
//! object.attach(MapId(1), 5, 5, true).unwrap();
//!
//! let events = object.subscribe();
//! assert!(object.start_movement(Direction::Right, false, false));
//! object.advance(1.0); // longer than one step at the default speed
//!
//! assert_eq!(object.position(), Some(GridPosition::new(6, 5)));
//! assert!(events.drain().iter().any(MotionEvent::ends_movement));
//! ```

#![deny(unsafe_code)]

pub mod direction;
pub mod map;
pub mod motion;
pub mod object;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by grid motion operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The map id is not registered in the object's catalog.
    #[error("{map} is not registered in the map catalog")]
    UnknownMap { map: map::MapId },

    /// The cell lies outside the map.
    #[error("cell ({x}, {y}) is outside {map} ({width}x{height})")]
    OutOfBounds {
        map: map::MapId,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    },

    /// The operation needs the object to be attached to a map.
    #[error("object is not attached to any map")]
    NotAttached,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::direction::{Direction, GridPosition};
    pub use crate::map::{GridMap, MapCatalog, MapId};
    pub use crate::motion::{
        GridMotion, MotionEvent, MotionListeners, MotionState, MotionSubscription,
    };
    pub use crate::object::{MapObject, DEFAULT_SPEED};
    pub use crate::GridError;
}
