//! Maps and the catalog that map objects resolve their bounds against.
//!
//! A [`MapCatalog`] is built once per scope and shared (via `Arc`) by every
//! [`MapObject`](crate::object::MapObject) living in it. Maps are immutable
//! after construction.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::direction::GridPosition;
use crate::GridError;

// ---------------------------------------------------------------------------
// MapId
// ---------------------------------------------------------------------------

/// Identifies a map inside one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(pub u32);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GridMap
// ---------------------------------------------------------------------------

/// A rectangular grid with optional blocked cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMap {
    id: MapId,
    width: u16,
    height: u16,
    blocked: BTreeSet<GridPosition>,
}

impl GridMap {
    /// Create an open map of `width` x `height` cells.
    pub fn new(id: MapId, width: u16, height: u16) -> Self {
        Self {
            id,
            width,
            height,
            blocked: BTreeSet::new(),
        }
    }

    /// Builder-style: mark a cell as impassable.
    pub fn with_blocked(mut self, x: u16, y: u16) -> Self {
        self.blocked.insert(GridPosition::new(x, y));
        self
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Whether `position` lies inside the map.
    pub fn contains(&self, position: GridPosition) -> bool {
        position.x < self.width && position.y < self.height
    }

    /// Whether `position` is marked impassable.
    pub fn is_blocked(&self, position: GridPosition) -> bool {
        self.blocked.contains(&position)
    }

    /// Whether an object may step onto `position`.
    pub fn is_walkable(&self, position: GridPosition) -> bool {
        self.contains(position) && !self.is_blocked(position)
    }

    /// Return `Ok(())` if `position` is inside the map.
    pub fn check_bounds(&self, position: GridPosition) -> Result<(), GridError> {
        if self.contains(position) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                map: self.id,
                x: position.x,
                y: position.y,
                width: self.width,
                height: self.height,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// MapCatalog
// ---------------------------------------------------------------------------

/// The set of maps known to one scope, keyed by [`MapId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapCatalog {
    maps: BTreeMap<MapId, GridMap>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: register a map, replacing any map with the same id.
    pub fn with_map(mut self, map: GridMap) -> Self {
        self.insert(map);
        self
    }

    /// Register a map, replacing any map with the same id.
    pub fn insert(&mut self, map: GridMap) {
        self.maps.insert(map.id(), map);
    }

    pub fn get(&self, id: MapId) -> Option<&GridMap> {
        self.maps.get(&id)
    }

    /// Look a map up, failing with [`GridError::UnknownMap`].
    pub fn resolve(&self, id: MapId) -> Result<&GridMap, GridError> {
        self.maps.get(&id).ok_or(GridError::UnknownMap { map: id })
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
