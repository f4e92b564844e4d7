//! Identifiers scoping every wire message.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A server-side grouping of networked objects visible together to a set of
/// clients (for example, one map instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

/// A networked object, unique within its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// Identifies one networked object within one scope.
///
/// Orders by scope first, then object, so maps keyed by handle iterate a
/// scope's objects contiguously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle {
    pub scope: ScopeId,
    pub object: ObjectId,
}

impl EntityHandle {
    #[inline]
    pub fn new(scope: ScopeId, object: ObjectId) -> Self {
        Self { scope, object }
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope.0, self.object.0)
    }
}
