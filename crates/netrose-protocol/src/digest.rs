//! Order-sensitive digest of many objects' motion states.
//!
//! Server scopes and client worlds hash their objects the same way, so equal
//! digests mean the replicas agree with the authority on every object.

use netrose_grid::motion::MotionState;

use crate::ids::EntityHandle;

/// BLAKE3 hex digest over `(handle, state)` pairs, in iteration order.
///
/// Callers iterate in handle order (both sides keep their objects in a
/// `BTreeMap`), which makes the digest independent of insertion history.
pub fn states_hash<I>(entries: I) -> String
where
    I: IntoIterator<Item = (EntityHandle, MotionState)>,
{
    let mut hasher = blake3::Hasher::new();
    for (handle, state) in entries {
        hasher.update(&handle.scope.0.to_be_bytes());
        hasher.update(&handle.object.0.to_be_bytes());
        hasher.update(&state.canonical_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
