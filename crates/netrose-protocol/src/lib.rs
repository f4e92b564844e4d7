//! NetRose Protocol -- wire messages for networked map-object synchronization.
//!
//! Defines the identifiers ([`ScopeId`](ids::ScopeId),
//! [`ObjectId`](ids::ObjectId)), the scoped [`Envelope`](message::Envelope)
//! and its [`Message`](message::Message) vocabulary, and the binary
//! [`codec`] both peers must share. [`digest`] hashes many objects' states
//! for replica convergence checks.
//!
//! # Quick Start
//!
//! ```
//! use netrose_protocol::prelude::*;
//! use netrose_grid::prelude::*;
//!
//! let handle = EntityHandle::new(ScopeId(1), ObjectId(42));
//! let envelope: Envelope = Envelope::new(
//!     handle,
//!     Message::MovementStarted { x: 5, y: 5, direction: Direction::Right },
//! );
//!
//! let bytes = codec::encode(&envelope).unwrap();
//! let decoded: Envelope = codec::decode(&bytes).unwrap();
//! assert_eq!(decoded, envelope);
//! ```

#![deny(unsafe_code)]

pub mod codec;
pub mod digest;
pub mod ids;
pub mod message;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode envelope: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// The buffer holds more than one envelope's worth of bytes.
    #[error("envelope ended after {read} of {total} bytes")]
    TrailingBytes { read: usize, total: usize },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::codec;
    pub use crate::digest::states_hash;
    pub use crate::ids::{EntityHandle, ObjectId, ScopeId};
    pub use crate::message::{Attachment, Envelope, Message, ObjectRefreshed, ObjectSpawned, RawData};
    pub use crate::ProtocolError;
}
