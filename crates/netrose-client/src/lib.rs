//! NetRose Client -- replays authoritative grid movement on client replicas.
//!
//! Server events for one object arrive in order but not in real time. This
//! crate turns them into smooth, convergent motion on a local
//! [`GridMotion`](netrose_grid::motion::GridMotion) model:
//!
//! - [`command`]: the replayable [`Command`](command::Command) set and its
//!   drift-correcting execution.
//! - [`queue`]: the per-object [`CommandQueue`](queue::CommandQueue), a
//!   single-track, tick-driven executor with backlog acceleration and
//!   finish/cancel routing.
//! - [`adapter`]: the [`SyncAdapter`](adapter::SyncAdapter) that gates events
//!   on spawn and applies snapshots.
//! - [`world`]: the [`ClientWorld`](world::ClientWorld) registry, dispatcher
//!   and fixed-timestep loop.
//! - [`config`]: serde-loadable settings.

#![deny(unsafe_code)]

pub mod adapter;
pub mod command;
pub mod config;
pub mod queue;
pub mod world;

use netrose_grid::prelude::{Direction, GridError};
use netrose_protocol::prelude::{EntityHandle, ProtocolError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A snapshot or event one entity could not apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The snapshot reports a step in progress but no map to take it on.
    #[error("snapshot has movement {direction} but no attachment")]
    MovementWithoutAttachment { direction: Direction },

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Errors surfaced by [`ClientWorld`](world::ClientWorld).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The entity kept its last good state; despawn or resync it.
    #[error("entity {handle} rejected an update: {source}")]
    Sync {
        handle: EntityHandle,
        #[source]
        source: SyncError,
    },
}

/// Errors loading a [`ClientConfig`](config::ClientConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid client configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fixed_dt must be positive and finite, got {fixed_dt}")]
    InvalidTimestep { fixed_dt: f64 },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::adapter::SyncAdapter;
    pub use crate::command::{Command, CommandTicket, Execution};
    pub use crate::config::{ClientConfig, SyncConfig};
    pub use crate::queue::{CommandQueue, QueueStats};
    pub use crate::world::{ClientWorld, ModelFactory};
    pub use crate::{ClientError, ConfigError, SyncError};
}
