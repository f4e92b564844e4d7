//! Client-side synchronization settings.
//!
//! Both structs deserialize with `#[serde(default)]`, so a JSON document only
//! needs the fields it overrides:
//!
//! ```
//! use netrose_client::config::ClientConfig;
//!
//! let config = ClientConfig::from_json_str(r#"{ "sync": { "queue_limit": 8 } }"#).unwrap();
//! assert_eq!(config.sync.queue_limit, 8);
//! assert!((config.fixed_dt - 1.0 / 60.0).abs() < f64::EPSILON);
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ConfigError;

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// Per-entity replay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Backlog size at which in-flight steps are force-finished.
    /// Values below [`MIN_QUEUE_LIMIT`](Self::MIN_QUEUE_LIMIT) are raised to it.
    pub queue_limit: usize,
}

impl SyncConfig {
    pub const MIN_QUEUE_LIMIT: usize = 3;

    /// The queue limit actually enforced.
    pub fn effective_queue_limit(&self) -> usize {
        if self.queue_limit < Self::MIN_QUEUE_LIMIT {
            warn!(
                configured = self.queue_limit,
                enforced = Self::MIN_QUEUE_LIMIT,
                "queue_limit below minimum; clamping"
            );
            Self::MIN_QUEUE_LIMIT
        } else {
            self.queue_limit
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue_limit: Self::MIN_QUEUE_LIMIT,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Settings for a whole [`ClientWorld`](crate::world::ClientWorld).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    pub sync: SyncConfig,
}

impl Default for ClientConfig {
    /// Defaults to 60 Hz and the minimum queue limit.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            sync: SyncConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants [`ClientWorld::new`](crate::world::ClientWorld::new)
    /// asserts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fixed_dt > 0.0 && self.fixed_dt.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::InvalidTimestep {
                fixed_dt: self.fixed_dt,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.sync.queue_limit, 3);
        assert!((config.fixed_dt - 1.0 / 60.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = ClientConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn small_limits_are_clamped() {
        for limit in 0..3 {
            let config = SyncConfig { queue_limit: limit };
            assert_eq!(config.effective_queue_limit(), 3);
        }
        assert_eq!(SyncConfig { queue_limit: 10 }.effective_queue_limit(), 10);
    }

    #[test]
    fn non_positive_timestep_is_rejected() {
        let result = ClientConfig::from_json_str(r#"{ "fixed_dt": 0.0 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidTimestep { .. })));

        let result = ClientConfig::from_json_str(r#"{ "fixed_dt": -0.5 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidTimestep { .. })));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let result = ClientConfig::from_json_str(r#"{ "sync": 3 "#);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }
}
