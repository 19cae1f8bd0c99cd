//! # Store Configuration
//!
//! Sizing for the entity store, loaded once at startup. Every field has a
//! default, so a config file only needs the values it overrides:
//!
//! ```toml
//! entity_capacity = 16000
//! column_reserve_bytes = 1073741824
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};
use crate::memory::INVALID_HANDLE_INDEX;

const MEGABYTE: usize = 1024 * 1024;

/// Largest reservation an allocation can describe.
#[allow(clippy::cast_sign_loss)]
const MAX_RESERVE_BYTES: usize = isize::MAX as usize;

/// Sizing parameters for an [`EntityContext`](crate::ecs::EntityContext).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    /// Slots in the entity handle pool. Must be below `0xFFFF`.
    pub entity_capacity: usize,
    /// Initial slots of the component name table.
    pub component_table_capacity: usize,
    /// Address space reserved per archetype column.
    pub column_reserve_bytes: usize,
    /// Bytes committed up front per archetype column.
    pub column_commit_bytes: usize,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 4096,
            component_table_capacity: 512,
            column_reserve_bytes: 256 * MEGABYTE,
            column_commit_bytes: 64 * 1024,
        }
    }
}

impl EcsConfig {
    /// Parses a TOML document and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] on malformed TOML or values that
    /// fail [`EcsConfig::validate`].
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides the per-column reservation.
    #[must_use]
    pub fn with_column_reservation(mut self, reserve: usize, commit: usize) -> Self {
        self.column_reserve_bytes = reserve;
        self.column_commit_bytes = commit;
        self
    }

    /// Checks the values against the limits of the underlying structures.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] describing the first violation.
    pub fn validate(&self) -> EcsResult<()> {
        if self.entity_capacity == 0 || self.entity_capacity >= usize::from(INVALID_HANDLE_INDEX) {
            return Err(EcsError::InvalidConfig(format!(
                "entity_capacity must be in 1..{INVALID_HANDLE_INDEX}, got {}",
                self.entity_capacity
            )));
        }
        if self.component_table_capacity == 0 {
            return Err(EcsError::InvalidConfig(
                "component_table_capacity must be greater than zero".to_string(),
            ));
        }
        if self.column_reserve_bytes > MAX_RESERVE_BYTES {
            return Err(EcsError::InvalidConfig(format!(
                "column_reserve_bytes ({}) exceeds the addressable limit ({MAX_RESERVE_BYTES})",
                self.column_reserve_bytes
            )));
        }
        if self.column_commit_bytes > self.column_reserve_bytes {
            return Err(EcsError::InvalidConfig(format!(
                "column_commit_bytes ({}) exceeds column_reserve_bytes ({})",
                self.column_commit_bytes, self.column_reserve_bytes
            )));
        }
        Ok(())
    }
}
