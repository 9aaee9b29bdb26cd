//! Table workflow configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::validator::MAX_TABLE_NAME_LENGTH;
use crate::db::config::env_or;
use crate::db::timeouts::DEFAULT_QUERY_TIMEOUT;

/// Limits and tuning for the table controller and manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesConfig {
    /// Longest accepted table name, in characters
    pub max_name_length: usize,

    /// Non-empty cells a new table needs
    pub min_filled_cells: usize,

    /// How long a name cache entry is trusted before it is re-resolved
    pub cache_ttl_secs: u64,

    /// Channel capacity handed to each event subscriber
    pub event_buffer: usize,

    /// Per-call store timeout
    pub query_timeout_secs: u64,
}

impl TablesConfig {
    /// Read overrides from `TABLES_*` environment variables
    ///
    /// - `TABLES_MAX_NAME_LENGTH` (default: 100)
    /// - `TABLES_MIN_FILLED_CELLS` (default: 1)
    /// - `TABLES_CACHE_TTL_SECS` (default: 300)
    /// - `TABLES_EVENT_BUFFER` (default: 64)
    /// - `TABLES_QUERY_TIMEOUT_SECS` (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_name_length: env_or("TABLES_MAX_NAME_LENGTH", defaults.max_name_length),
            min_filled_cells: env_or("TABLES_MIN_FILLED_CELLS", defaults.min_filled_cells),
            cache_ttl_secs: env_or("TABLES_CACHE_TTL_SECS", defaults.cache_ttl_secs),
            event_buffer: env_or("TABLES_EVENT_BUFFER", defaults.event_buffer),
            query_timeout_secs: env_or("TABLES_QUERY_TIMEOUT_SECS", defaults.query_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            max_name_length: MAX_TABLE_NAME_LENGTH,
            min_filled_cells: 1,
            cache_ttl_secs: 300,
            event_buffer: 64,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT.as_secs(),
        }
    }
}
