//! Runtime configuration for connection bootstrap and store calls.
//!
//! Both structs deserialize with defaults for every missing field so a host
//! application can embed them in its own config file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_INTERRUPT_CHECK_OPS: u32 = 1_000;

/// Connection bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    /// How long SQLite waits on a locked database before failing with `SQLITE_BUSY`.
    pub busy_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl DbConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Per-store call settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Timeout applied to every call that does not carry a tighter one.
    pub default_timeout_ms: Option<u64>,
    /// SQLite VM instructions between deadline/cancellation checks.
    pub interrupt_check_ops: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            interrupt_check_ops: DEFAULT_INTERRUPT_CHECK_OPS,
        }
    }
}

impl StoreConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}
