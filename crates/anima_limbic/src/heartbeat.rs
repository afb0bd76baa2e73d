//! Heartbeat configuration for the decision loop
//!
//! The heartbeat determines how often emotion, biology and the scorer are
//! re-evaluated even without new perception events.

use std::time::Duration;

/// Configuration for the decision heartbeat
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often to run a decision tick (default: 10s)
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

impl HeartbeatConfig {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(secs.max(1)),
        }
    }

    /// Very fast heartbeat for testing
    pub fn testing() -> Self {
        Self {
            interval: Duration::from_millis(10),
        }
    }
}
