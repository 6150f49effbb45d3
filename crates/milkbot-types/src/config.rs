//! Router configuration types.
//!
//! `RouterConfig` is the `router.toml` that sizes a router. The hop budget
//! and the queue capacity are independent: one bounds how long a packet
//! may keep being forwarded, the other how many packets may wait for
//! dispatch before producers are held back.

use serde::{Deserialize, Serialize};

/// Hop budget used when none (or zero) is configured.
pub const DEFAULT_TTL: u8 = 64;

/// Queue capacity used when none (or zero) is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Configuration for a single router instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Hop budget assigned to freshly originated packets.
    #[serde(default = "default_ttl")]
    pub default_ttl: u8,

    /// Number of packets the dispatch queue holds before senders wait.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_ttl() -> u8 {
    DEFAULT_TTL
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl RouterConfig {
    /// Config with the given hop budget and the default queue capacity.
    pub fn with_ttl(default_ttl: u8) -> Self {
        Self {
            default_ttl,
            ..Self::default()
        }
    }

    /// Replace zero values with their defaults.
    ///
    /// A zero ttl would drop every packet and a zero-capacity queue cannot
    /// be built, so both are treated as "unset".
    pub fn normalized(self) -> Self {
        Self {
            default_ttl: if self.default_ttl == 0 {
                DEFAULT_TTL
            } else {
                self.default_ttl
            },
            queue_capacity: if self.queue_capacity == 0 {
                DEFAULT_QUEUE_CAPACITY
            } else {
                self.queue_capacity
            },
        }
    }
}
