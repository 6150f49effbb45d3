//! Shared value types for milkbot.
//!
//! Packet headers and router configuration used by the routing engine and
//! by anything that wraps it. Zero runtime dependencies -- only serde.

pub mod config;
pub mod route;
