//! Observability setup for milkbot binaries.
//!
//! Libraries in the workspace only emit `tracing` events; installing a
//! subscriber is left to whatever binary embeds them.

pub mod tracing_setup;

pub use tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
