//! Errors reported by registry operations and sends.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::route::Route;

/// Errors that can occur during router operations.
///
/// Only registry edits and enqueueing report errors. What happens to a packet
/// after it is queued (ttl exhaustion, interception, nobody listening) is a
/// normal routing outcome and never surfaces here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A route with this name is already registered.
    #[error("route {0} already exists")]
    RouteExists(String),

    /// No route with this name is registered.
    #[error("route {0} not found")]
    RouteNotFound(String),

    /// The same filter is already registered by this route for this pattern.
    #[error("filter already registered by route {route} for pattern {pattern}")]
    FilterExists { pattern: String, route: String },

    /// The filter is not registered by this route for this pattern.
    #[error("filter not registered by route {route} for pattern {pattern}")]
    FilterNotFound { pattern: String, route: String },

    /// The router has been stopped and accepts no more packets.
    #[error("router is stopped")]
    Stopped,

    /// The dispatch queue is full (non-waiting sends only).
    #[error("router queue is full")]
    QueueFull,

    /// `run` was called while the dispatch loop already owns the queue.
    #[error("router is already running")]
    AlreadyRunning,
}

/// `add_route` was called with a name that is already taken.
///
/// Carries the route that holds the name so the caller can inspect it. The
/// existing registration is left untouched.
pub struct DuplicateRoute<T> {
    pub existing: Arc<Route<T>>,
}

impl<T> fmt::Display for DuplicateRoute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route {} already exists", self.existing.name())
    }
}

impl<T> fmt::Debug for DuplicateRoute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicateRoute")
            .field("name", &self.existing.name())
            .finish()
    }
}

impl<T> std::error::Error for DuplicateRoute<T> {}

impl<T> From<DuplicateRoute<T>> for RouterError {
    fn from(err: DuplicateRoute<T>) -> Self {
        RouterError::RouteExists(err.existing.name().to_string())
    }
}
