//! Delivery handler and interception filter callbacks.

use std::fmt;
use std::sync::Arc;

use super::packet::RoutePacketHeader;

/// Callback invoked for every packet delivered to a route.
///
/// Runs on the dispatch task. It must not wait for queue space, so packets
/// re-sent from inside a handler go through the `try_send*` methods.
pub type Handler<T> = Arc<dyn Fn(&RoutePacketHeader, &T) + Send + Sync>;

/// A shared reference to an interception predicate.
///
/// Returning `true` drops the packet before delivery. Two `FilterRef`s are
/// equal only when they point at the same closure, which is how a filter is
/// later found again for removal: keep a clone of the ref you registered.
pub struct FilterRef<T> {
    inner: Arc<dyn Fn(&RoutePacketHeader, &T) -> bool + Send + Sync>,
}

impl<T> FilterRef<T> {
    pub fn new(filter: impl Fn(&RoutePacketHeader, &T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(filter),
        }
    }

    /// Whether this filter intercepts the packet.
    pub fn matches(&self, header: &RoutePacketHeader, data: &T) -> bool {
        (self.inner)(header, data)
    }
}

impl<T> Clone for FilterRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for FilterRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for FilterRef<T> {}

impl<T> fmt::Debug for FilterRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRef")
            .field("ptr", &Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}
