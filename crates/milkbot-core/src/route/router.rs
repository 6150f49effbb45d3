//! Router: route table, registries and the dispatch loop.
//!
//! Producers (any number of routes, on any task or thread) push packets into
//! one bounded queue. A single consumer, [`Router::run`], pops them in queue
//! order and for each one:
//!
//! 1. drops it if its ttl is exhausted,
//! 2. drops it if any filter registered under its exact destination
//!    intercepts it,
//! 3. delivers it by kind: to one route (unicast), to every route but the
//!    sender (broadcast), or to every member of a group but the sender
//!    (multicast).
//!
//! None of these drops is an error; nobody is waiting on delivery.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use milkbot_types::config::RouterConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::error::{DuplicateRoute, RouterError};
use super::filter::FilterRef;
use super::packet::{RoutePacket, RoutePacketHeader, RoutePacketKind};
use super::route::{Route, Shared};
use crate::sync::ConcurrentMap;

/// Generic in-process router over payloads of type `T`.
///
/// Wrap it in an `Arc` to share it between the dispatch task and the code
/// that registers routes.
pub struct Router<T> {
    shared: Arc<Shared<T>>,
    routes: ConcurrentMap<String, Arc<Route<T>>>,
    /// Taken by the first call to `run`.
    receiver: Mutex<Option<mpsc::Receiver<RoutePacket<T>>>>,
    queue_capacity: usize,
}

impl<T> Router<T>
where
    T: Send + 'static,
{
    /// Create a router. Zero values in `config` fall back to the defaults.
    pub fn new(config: RouterConfig) -> Self {
        let config = config.normalized();
        let (tx, rx) = mpsc::channel(config.queue_capacity);

        Self {
            shared: Arc::new(Shared {
                default_ttl: config.default_ttl,
                queue: tx,
                stopped: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                groups: ConcurrentMap::new(),
                filters: ConcurrentMap::new(),
            }),
            routes: ConcurrentMap::new(),
            receiver: Mutex::new(Some(rx)),
            queue_capacity: config.queue_capacity,
        }
    }

    /// Hop budget given to freshly originated packets.
    pub fn default_ttl(&self) -> u8 {
        self.shared.default_ttl
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    // ---- route table -------------------------------------------------------

    /// Register a route under `name`.
    ///
    /// If the name is taken the existing route is left in place and handed
    /// back inside the error.
    pub fn add_route(&self, name: impl Into<String>) -> Result<Arc<Route<T>>, DuplicateRoute<T>> {
        let name = name.into();
        let route = Arc::new(Route::new(name.clone(), Arc::clone(&self.shared)));

        let (route, loaded) = self.routes.load_or_store(name, route);
        if loaded {
            return Err(DuplicateRoute { existing: route });
        }
        debug!(route = %route.name(), "route added");
        Ok(route)
    }

    /// Unregister a route, dropping its filters and group memberships.
    ///
    /// The route is detached first, so handles still held by callers stop
    /// writing into the registries and stop receiving packets. The name stays
    /// reserved until cleanup is done; a new route under the same name cannot
    /// inherit stale group members or filters.
    pub fn remove_route(&self, name: &str) -> Result<(), RouterError> {
        let route = self
            .routes
            .load(name)
            .ok_or_else(|| RouterError::RouteNotFound(name.to_string()))?;

        // A concurrent removal of the same route got here first.
        if !route.detach() {
            return Err(RouterError::RouteNotFound(name.to_string()));
        }

        route.purge_filters();
        route.purge_groups();
        // Handlers often capture their own route; clearing breaks that cycle.
        route.clear_handler();
        self.routes
            .remove_if(name, |current| Arc::ptr_eq(current, &route));

        debug!(route = %name, "route removed");
        Ok(())
    }

    pub fn route(&self, name: &str) -> Option<Arc<Route<T>>> {
        self.routes.load(name)
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn route_names(&self) -> Vec<String> {
        self.routes.keys()
    }

    /// Current members of `group`, or `None` if the group does not exist.
    pub fn group_members(&self, group: &str) -> Option<HashSet<String>> {
        self.shared.groups.load(group)
    }

    /// Names of every non-empty group.
    pub fn group_names(&self) -> Vec<String> {
        self.shared.groups.keys()
    }

    /// Number of routes with a filter chain registered under `pattern`.
    pub fn filter_chain_count(&self, pattern: &str) -> usize {
        self.shared
            .filters
            .load(pattern)
            .map_or(0, |chains| chains.len())
    }

    // ---- lifecycle ---------------------------------------------------------

    /// Run the dispatch loop until [`stop`](Self::stop) is called and the
    /// queue has drained.
    ///
    /// Only one loop may own the queue; a second call returns
    /// `AlreadyRunning`.
    pub async fn run(&self) -> Result<(), RouterError> {
        let mut receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RouterError::AlreadyRunning)?;

        info!(
            default_ttl = self.shared.default_ttl,
            queue_capacity = self.queue_capacity,
            "router dispatch loop started"
        );

        loop {
            tokio::select! {
                biased;
                packet = receiver.recv() => match packet {
                    Some(packet) => self.dispatch(packet),
                    None => break,
                },
                _ = self.shared.shutdown.cancelled() => {
                    // Refuse new packets, then deliver what is already queued.
                    receiver.close();
                    while let Some(packet) = receiver.recv().await {
                        self.dispatch(packet);
                    }
                    break;
                }
            }
        }

        info!("router dispatch loop stopped");
        Ok(())
    }

    /// Run the dispatch loop on a new tokio task.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<Result<(), RouterError>> {
        let router = Arc::clone(self);
        tokio::spawn(async move { router.run().await })
    }

    /// Stop accepting packets and let the dispatch loop finish.
    ///
    /// Idempotent and safe to call concurrently: only the first call has an
    /// effect. Sends made afterwards, including ones already waiting for
    /// queue space, fail with `Stopped`.
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.shutdown.cancel();
        debug!("router stop requested");
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    // ---- dispatch ----------------------------------------------------------

    fn dispatch(&self, packet: RoutePacket<T>) {
        let RoutePacket { header, data } = packet;

        if header.is_expired() {
            trace!(src = %header.src, dest = %header.dest, "ttl exhausted, dropping packet");
            return;
        }

        if self.is_intercepted(&header, &data) {
            trace!(src = %header.src, dest = %header.dest, kind = %header.kind, "packet intercepted by filter");
            return;
        }

        let delivered = match header.kind {
            RoutePacketKind::Unicast => self.deliver_unicast(&header, &data),
            RoutePacketKind::Broadcast => self.deliver_broadcast(&header, &data),
            RoutePacketKind::Multicast => self.deliver_multicast(&header, &data),
        };

        trace!(
            src = %header.src,
            dest = %header.dest,
            kind = %header.kind,
            ttl = header.ttl,
            delivered,
            "packet dispatched"
        );
    }

    /// Evaluate every chain registered under the packet's exact destination,
    /// flattened into one list. The first filter that returns `true` wins.
    fn is_intercepted(&self, header: &RoutePacketHeader, data: &T) -> bool {
        let Some(chains) = self.shared.filters.load(header.dest.as_str()) else {
            return false;
        };

        let mut filters: Vec<FilterRef<T>> = Vec::new();
        chains.range(|_, chain| {
            filters.extend(chain.slice());
            true
        });

        filters.iter().any(|filter| filter.matches(header, data))
    }

    fn deliver_unicast(&self, header: &RoutePacketHeader, data: &T) -> usize {
        match self.routes.load(header.dest.as_str()) {
            Some(route) => usize::from(route.deliver(header, data)),
            None => 0,
        }
    }

    fn deliver_broadcast(&self, header: &RoutePacketHeader, data: &T) -> usize {
        let mut delivered = 0;
        self.routes.range(|name, route| {
            if *name != header.src && route.deliver(header, data) {
                delivered += 1;
            }
            true
        });
        delivered
    }

    fn deliver_multicast(&self, header: &RoutePacketHeader, data: &T) -> usize {
        let Some(members) = self.shared.groups.load(header.dest.as_str()) else {
            return 0;
        };

        let mut delivered = 0;
        for member in members.iter().filter(|member| **member != header.src) {
            if let Some(route) = self.routes.load(member.as_str()) {
                if route.deliver(header, data) {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

impl<T> Drop for Router<T> {
    fn drop(&mut self) {
        // Release producers still parked on a full queue.
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.shutdown.cancel();
    }
}

impl<T> fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("default_ttl", &self.shared.default_ttl)
            .field("queue_capacity", &self.queue_capacity)
            .field("routes", &self.routes.len())
            .field("groups", &self.shared.groups.len())
            .field("filter_patterns", &self.shared.filters.len())
            .field("stopped", &self.shared.is_stopped())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
