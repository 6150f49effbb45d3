//! Named endpoint handles.
//!
//! A `Route` is how a plugin talks to the router: it originates and forwards
//! packets, joins and leaves groups, registers interception filters, and
//! holds the handler the dispatch loop calls on delivery.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::error::RouterError;
use super::filter::{FilterRef, Handler};
use super::packet::{RoutePacket, RoutePacketHeader, RoutePacketKind};
use crate::sync::{ConcurrentArray, ConcurrentMap};

/// Filter chains for one pattern, keyed by the registering route's name.
pub(crate) type FilterChains<T> = ConcurrentMap<String, Arc<ConcurrentArray<FilterRef<T>>>>;

/// State shared between a router and every route it hands out.
///
/// The route table itself is not here: routes only need the queue and the
/// group and filter registries, and keeping the table out avoids a
/// route -> shared -> table -> route reference cycle.
pub(crate) struct Shared<T> {
    pub(crate) default_ttl: u8,
    pub(crate) queue: mpsc::Sender<RoutePacket<T>>,
    pub(crate) stopped: AtomicBool,
    pub(crate) shutdown: CancellationToken,
    /// Group name -> member route names. Present only while non-empty.
    pub(crate) groups: ConcurrentMap<String, HashSet<String>>,
    /// Pattern (exact destination) -> chains by registering route.
    pub(crate) filters: ConcurrentMap<String, Arc<FilterChains<T>>>,
}

impl<T> Shared<T> {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// A named endpoint registered with a [`Router`](super::Router).
pub struct Route<T> {
    name: String,
    shared: Arc<Shared<T>>,
    handler: RwLock<Option<Handler<T>>>,
    /// Groups this route belongs to. Mirrors its entries in `shared.groups`.
    groups: ConcurrentArray<String>,
    /// Set once the router has unregistered this route. A detached handle
    /// can no longer write into the shared registries.
    detached: AtomicBool,
}

impl<T> Route<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(name: String, shared: Arc<Shared<T>>) -> Self {
        Self {
            name,
            shared,
            handler: RwLock::new(None),
            groups: ConcurrentArray::new(),
            detached: AtomicBool::new(false),
        }
    }

    // ---- sending -----------------------------------------------------------

    /// Send `data` to the route named `dest`, waiting for queue space.
    pub async fn send(&self, dest: impl Into<String>, data: T) -> Result<(), RouterError> {
        let header = self.originate(RoutePacketKind::Unicast, dest.into());
        self.enqueue(RoutePacket::new(header, data)).await
    }

    /// Send `data` to every other route, waiting for queue space.
    pub async fn send_broadcast(&self, data: T) -> Result<(), RouterError> {
        let header = self.originate(RoutePacketKind::Broadcast, String::new());
        self.enqueue(RoutePacket::new(header, data)).await
    }

    /// Send `data` to every other member of `group`, waiting for queue space.
    pub async fn send_group(&self, group: impl Into<String>, data: T) -> Result<(), RouterError> {
        let header = self.originate(RoutePacketKind::Multicast, group.into());
        self.enqueue(RoutePacket::new(header, data)).await
    }

    /// Pass a received packet on to `dest`, waiting for queue space.
    ///
    /// Kind and source are kept, this route is appended to the stack and the
    /// ttl drops by one. A packet whose ttl is already 1 or less is dropped
    /// here without error.
    pub async fn send_forward(
        &self,
        dest: impl Into<String>,
        header: &RoutePacketHeader,
        data: T,
    ) -> Result<(), RouterError> {
        match self.forward_header(header, dest.into()) {
            Some(next) => self.enqueue(RoutePacket::new(next, data)).await,
            None => Ok(()),
        }
    }

    /// Non-waiting [`send`](Self::send); fails with `QueueFull` instead.
    pub fn try_send(&self, dest: impl Into<String>, data: T) -> Result<(), RouterError> {
        let header = self.originate(RoutePacketKind::Unicast, dest.into());
        self.try_enqueue(RoutePacket::new(header, data))
    }

    /// Non-waiting [`send_broadcast`](Self::send_broadcast).
    pub fn try_send_broadcast(&self, data: T) -> Result<(), RouterError> {
        let header = self.originate(RoutePacketKind::Broadcast, String::new());
        self.try_enqueue(RoutePacket::new(header, data))
    }

    /// Non-waiting [`send_group`](Self::send_group).
    pub fn try_send_group(&self, group: impl Into<String>, data: T) -> Result<(), RouterError> {
        let header = self.originate(RoutePacketKind::Multicast, group.into());
        self.try_enqueue(RoutePacket::new(header, data))
    }

    /// Non-waiting [`send_forward`](Self::send_forward). Safe to call from a
    /// handler.
    pub fn try_send_forward(
        &self,
        dest: impl Into<String>,
        header: &RoutePacketHeader,
        data: T,
    ) -> Result<(), RouterError> {
        match self.forward_header(header, dest.into()) {
            Some(next) => self.try_enqueue(RoutePacket::new(next, data)),
            None => Ok(()),
        }
    }

    fn originate(&self, kind: RoutePacketKind, dest: String) -> RoutePacketHeader {
        RoutePacketHeader::origin(kind, self.name.clone(), dest, self.shared.default_ttl)
    }

    fn forward_header(&self, header: &RoutePacketHeader, dest: String) -> Option<RoutePacketHeader> {
        let next = header.forwarded(&self.name, dest);
        if next.is_none() {
            trace!(route = %self.name, src = %header.src, ttl = header.ttl, "hop budget spent, not forwarding");
        }
        next
    }

    async fn enqueue(&self, packet: RoutePacket<T>) -> Result<(), RouterError> {
        if self.shared.is_stopped() {
            return Err(RouterError::Stopped);
        }
        tokio::select! {
            sent = self.shared.queue.send(packet) => sent.map_err(|_| RouterError::Stopped),
            _ = self.shared.shutdown.cancelled() => Err(RouterError::Stopped),
        }
    }

    fn try_enqueue(&self, packet: RoutePacket<T>) -> Result<(), RouterError> {
        if self.shared.is_stopped() {
            return Err(RouterError::Stopped);
        }
        self.shared.queue.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => RouterError::QueueFull,
            TrySendError::Closed(_) => RouterError::Stopped,
        })
    }

    // ---- groups ------------------------------------------------------------

    /// Join `group`, creating it if this is its first member.
    ///
    /// Does nothing once the route has been removed from its router.
    pub fn join_group(&self, group: &str) {
        // Both membership records are written under the group's entry lock,
        // where a concurrent removal either sees the member or we see the
        // detached flag.
        let joined = self.shared.groups.modify_or_insert(group.to_string(), HashSet::new, |members| {
            if self.is_detached() {
                return None;
            }
            let created = members.is_empty();
            members.insert(self.name.clone());
            self.groups.add_if_not_exists(group.to_string());
            Some(created)
        });

        match joined {
            Some(created) => {
                if created {
                    debug!(route = %self.name, %group, "group created");
                }
                debug!(route = %self.name, %group, "joined group");
            }
            None => {
                self.shared.groups.remove_if(group, |members| members.is_empty());
                debug!(route = %self.name, %group, "removed route cannot join group");
            }
        }
    }

    /// Leave `group`, deleting it if this was its last member. Leaving a
    /// group the route never joined does nothing.
    pub fn leave_group(&self, group: &str) {
        let deleted = self.shared.groups.remove_if_mut(group, |members| {
            members.remove(&self.name);
            members.is_empty()
        });
        let was_member = self.groups.delete_by_value(&group.to_string());

        if was_member {
            debug!(route = %self.name, %group, "left group");
        }
        if deleted {
            debug!(%group, "group deleted");
        }
    }

    /// Groups this route currently belongs to.
    pub fn groups(&self) -> Vec<String> {
        self.groups.slice()
    }

    // ---- filters -----------------------------------------------------------

    /// Register `filter` for packets whose destination is exactly `pattern`.
    ///
    /// Fails if this route already registered the same filter ref for the
    /// pattern, or with `RouteNotFound` once the route has been removed.
    pub fn add_filter(&self, pattern: &str, filter: &FilterRef<T>) -> Result<(), RouterError> {
        let added = self.shared.filters.modify_or_insert(
            pattern.to_string(),
            || Arc::new(ConcurrentMap::new()),
            |chains| {
                if self.is_detached() {
                    return None;
                }
                let (chain, _) = chains.load_or_store(self.name.clone(), Arc::new(ConcurrentArray::new()));
                Some(chain.add_if_not_exists(filter.clone()))
            },
        );

        match added {
            Some(true) => {
                debug!(route = %self.name, %pattern, "filter added");
                Ok(())
            }
            Some(false) => Err(RouterError::FilterExists {
                pattern: pattern.to_string(),
                route: self.name.clone(),
            }),
            None => {
                self.shared.filters.remove_if(pattern, |chains| chains.is_empty());
                Err(RouterError::RouteNotFound(self.name.clone()))
            }
        }
    }

    /// Unregister `filter` from `pattern`.
    ///
    /// An emptied chain is pruned, and so is the pattern once no route has a
    /// chain under it.
    pub fn remove_filter(&self, pattern: &str, filter: &FilterRef<T>) -> Result<(), RouterError> {
        let mut removed = false;
        self.shared.filters.remove_if(pattern, |chains| {
            chains.remove_if(self.name.as_str(), |chain| {
                removed = chain.delete_by_value(filter);
                chain.is_empty()
            });
            chains.is_empty()
        });

        if !removed {
            return Err(RouterError::FilterNotFound {
                pattern: pattern.to_string(),
                route: self.name.clone(),
            });
        }
        debug!(route = %self.name, %pattern, "filter removed");
        Ok(())
    }

    /// Drop every chain this route registered, under every pattern.
    pub(crate) fn purge_filters(&self) {
        for pattern in self.shared.filters.keys() {
            let pruned = self.shared.filters.remove_if(pattern.as_str(), |chains| {
                chains.load_and_delete(self.name.as_str());
                chains.is_empty()
            });
            if pruned {
                debug!(route = %self.name, %pattern, "filter pattern pruned");
            }
        }
    }

    /// Drop this route from every group in the registry, not only the ones
    /// its own list knows about.
    pub(crate) fn purge_groups(&self) {
        for group in self.shared.groups.keys() {
            let deleted = self.shared.groups.remove_if_mut(group.as_str(), |members| {
                members.remove(&self.name);
                members.is_empty()
            });
            if deleted {
                debug!(%group, "group deleted");
            }
        }
        self.groups.clear();
    }
}

impl<T> Route<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the router has removed this route.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Mark the route removed. Returns `false` if it already was.
    pub(crate) fn detach(&self) -> bool {
        !self.detached.swap(true, Ordering::AcqRel)
    }

    // ---- handler -----------------------------------------------------------

    /// Install or replace the delivery handler.
    pub fn handler_func(&self, handler: impl Fn(&RoutePacketHeader, &T) + Send + Sync + 'static) {
        self.set_handler(Some(Arc::new(handler)));
    }

    /// Install, replace or clear the delivery handler. With no handler the
    /// route stays registered but packets delivered to it are dropped.
    pub fn set_handler(&self, handler: Option<Handler<T>>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    pub fn clear_handler(&self) {
        self.set_handler(None);
    }

    pub fn has_handler(&self) -> bool {
        self.current_handler().is_some()
    }

    fn current_handler(&self) -> Option<Handler<T>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Invoke the handler, if any. Returns whether one was called.
    ///
    /// The handler is cloned out before the call so it may replace itself.
    pub(crate) fn deliver(&self, header: &RoutePacketHeader, data: &T) -> bool {
        if self.is_detached() {
            return false;
        }
        match self.current_handler() {
            Some(handler) => {
                handler(header, data);
                true
            }
            None => false,
        }
    }
}

impl<T> fmt::Debug for Route<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("has_handler", &self.has_handler())
            .field("detached", &self.is_detached())
            .finish()
    }
}
