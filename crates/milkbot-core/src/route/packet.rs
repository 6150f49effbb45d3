//! The unit that travels through the router queue.

pub use milkbot_types::route::{RoutePacketHeader, RoutePacketKind};

/// A header plus the payload it carries.
///
/// Exists only while queued or being dispatched; the router never inspects
/// `data` itself, only hands it to filters and handlers.
#[derive(Debug, Clone)]
pub struct RoutePacket<T> {
    pub header: RoutePacketHeader,
    pub data: T,
}

impl<T> RoutePacket<T> {
    pub fn new(header: RoutePacketHeader, data: T) -> Self {
        Self { header, data }
    }
}
