//! Route packet header types.
//!
//! A header travels alongside every payload pushed through the router. It
//! records how the packet is addressed, who originated it, which routes it
//! has passed through and how many forward hops it has left.

use serde::{Deserialize, Serialize};

/// How a packet is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePacketKind {
    /// Delivered to the single route named by `dest`.
    Unicast,
    /// Delivered to every route except the sender. `dest` is empty.
    Broadcast,
    /// Delivered to every member of the group named by `dest` except the sender.
    Multicast,
}

impl RoutePacketKind {
    /// Lowercase label, used as a tracing field value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unicast => "unicast",
            Self::Broadcast => "broadcast",
            Self::Multicast => "multicast",
        }
    }
}

impl std::fmt::Display for RoutePacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressing and hop metadata for a routed packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePacketHeader {
    pub kind: RoutePacketKind,
    /// Name of the route that originated the packet. Preserved across forwards.
    pub src: String,
    /// Route name, group name, or empty for broadcasts.
    pub dest: String,
    /// Route names the packet has passed through, origin first.
    pub stack: Vec<String>,
    /// Remaining forward hops.
    pub ttl: u8,
}

impl RoutePacketHeader {
    /// Header for a freshly originated packet.
    ///
    /// The stack holds only the sender and `ttl` is the full hop budget.
    pub fn origin(
        kind: RoutePacketKind,
        src: impl Into<String>,
        dest: impl Into<String>,
        ttl: u8,
    ) -> Self {
        let src = src.into();
        Self {
            kind,
            stack: vec![src.clone()],
            src,
            dest: dest.into(),
            ttl,
        }
    }

    /// Header for forwarding this packet onward through `via` to `dest`.
    ///
    /// Returns `None` when the hop budget is spent (`ttl <= 1`). Otherwise the
    /// kind and source are kept, `via` is appended to a copy of the stack and
    /// the ttl drops by one.
    pub fn forwarded(&self, via: &str, dest: impl Into<String>) -> Option<Self> {
        if self.ttl <= 1 {
            return None;
        }

        let mut stack = Vec::with_capacity(self.stack.len() + 1);
        stack.extend(self.stack.iter().cloned());
        stack.push(via.to_string());

        Some(Self {
            kind: self.kind,
            src: self.src.clone(),
            dest: dest.into(),
            stack,
            ttl: self.ttl - 1,
        })
    }

    /// Whether the hop budget is exhausted and the packet must be dropped.
    pub fn is_expired(&self) -> bool {
        self.ttl == 0
    }
}
