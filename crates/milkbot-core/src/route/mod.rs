//! In-process routing between named endpoints.
//!
//! - `router` -- `Router`, owner of the route table, group and filter
//!   registries, and the single dispatch loop
//! - `route` -- `Route`, a named endpoint handle used to send, join groups,
//!   register filters and install a handler
//! - `packet` -- `RoutePacket`, a header plus an opaque payload
//! - `filter` -- `Handler` and `FilterRef` callback types
//! - `error` -- `RouterError` and `DuplicateRoute`

pub mod error;
pub mod filter;
pub mod packet;
pub mod route;
pub mod router;

pub use error::{DuplicateRoute, RouterError};
pub use filter::{FilterRef, Handler};
pub use packet::{RoutePacket, RoutePacketHeader, RoutePacketKind};
pub use route::Route;
pub use router::Router;
