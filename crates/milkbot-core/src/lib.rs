//! Message routing core for milkbot.
//!
//! Plugins talk to each other through a [`route::Router`]: each plugin owns a
//! named [`route::Route`] and exchanges opaque payloads by unicast, broadcast
//! or group multicast. The registries behind the router are built on the
//! concurrent containers in [`sync`].

pub mod config;
pub mod route;
pub mod sync;
