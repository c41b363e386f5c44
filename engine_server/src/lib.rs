//! `engine_server`
//!
//! Headless host around an `engine_core` world:
//! - In-memory inbox/outbox resources standing in for a transport
//! - Join/leave queues applied between ticks
//! - Fixed-timestep driver
//!
//! Transport (sockets, encoding) is left to the embedding application.

pub mod net;
pub mod server;

pub use net::{ClientId, Inbox, MessageBundle, Outbox, PlayerQueue};
pub use server::{NoHooks, SessionHooks, SimServer};
