//! Rooms for Lifeboard: shared player state and who to tell about it.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — owns all rooms of a server, creates them lazily
//! - [`Room`] — players and subscribed clients behind one lock
//! - [`dispatch`] / [`apply_command`] — mutation handlers for client
//!   commands
//! - [`RoomConfig`] — starting life and per-client queue size
//!
//! Room operations never fail: commands aimed at a player who is not in
//! the room are silently dropped.

mod command;
mod config;
mod registry;
mod room;

pub use command::{Dispatched, apply_command, dispatch};
pub use config::RoomConfig;
pub use registry::RoomRegistry;
pub use room::{BroadcastReport, ClientSender, Room};
