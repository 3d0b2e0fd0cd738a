//! # Lifeboard
//!
//! Real-time shared life totals for tabletop players.
//!
//! Clients open a WebSocket on `/room/{room}/player/{player}`, send
//! `{"type", "data"}` commands, and receive the full room snapshot after
//! every change. Rooms are created on first use and live in memory only.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lifeboard::prelude::*;
//!
//! # async fn start() -> Result<(), LifeboardError> {
//! let server = LifeboardServer::builder()
//!     .bind("0.0.0.0:8001")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod route;
mod server;

pub use config::ServerConfig;
pub use error::LifeboardError;
pub use route::Route;
pub use server::{LifeboardServer, LifeboardServerBuilder};

/// Convenience re-exports for building and talking to a server.
pub mod prelude {
    pub use crate::{
        LifeboardError, LifeboardServer, LifeboardServerBuilder, Route,
        ServerConfig,
    };
    pub use lifeboard_protocol::{
        Codec, Command, Envelope, JsonCodec, Player, PlayerId, RoomCode,
        RoomSnapshot,
    };
    pub use lifeboard_room::{Room, RoomConfig, RoomRegistry};
}
