//! Wire protocol for Lifeboard.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Envelope`], [`Command`], [`RoomSnapshot`], [`Player`]) —
//!   the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while decoding.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope → Command) → Room (state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{Command, Envelope, Player, PlayerId, RoomCode, RoomSnapshot};
