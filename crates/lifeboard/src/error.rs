//! Unified error type for the Lifeboard server.

use lifeboard_protocol::ProtocolError;
use lifeboard_transport::TransportError;

/// Top-level error that wraps the crate-specific errors.
///
/// Nothing here is fatal to the process: a `LifeboardError` ends at most
/// one connection.
#[derive(Debug, thiserror::Error)]
pub enum LifeboardError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, payload shape).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection was opened on a path that does not name a room and
    /// player.
    #[error("no room route for path {0:?}")]
    UnknownRoute(String),

    /// The client kept sending envelopes that could not be decoded.
    #[error("closed after {0} consecutive malformed messages")]
    TooManyMalformed(u32),
}
