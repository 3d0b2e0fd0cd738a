//! Error types for the protocol layer.
//!
//! Each crate in Lifeboard defines its own error enum, so a
//! `ProtocolError` always means the bytes or their shape were wrong,
//! never the network or the room.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, wrong field types, truncated
    /// messages.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope was well formed, but its `data` does not have the
    /// shape its `type` requires (e.g. a string for `"change"`).
    #[error("invalid payload for {kind:?}: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
