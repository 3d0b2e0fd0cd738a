//! Core protocol types for Lifeboard's wire format.
//!
//! Clients send [`Envelope`]s; the server answers with [`RoomSnapshot`]s.
//! Everything here serializes to the JSON shapes browser clients expect.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a player within a room.
///
/// Supplied by the client in the connection path and never generated by
/// the server. `#[serde(transparent)]` keeps it a bare string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The code a room is addressed by. Immutable once the room exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Snapshot — server → client
// ---------------------------------------------------------------------------

/// One player's record as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub life: i64,
}

impl Player {
    /// A fresh player: empty name, the given starting life.
    pub fn new(id: PlayerId, life: i64) -> Self {
        Self {
            id,
            name: String::new(),
            life,
        }
    }
}

/// The full state of a room at one instant.
///
/// Sent once to a connection when it joins and to every member after
/// each processed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    /// Players in the order they first joined.
    pub players: Vec<Player>,
    /// Always 0; carried for wire compatibility with existing clients.
    pub current_turn: i64,
    /// Server-side change counter of the room. Not sent on the wire; lets
    /// a writer recognize a snapshot older than one it already sent.
    #[serde(skip)]
    pub revision: u64,
}

// ---------------------------------------------------------------------------
// Envelope — client → server
// ---------------------------------------------------------------------------

/// The wrapper around every client command: `{"type": ..., "data": ...}`.
///
/// `data` stays untyped until [`Command::from_envelope`] knows what shape
/// to expect. Both fields default when missing, so `{}` decodes to an
/// envelope with an unknown (empty) type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Command — the closed set of things a client can ask for
// ---------------------------------------------------------------------------

/// A decoded client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `"change"`: add this (signed) amount to the sender's life.
    Change(i64),
    /// `"set-name"`: replace the sender's name. May be empty.
    SetName(String),
}

impl Command {
    pub const CHANGE: &'static str = "change";
    pub const SET_NAME: &'static str = "set-name";

    /// Decodes the payload of an envelope according to its type tag.
    ///
    /// Returns `Ok(None)` for a type tag this server does not know; such
    /// envelopes are ignored rather than rejected.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidPayload`] when the tag is known but `data`
    /// has the wrong shape.
    pub fn from_envelope(
        envelope: &Envelope,
    ) -> Result<Option<Self>, ProtocolError> {
        let command = match envelope.kind.as_str() {
            Self::CHANGE => Self::Change(payload(envelope)?),
            Self::SET_NAME => Self::SetName(payload(envelope)?),
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    /// The wire tag for this command.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Change(_) => Self::CHANGE,
            Self::SetName(_) => Self::SET_NAME,
        }
    }
}

fn payload<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, ProtocolError> {
    T::deserialize(&envelope.data).map_err(|source| {
        ProtocolError::InvalidPayload {
            kind: envelope.kind.clone(),
            source,
        }
    })
}
