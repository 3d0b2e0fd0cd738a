//! Mutation handlers: turn a client envelope into a change on a room.

use lifeboard_protocol::{Command, Envelope, PlayerId, ProtocolError};

use crate::Room;

/// What [`dispatch`] did with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A known command was applied (to a player that may or may not
    /// exist; an absent player is a silent no-op).
    Applied(&'static str),
    /// The type tag is not one this server knows.
    Ignored,
}

/// Decodes the envelope's payload and applies it on behalf of `player_id`.
///
/// # Errors
/// [`ProtocolError::InvalidPayload`] if the payload does not fit the
/// command's shape; the room is left untouched.
pub fn dispatch(
    room: &Room,
    player_id: &PlayerId,
    envelope: &Envelope,
) -> Result<Dispatched, ProtocolError> {
    match Command::from_envelope(envelope)? {
        Some(command) => {
            let kind = command.kind();
            apply_command(room, player_id, command);
            Ok(Dispatched::Applied(kind))
        }
        None => Ok(Dispatched::Ignored),
    }
}

/// Applies an already decoded command.
pub fn apply_command(room: &Room, player_id: &PlayerId, command: Command) {
    match command {
        Command::Change(delta) => room.apply_change(player_id, delta),
        Command::SetName(name) => room.apply_set_name(player_id, name),
    }
}
