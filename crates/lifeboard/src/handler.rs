//! Per-connection session: route, join, then relay commands until close.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. Parse `/room/{room}/player/{player}` from the request path
//!   2. Join the room and queue the initial snapshot
//!   3. Loop: decode envelopes → dispatch → broadcast
//!
//! Snapshots reach the socket through a separate writer task draining the
//! connection's queue, so a slow peer never holds up a room.

use std::sync::Arc;

use lifeboard_protocol::{Codec, Envelope, PlayerId, RoomSnapshot};
use lifeboard_room::{Dispatched, Room, dispatch};
use lifeboard_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::{LifeboardError, Route};

/// Drop guard that takes the connection out of its room when the session
/// ends, on every exit path including a panic.
struct Membership {
    room: Arc<Room>,
    conn_id: ConnectionId,
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.room.leave(self.conn_id);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), LifeboardError> {
    let conn_id = conn.id();

    let Some(route) = Route::parse(conn.path()) else {
        let path = conn.path().to_owned();
        tracing::warn!(%conn_id, path = %path, "no room route, closing");
        let _ = conn.close().await;
        return Err(LifeboardError::UnknownRoute(path));
    };

    let conn = Arc::new(conn);
    let room = state.rooms.get_or_create(&route.room);

    let (tx, rx) = mpsc::channel(room.config().client_buffer.max(1));
    tokio::spawn(write_snapshots(Arc::clone(&conn), rx, state.codec.clone()));

    let (_, is_new) = room.join(route.player.clone(), conn_id, tx.clone());
    let membership = Membership {
        room: Arc::clone(&room),
        conn_id,
    };

    if tx.try_send(Arc::new(room.snapshot())).is_err() {
        tracing::warn!(%conn_id, "initial snapshot dropped");
    }
    // The room now holds the only sender; the writer ends once it leaves.
    drop(tx);

    if is_new {
        room.broadcast(Some(conn_id));
    }

    let result = relay_commands(&conn, &state, &room, &route.player).await;
    drop(membership);
    result
}

/// Reads envelopes until the peer goes away, applying each to the room
/// and broadcasting the result.
async fn relay_commands<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    room: &Room,
    player: &PlayerId,
) -> Result<(), LifeboardError> {
    let conn_id = conn.id();
    let mut malformed: u32 = 0;

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(
                    %conn_id, room = %room.code(), %player,
                    "connection closed cleanly"
                );
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, %player, error = %e, "recv error");
                return Err(e.into());
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => {
                malformed = 0;
                env
            }
            Err(e) => {
                malformed = malformed.saturating_add(1);
                tracing::debug!(
                    %conn_id, %player, error = %e, "failed to decode envelope"
                );
                if state
                    .config
                    .malformed_limit
                    .is_some_and(|limit| malformed >= limit)
                {
                    tracing::warn!(
                        %conn_id, %player, malformed,
                        "too many malformed messages, closing"
                    );
                    let _ = conn.close().await;
                    return Err(LifeboardError::TooManyMalformed(malformed));
                }
                continue;
            }
        };

        match dispatch(room, player, &envelope) {
            Ok(Dispatched::Applied(kind)) => {
                tracing::debug!(room = %room.code(), %player, kind, "command applied");
            }
            Ok(Dispatched::Ignored) => {
                tracing::debug!(
                    %conn_id, kind = %envelope.kind, "ignoring unknown command"
                );
            }
            Err(e) => {
                tracing::debug!(%conn_id, %player, error = %e, "bad command payload");
            }
        }

        let report = room.broadcast(None);
        tracing::trace!(
            room = %room.code(),
            delivered = report.delivered,
            dropped = report.dropped,
            "snapshot broadcast"
        );
    }
}

/// Drains a connection's queue onto the socket.
///
/// Broadcasts from different tasks may land out of order; a snapshot
/// older than one already sent is skipped. Send failures are logged and
/// the loop keeps draining so the queue never backs up.
async fn write_snapshots<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::Receiver<Arc<RoomSnapshot>>,
    codec: C,
) {
    let conn_id = conn.id();
    let mut sent: Option<u64> = None;

    while let Some(snapshot) = rx.recv().await {
        if sent.is_some_and(|revision| snapshot.revision < revision) {
            tracing::trace!(%conn_id, revision = snapshot.revision, "skipping stale snapshot");
            continue;
        }
        sent = Some(snapshot.revision);

        let bytes = match codec.encode(snapshot.as_ref()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode snapshot");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::warn!(%conn_id, error = %e, "snapshot send failed");
        }
    }

    tracing::debug!(%conn_id, "writer finished");
}
