//! A room: shared player records plus the connections subscribed to them.
//!
//! One `RwLock` guards both the players and the client set, so every
//! operation sees and leaves a consistent room. The lock is never held
//! across I/O: broadcasting copies what it needs, releases the lock, and
//! only then offers the snapshot to each client's queue.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lifeboard_protocol::{Player, PlayerId, RoomCode, RoomSnapshot};
use lifeboard_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::RoomConfig;

/// Outbound queue of one connected client.
///
/// Bounded by [`RoomConfig::client_buffer`]; the receiving end belongs to
/// the connection's writer task.
pub type ClientSender = mpsc::Sender<Arc<RoomSnapshot>>;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Targets whose queue accepted the snapshot.
    pub delivered: usize,
    /// Targets whose queue was full or closed.
    pub dropped: usize,
}

struct RoomInner {
    /// Bumped by every change to a player record.
    revision: u64,
    /// First-join order. Never shrinks.
    players: Vec<Player>,
    clients: HashMap<ConnectionId, ClientSender>,
}

impl RoomInner {
    fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }
}

/// Shared state of one room.
pub struct Room {
    code: RoomCode,
    config: RoomConfig,
    inner: RwLock<RoomInner>,
}

impl Room {
    /// Creates an empty room.
    pub fn new(code: RoomCode, config: RoomConfig) -> Self {
        Self {
            code,
            config,
            inner: RwLock::new(RoomInner {
                revision: 0,
                players: Vec::new(),
                clients: HashMap::new(),
            }),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Adds a connection to the room, creating its player on first sight.
    ///
    /// Returns the player's current record and whether it was just
    /// created. A known `player_id` is returned unchanged. The client is
    /// registered in the same critical section, so it receives every
    /// broadcast that reflects its own join.
    pub fn join(
        &self,
        player_id: PlayerId,
        conn_id: ConnectionId,
        sender: ClientSender,
    ) -> (Player, bool) {
        let mut inner = self.write();
        inner.clients.insert(conn_id, sender);

        if let Some(existing) = inner.player_mut(&player_id) {
            let player = existing.clone();
            tracing::info!(
                room = %self.code, player = %player_id, %conn_id,
                clients = inner.clients.len(),
                "player rejoined"
            );
            return (player, false);
        }

        let player = Player::new(player_id, self.config.starting_life);
        inner.players.push(player.clone());
        inner.revision += 1;
        tracing::info!(
            room = %self.code, player = %player.id, %conn_id,
            players = inner.players.len(),
            clients = inner.clients.len(),
            "player joined"
        );
        (player, true)
    }

    /// Removes a connection from the client set.
    ///
    /// Returns `false` if it was not there. The player record stays.
    pub fn leave(&self, conn_id: ConnectionId) -> bool {
        let mut inner = self.write();
        let removed = inner.clients.remove(&conn_id).is_some();
        if removed {
            tracing::debug!(
                room = %self.code, %conn_id,
                clients = inner.clients.len(),
                "client left"
            );
        }
        removed
    }

    /// Adds `delta` to a player's life, saturating at the `i64` bounds.
    /// Does nothing if the player is not in the room.
    pub fn apply_change(&self, player_id: &PlayerId, delta: i64) {
        let mut inner = self.write();
        if let Some(player) = inner.player_mut(player_id) {
            player.life = player.life.saturating_add(delta);
            inner.revision += 1;
        }
    }

    /// Replaces a player's name. Does nothing if the player is not in
    /// the room.
    pub fn apply_set_name(&self, player_id: &PlayerId, name: String) {
        let mut inner = self.write();
        if let Some(player) = inner.player_mut(player_id) {
            player.name = name;
            inner.revision += 1;
        }
    }

    /// Current state of the room, taken under a single read lock.
    pub fn snapshot(&self) -> RoomSnapshot {
        self.snapshot_of(&self.read())
    }

    /// Copies the current client set.
    pub fn broadcast_targets(&self) -> Vec<(ConnectionId, ClientSender)> {
        self.read()
            .clients
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }

    /// Offers the current snapshot to every client except `exclude`.
    ///
    /// Snapshot and target list come from the same read lock. Each
    /// target is tried independently and never waited on: a full or
    /// closed queue is logged and counted, and the loop moves on.
    pub fn broadcast(&self, exclude: Option<ConnectionId>) -> BroadcastReport {
        let (snapshot, targets) = {
            let inner = self.read();
            let targets: Vec<(ConnectionId, ClientSender)> = inner
                .clients
                .iter()
                .filter(|(id, _)| Some(**id) != exclude)
                .map(|(id, tx)| (*id, tx.clone()))
                .collect();
            (Arc::new(self.snapshot_of(&inner)), targets)
        };

        let mut report = BroadcastReport::default();
        for (conn_id, tx) in targets {
            match tx.try_send(Arc::clone(&snapshot)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    tracing::warn!(
                        room = %self.code, %conn_id,
                        "client queue full, snapshot dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    report.dropped += 1;
                    tracing::warn!(
                        room = %self.code, %conn_id,
                        "client queue closed, snapshot dropped"
                    );
                }
            }
        }
        report
    }

    pub fn player_count(&self) -> usize {
        self.read().players.len()
    }

    pub fn client_count(&self) -> usize {
        self.read().clients.len()
    }

    /// `true` when no connection is subscribed.
    pub fn is_idle(&self) -> bool {
        self.read().clients.is_empty()
    }

    fn snapshot_of(&self, inner: &RoomInner) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            players: inner.players.clone(),
            current_turn: 0,
            revision: inner.revision,
        }
    }

    // Every critical section leaves the room consistent, so a panic
    // elsewhere while holding the lock does not invalidate the data.
    fn read(&self) -> RwLockReadGuard<'_, RoomInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RoomInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new(RoomCode::from("r1"), RoomConfig::default())
    }

    fn pid(id: &str) -> PlayerId {
        PlayerId::from(id)
    }

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn client() -> (ClientSender, mpsc::Receiver<Arc<RoomSnapshot>>) {
        mpsc::channel(4)
    }

    #[test]
    fn test_new_room_is_empty() {
        let room = room();
        let snapshot = room.snapshot();
        assert_eq!(snapshot.code, RoomCode::from("r1"));
        assert!(snapshot.players.is_empty());
        assert_eq!(snapshot.current_turn, 0);
        assert!(room.is_idle());
    }

    #[test]
    fn test_join_creates_player_with_defaults() {
        let room = room();
        let (tx, _rx) = client();
        let (player, is_new) = room.join(pid("p1"), cid(1), tx);
        assert!(is_new);
        assert_eq!(player.id, pid("p1"));
        assert_eq!(player.name, "");
        assert_eq!(player.life, 20);
        assert_eq!(room.client_count(), 1);
    }

    #[test]
    fn test_join_uses_configured_starting_life() {
        let room = Room::new(
            RoomCode::from("r"),
            RoomConfig {
                starting_life: 40,
                ..RoomConfig::default()
            },
        );
        let (tx, _rx) = client();
        assert_eq!(room.join(pid("p"), cid(1), tx).0.life, 40);
    }

    #[test]
    fn test_rejoin_returns_existing_player_unchanged() {
        let room = room();
        let (tx1, _rx1) = client();
        room.join(pid("p1"), cid(1), tx1);
        room.apply_change(&pid("p1"), -3);
        room.apply_set_name(&pid("p1"), "Alice".into());

        let (tx2, _rx2) = client();
        let (player, is_new) = room.join(pid("p1"), cid(2), tx2);
        assert!(!is_new);
        assert_eq!(player.life, 17);
        assert_eq!(player.name, "Alice");
        assert_eq!(room.player_count(), 1);
        assert_eq!(room.client_count(), 2);
    }

    #[test]
    fn test_leave_is_idempotent_and_keeps_player() {
        let room = room();
        let (tx, _rx) = client();
        room.join(pid("p1"), cid(1), tx);

        assert!(room.leave(cid(1)));
        assert!(!room.leave(cid(1)));
        assert!(room.broadcast_targets().is_empty());
        assert_eq!(room.player_count(), 1);
    }

    #[test]
    fn test_leave_removes_only_matching_client() {
        let room = room();
        let (tx1, _rx1) = client();
        let (tx2, _rx2) = client();
        room.join(pid("p1"), cid(1), tx1);
        room.join(pid("p2"), cid(2), tx2);

        room.leave(cid(1));
        let targets: Vec<ConnectionId> =
            room.broadcast_targets().into_iter().map(|(id, _)| id).collect();
        assert_eq!(targets, vec![cid(2)]);
    }

    #[test]
    fn test_apply_change_saturates() {
        let room = room();
        let (tx, _rx) = client();
        room.join(pid("p1"), cid(1), tx);
        room.apply_change(&pid("p1"), i64::MAX);
        room.apply_change(&pid("p1"), 5);
        assert_eq!(room.snapshot().players[0].life, i64::MAX);
    }

    #[test]
    fn test_apply_to_unknown_player_is_noop() {
        let room = room();
        let (tx, _rx) = client();
        room.join(pid("p1"), cid(1), tx);
        let before = room.snapshot();

        room.apply_change(&pid("ghost"), 5);
        room.apply_set_name(&pid("ghost"), "Boo".into());

        assert_eq!(room.snapshot(), before);
    }

    #[test]
    fn test_revision_moves_only_on_real_changes() {
        let room = room();
        let (tx, _rx) = client();
        room.join(pid("p1"), cid(1), tx.clone());
        let after_join = room.snapshot().revision;
        assert!(after_join > 0);

        room.join(pid("p1"), cid(2), tx);
        room.apply_change(&pid("ghost"), 1);
        assert_eq!(room.snapshot().revision, after_join);

        room.apply_change(&pid("p1"), 1);
        assert!(room.snapshot().revision > after_join);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let room = room();
        let (tx1, mut rx1) = client();
        let (tx2, mut rx2) = client();
        room.join(pid("p1"), cid(1), tx1);
        room.join(pid("p2"), cid(2), tx2);

        let report = room.broadcast(None);
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });

        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        assert_eq!(a.players.len(), 2);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_broadcast_skips_excluded_client() {
        let room = room();
        let (tx1, mut rx1) = client();
        let (tx2, mut rx2) = client();
        room.join(pid("p1"), cid(1), tx1);
        room.join(pid("p2"), cid(2), tx2);

        let report = room.broadcast(Some(cid(2)));
        assert_eq!(report.delivered, 1);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block_others() {
        let room = room();
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(8);
        room.join(pid("slow"), cid(1), slow_tx);
        room.join(pid("fast"), cid(2), fast_tx);

        room.broadcast(None);
        let report = room.broadcast(None);

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(fast_rx.recv().await.is_some());
        assert!(fast_rx.recv().await.is_some());
    }

    #[test]
    fn test_closed_queue_is_counted_as_dropped() {
        let room = room();
        let (tx, rx) = client();
        room.join(pid("p1"), cid(1), tx);
        drop(rx);

        let report = room.broadcast(None);
        assert_eq!(report, BroadcastReport { delivered: 0, dropped: 1 });
    }
}
