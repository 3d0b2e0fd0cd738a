//! Room registry: maps room codes to live rooms.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lifeboard_protocol::RoomCode;

use crate::{Room, RoomConfig};

/// Owns every room of one server.
///
/// Rooms are created on first reference and kept until
/// [`evict_idle`](Self::evict_idle) is called; nothing removes them on
/// its own. The lock here only guards the code→room map, so work inside
/// one room never blocks lookups of another.
pub struct RoomRegistry {
    config: RoomConfig,
    rooms: RwLock<HashMap<RoomCode, Arc<Room>>>,
}

impl RoomRegistry {
    /// Creates an empty registry whose rooms use `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the room for `code`, creating it if needed.
    ///
    /// Concurrent callers for the same new code all get the same room.
    pub fn get_or_create(&self, code: &RoomCode) -> Arc<Room> {
        if let Some(room) = self.read().get(code) {
            return Arc::clone(room);
        }

        // Someone may have created it between the two locks; `entry`
        // settles that under the write lock.
        let mut rooms = self.write();
        let room = rooms.entry(code.clone()).or_insert_with(|| {
            tracing::info!(room = %code, "room created");
            Arc::new(Room::new(code.clone(), self.config.clone()))
        });
        Arc::clone(room)
    }

    pub fn get(&self, code: &RoomCode) -> Option<Arc<Room>> {
        self.read().get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Codes of all rooms, in no particular order.
    pub fn codes(&self) -> Vec<RoomCode> {
        self.read().keys().cloned().collect()
    }

    /// Drops rooms nobody is connected to. Returns how many were removed.
    ///
    /// A room still referenced outside the registry (a session between
    /// lookup and join, for instance) is kept even with no clients.
    pub fn evict_idle(&self) -> usize {
        let mut rooms = self.write();
        let before = rooms.len();
        rooms.retain(|_, room| Arc::strong_count(room) > 1 || !room.is_idle());
        let evicted = before - rooms.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = rooms.len(), "idle rooms evicted");
        }
        evicted
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RoomCode, Arc<Room>>> {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RoomCode, Arc<Room>>> {
        self.rooms.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use lifeboard_protocol::PlayerId;
    use lifeboard_transport::ConnectionId;
    use tokio::sync::mpsc;

    use super::*;

    fn code(c: &str) -> RoomCode {
        RoomCode::from(c)
    }

    #[test]
    fn test_get_or_create_returns_same_room() {
        let registry = RoomRegistry::default();
        let a = registry.get_or_create(&code("r1"));
        let b = registry.get_or_create(&code("r1"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_codes_get_distinct_rooms() {
        let registry = RoomRegistry::default();
        let a = registry.get_or_create(&code("r1"));
        let b = registry.get_or_create(&code("r2"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.code(), &code("r2"));

        let mut codes = registry.codes();
        codes.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(codes, vec![code("r1"), code("r2")]);
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = RoomRegistry::default();
        assert!(registry.get(&code("nope")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registries_are_independent() {
        let one = RoomRegistry::default();
        let two = RoomRegistry::default();
        one.get_or_create(&code("r1"));
        assert_eq!(one.len(), 1);
        assert!(two.is_empty());
    }

    #[test]
    fn test_registry_config_reaches_rooms() {
        let registry = RoomRegistry::new(RoomConfig {
            starting_life: 7,
            ..RoomConfig::default()
        });
        let room = registry.get_or_create(&code("r"));
        let (player, _) =
            room.join(PlayerId::from("p"), ConnectionId::new(1), mpsc::channel(1).0);
        assert_eq!(player.life, 7);
    }

    #[test]
    fn test_evict_idle_keeps_busy_and_referenced_rooms() {
        let registry = RoomRegistry::default();

        // Connected client: kept.
        let busy = registry.get_or_create(&code("busy"));
        let (tx, _rx) = mpsc::channel(1);
        busy.join(PlayerId::from("p"), ConnectionId::new(1), tx);
        drop(busy);

        // No clients, but someone still holds it: kept.
        let held = registry.get_or_create(&code("held"));

        // No clients, nobody holding it: evicted.
        registry.get_or_create(&code("idle"));

        assert_eq!(registry.evict_idle(), 1);
        assert!(registry.get(&code("idle")).is_none());
        assert!(registry.get(&code("busy")).is_some());
        assert!(registry.get(&code("held")).is_some());
        drop(held);
    }
}
