//! Room configuration.

use serde::{Deserialize, Serialize};

/// Configuration shared by every room a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Life a player starts with the first time they join a room.
    pub starting_life: i64,

    /// How many snapshots may wait in one client's outbound queue.
    ///
    /// When a client falls this far behind, further snapshots for it are
    /// dropped until it catches up; other clients are unaffected.
    pub client_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            starting_life: 20,
            client_buffer: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.starting_life, 20);
        assert_eq!(config.client_buffer, 16);
    }

    #[test]
    fn test_room_config_partial_json_keeps_defaults() {
        let config: RoomConfig =
            serde_json::from_str(r#"{"starting_life": 40}"#).unwrap();
        assert_eq!(config.starting_life, 40);
        assert_eq!(config.client_buffer, 16);
    }
}
