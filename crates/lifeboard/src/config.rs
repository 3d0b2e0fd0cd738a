//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use lifeboard_room::RoomConfig;

/// Settings for one server instance.
///
/// Set through [`LifeboardServerBuilder`](crate::LifeboardServerBuilder);
/// every field has a default.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: String,

    /// Directory plain HTTP requests are served from. `None` turns the
    /// static responder off.
    pub static_dir: Option<PathBuf>,

    /// Settings handed to every room.
    pub room: RoomConfig,

    /// Close a connection after this many malformed envelopes in a row.
    /// `None` keeps reading forever, dropping each bad message.
    pub malformed_limit: Option<u32>,

    /// How often to drop rooms nobody is connected to. `None` keeps every
    /// room for the life of the process.
    pub idle_sweep: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8001".to_string(),
            static_dir: None,
            room: RoomConfig::default(),
            malformed_limit: None,
            idle_sweep: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default_is_lenient_and_keeps_rooms() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8001");
        assert!(config.static_dir.is_none());
        assert!(config.malformed_limit.is_none());
        assert!(config.idle_sweep.is_none());
        assert_eq!(config.room.starting_life, 20);
    }
}
