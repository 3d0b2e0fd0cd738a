//! Connection addressing: which room and player a connection speaks for.

use lifeboard_protocol::{PlayerId, RoomCode};

/// A parsed `/room/{room}/player/{player}` path.
///
/// Both segments are taken verbatim; any non-empty segment is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub room: RoomCode,
    pub player: PlayerId,
}

impl Route {
    /// Parses a request path. `None` if it is not a room route.
    pub fn parse(path: &str) -> Option<Self> {
        let mut segments = path.strip_prefix('/')?.split('/');
        match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some("room"), Some(room), Some("player"), Some(player), None)
                if !room.is_empty() && !player.is_empty() =>
            {
                Some(Self {
                    room: RoomCode::from(room),
                    player: PlayerId::from(player),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_room_route() {
        let route = Route::parse("/room/r1/player/p1").unwrap();
        assert_eq!(route.room, RoomCode::from("r1"));
        assert_eq!(route.player, PlayerId::from("p1"));
    }

    #[test]
    fn test_segments_taken_verbatim() {
        let route = Route::parse("/room/ABC%20d/player/x.y-z").unwrap();
        assert_eq!(route.room.as_str(), "ABC%20d");
        assert_eq!(route.player.as_str(), "x.y-z");
    }

    #[test]
    fn test_rejects_other_paths() {
        assert_eq!(Route::parse("/"), None);
        assert_eq!(Route::parse("/index.html"), None);
        assert_eq!(Route::parse("/room/r1"), None);
        assert_eq!(Route::parse("/room/r1/player"), None);
        assert_eq!(Route::parse("room/r1/player/p1"), None);
        assert_eq!(Route::parse("/rooms/r1/player/p1"), None);
    }

    #[test]
    fn test_rejects_empty_segments_and_extra_parts() {
        assert_eq!(Route::parse("/room//player/p1"), None);
        assert_eq!(Route::parse("/room/r1/player/"), None);
        assert_eq!(Route::parse("/room/r1/player/p1/extra"), None);
    }
}
