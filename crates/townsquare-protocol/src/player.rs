//! Player presence: identity, display name, and last-known location.

use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// Which way a player's avatar is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    #[default]
    Front,
    Back,
    Left,
    Right,
}

/// A player's position and orientation on the town map.
///
/// Only the player's own session ever writes this; everyone else
/// observes it through `playerMoved` events.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    pub x: f64,
    pub y: f64,
    pub rotation: Direction,
    pub moving: bool,
}

/// A participant in a town, as seen by other participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Assigned by the server when the player joins.
    pub id: PlayerId,

    /// Display name chosen at join time. Never changes for the session.
    pub user_name: String,

    /// Where the player was last reported to be.
    pub location: UserLocation,
}

impl Player {
    /// Creates a player standing at the spawn point.
    pub fn new(id: PlayerId, user_name: impl Into<String>) -> Self {
        Self {
            id,
            user_name: user_name.into(),
            location: UserLocation::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_starts_at_spawn_facing_front() {
        let player = Player::new(PlayerId::new("p1"), "Bob");
        assert_eq!(player.location.x, 0.0);
        assert_eq!(player.location.y, 0.0);
        assert_eq!(player.location.rotation, Direction::Front);
        assert!(!player.location.moving);
    }

    #[test]
    fn test_player_json_uses_camel_case() {
        let player = Player::new(PlayerId::new("p1"), "Bob");
        let json: serde_json::Value = serde_json::to_value(&player).unwrap();

        assert_eq!(json["id"], "p1");
        assert_eq!(json["userName"], "Bob");
        assert_eq!(json["location"]["rotation"], "front");
        assert_eq!(json["location"]["moving"], false);
    }

    #[test]
    fn test_location_parses_client_movement() {
        let raw = r#"{"x": 12.5, "y": -3, "rotation": "left", "moving": true}"#;
        let location: UserLocation = serde_json::from_str(raw).unwrap();
        assert_eq!(location.x, 12.5);
        assert_eq!(location.y, -3.0);
        assert_eq!(location.rotation, Direction::Left);
        assert!(location.moving);
    }
}
