//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::snapshot::{BuildingSnapshot, PlayerSnapshot, WorldSnapshot};
use crate::game::{BuildingType, MoveInput, PlacementRejection};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the world under a display name
    Join {
        #[serde(default)]
        display_name: String,
    },

    /// Directional movement intent (replaces the previous one)
    Input {
        #[serde(default)]
        up: bool,
        #[serde(default)]
        down: bool,
        #[serde(default)]
        left: bool,
        #[serde(default)]
        right: bool,
    },

    /// Request a building at a world position
    PlaceBuilding {
        x: f32,
        y: f32,
        #[serde(default)]
        building_type: BuildingType,
    },

    /// Signal readiness for the next match while waiting
    ReadyUp,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        connection_id: Uuid,
        server_time: u64,
    },

    /// Confirmation of join with the assigned player
    Joined {
        player: PlayerSnapshot,
        world_width: f32,
        world_height: f32,
    },

    /// Full world state, sent every tick
    Snapshot(WorldSnapshot),

    BuildingPlaced {
        building: BuildingSnapshot,
    },

    BuildingRejected {
        reason: PlacementRejection,
    },

    /// Result of a ready-up request
    ReadyResult {
        /// True when this ready-up started a new match
        match_reset: bool,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Movement intent carried by an `Input` message
    pub fn move_input(&self) -> Option<MoveInput> {
        match *self {
            ClientMsg::Input {
                up,
                down,
                left,
                right,
            } => Some(MoveInput {
                up,
                down,
                left,
                right,
            }),
            _ => None,
        }
    }
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_input_flags_with_defaults() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"input","left":true}"#).unwrap();
        let input = msg.move_input().expect("input message");
        assert!(input.left);
        assert!(!input.right && !input.up && !input.down);
        assert!(ClientMsg::ReadyUp.move_input().is_none());
    }

    #[test]
    fn parses_place_building() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"place_building","x":10.5,"y":20,"building_type":"cannon"}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::PlaceBuilding {
                x,
                y,
                building_type,
            } => {
                assert_eq!((x, y), (10.5, 20.0));
                assert_eq!(building_type, BuildingType::Cannon);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"place_building","x":1,"y":2}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMsg::PlaceBuilding {
                building_type: BuildingType::ArrowTower,
                ..
            }
        ));
    }

    #[test]
    fn unit_variants_and_unknown_types() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"ready_up"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::ReadyUp));
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn rejection_reason_is_snake_case() {
        let json = serde_json::to_value(ServerMsg::BuildingRejected {
            reason: PlacementRejection::TooCloseToCentral,
        })
        .unwrap();
        assert_eq!(json["type"], "building_rejected");
        assert_eq!(json["reason"], "too_close_to_central");
    }
}
