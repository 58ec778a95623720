//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::layout::{Difficulty, MapSummary};
use crate::game::{PlayerAction, Role, RoleView};
use crate::session::room::RoomSettings;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Open a new room and take its first role
    CreateRoom,

    /// Join an existing room by code
    JoinRoom { code: String },

    /// Change map or difficulty while the room is still waiting
    UpdateSettings {
        code: String,
        settings: SettingsPatch,
    },

    /// Start the heist once all four roles are filled
    StartGame { code: String },

    /// In-match action
    Action { code: String, action: PlayerAction },

    /// Ask for a fresh projection of the running match
    GetState { code: String },

    /// Ask for the map catalogue
    GetMaps,
}

/// Partial settings update; missing fields stay as they are
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub map_id: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Welcome message after connection
    Connected {
        player_id: Uuid,
        maps: Vec<MapSummary>,
    },

    /// Sent to the creator of a room
    RoomCreated {
        code: String,
        role: Role,
        role_name: &'static str,
        player_count: usize,
        settings: RoomSettings,
        maps: Vec<MapSummary>,
    },

    /// Sent to a participant who just joined
    RoomJoined {
        code: String,
        role: Role,
        role_name: &'static str,
        player_count: usize,
        can_start: bool,
        settings: RoomSettings,
        maps: Vec<MapSummary>,
    },

    /// Roster after someone joined
    PlayerJoined {
        players: Vec<PlayerInfo>,
        can_start: bool,
    },

    /// Roster after someone left
    PlayerLeft {
        player_id: Uuid,
        players: Vec<PlayerInfo>,
    },

    SettingsUpdated {
        settings: RoomSettings,
        maps: Vec<MapSummary>,
    },

    GameStarted {
        map_id: String,
        difficulty: Difficulty,
    },

    /// Role-projected match snapshot
    StateUpdate { state: RoleView },

    MapsList { maps: Vec<MapSummary> },

    /// An in-match action was refused
    ActionFailed { message: String },

    /// Error message
    Error { message: String },
}

impl ServerMsg {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn action_failed(message: impl Into<String>) -> Self {
        Self::ActionFailed {
            message: message.into(),
        }
    }
}

/// Roster entry for lobby display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: Uuid,
    pub role: Role,
    pub role_name: &'static str,
}
