//! Heist simulation modules

pub mod abilities;
pub mod cameras;
pub mod layout;
pub mod match_task;
pub mod projection;
pub mod simulator;
pub mod state;

pub use match_task::{MatchCommand, MatchHandle, MatchTask, Participant};
pub use projection::RoleView;
pub use simulator::{ActionError, MatchSimulator};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use simulator::Direction;

/// The four crew roles. Each room holds exactly one participant per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Moves the shared avatar; sees the floor plan
    Navigator,
    /// Sees and disables cameras
    Security,
    /// Sees loot and pings it for the navigator
    LootMaster,
    /// Watches the alarm, the event feed and the run stats
    AlarmController,
}

impl Role {
    /// Assignment order for a fresh room
    pub const ALL: [Role; 4] = [
        Role::Navigator,
        Role::Security,
        Role::LootMaster,
        Role::AlarmController,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Navigator => "Navigator",
            Role::Security => "Security",
            Role::LootMaster => "Loot Master",
            Role::AlarmController => "Alarm Controller",
        }
    }
}

/// An in-match request from a participant.
///
/// Payload fields are read leniently: a malformed direction, ability name or
/// target id parses as absent and is refused by the match as an action
/// failure instead of failing the whole message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum PlayerAction {
    /// Step the avatar one cell
    Move {
        #[serde(default, deserialize_with = "lenient")]
        direction: Option<Direction>,
    },
    /// Invoke the acting role's ability
    Ability {
        #[serde(default, deserialize_with = "lenient")]
        ability_name: String,
        #[serde(default, deserialize_with = "lenient")]
        params: abilities::AbilityParams,
    },
}

#[cfg(test)]
impl PlayerAction {
    pub fn step(direction: Direction) -> Self {
        Self::Move {
            direction: Some(direction),
        }
    }
}

/// Deserialize a field, treating a value of the wrong shape like a missing one
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}
