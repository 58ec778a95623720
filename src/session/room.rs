//! A single room: members, role pool and lobby settings

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::layout::{Difficulty, DEFAULT_MAP_ID};
use crate::game::{MatchHandle, Participant, Role};
use crate::ws::protocol::{PlayerInfo, ServerMsg};
use crate::ws::{deliver, Outbound};

use super::SessionError;

/// One participant per role
pub const ROOM_CAPACITY: usize = Role::ALL.len();

/// Room phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Lobby, accepting joins and settings changes
    Waiting,
    /// A match task is running
    Playing,
    /// Emptied and about to be removed
    Closed,
}

/// Lobby-chosen match parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub map_id: String,
    pub difficulty: Difficulty,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            map_id: DEFAULT_MAP_ID.to_string(),
            difficulty: Difficulty::Medium,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub player_id: Uuid,
    pub role: Role,
    pub outbound: Outbound,
}

pub struct Room {
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub created_at: Instant,
    /// In join order
    members: Vec<Member>,
    role_pool: VecDeque<Role>,
    match_handle: Option<MatchHandle>,
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

impl Room {
    pub fn new() -> Self {
        Self {
            status: RoomStatus::Waiting,
            settings: RoomSettings::default(),
            created_at: Instant::now(),
            members: Vec::with_capacity(ROOM_CAPACITY),
            role_pool: Role::ALL.into_iter().collect(),
            match_handle: None,
        }
    }

    pub fn player_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn can_start(&self) -> bool {
        self.status == RoomStatus::Waiting && self.members.len() == ROOM_CAPACITY
    }

    pub fn contains(&self, player_id: Uuid) -> bool {
        self.members.iter().any(|m| m.player_id == player_id)
    }

    pub fn role_of(&self, player_id: Uuid) -> Option<Role> {
        self.members
            .iter()
            .find(|m| m.player_id == player_id)
            .map(|m| m.role)
    }

    /// Seat a new member with the next free role
    pub fn add_member(&mut self, player_id: Uuid, outbound: Outbound) -> Result<Role, SessionError> {
        match self.status {
            RoomStatus::Waiting => {}
            RoomStatus::Playing => return Err(SessionError::GameInProgress),
            RoomStatus::Closed => return Err(SessionError::RoomNotFound),
        }
        if self.members.len() >= ROOM_CAPACITY {
            return Err(SessionError::RoomFull);
        }
        if self.contains(player_id) {
            return Err(SessionError::AlreadyInRoom);
        }
        let role = self.role_pool.pop_front().ok_or(SessionError::RoomFull)?;
        self.members.push(Member {
            player_id,
            role,
            outbound,
        });
        Ok(role)
    }

    /// Unseat a member; its role becomes the next one handed out
    pub fn remove_member(&mut self, player_id: Uuid) -> Option<Role> {
        let idx = self.members.iter().position(|m| m.player_id == player_id)?;
        let member = self.members.remove(idx);
        self.role_pool.push_front(member.role);
        Some(member.role)
    }

    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.members
            .iter()
            .map(|m| PlayerInfo {
                id: m.player_id,
                role: m.role,
                role_name: m.role.display_name(),
            })
            .collect()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.members
            .iter()
            .map(|m| Participant {
                player_id: m.player_id,
                role: m.role,
                outbound: m.outbound.clone(),
            })
            .collect()
    }

    pub fn send_to(&self, player_id: Uuid, msg: ServerMsg) {
        if let Some(member) = self.members.iter().find(|m| m.player_id == player_id) {
            deliver(player_id, &member.outbound, msg);
        }
    }

    /// Send to every member
    pub fn broadcast(&self, msg: &ServerMsg) {
        for member in &self.members {
            deliver(member.player_id, &member.outbound, msg.clone());
        }
    }

    pub fn begin_match(&mut self, handle: MatchHandle) {
        self.status = RoomStatus::Playing;
        self.match_handle = Some(handle);
    }

    pub fn match_handle(&self) -> Option<&MatchHandle> {
        self.match_handle.as_ref()
    }

    /// Mark closed and hand back the match handle, if any
    pub fn close(&mut self) -> Option<MatchHandle> {
        self.status = RoomStatus::Closed;
        self.match_handle.take()
    }

    pub fn is_stale(&self, now: Instant, max_age: Duration) -> bool {
        self.status != RoomStatus::Playing && now.saturating_duration_since(self.created_at) > max_age
    }
}
