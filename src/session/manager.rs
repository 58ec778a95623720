//! Room manager - owns every room and routes lobby and in-match requests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::layout::{catalogue, is_known_map};
use crate::game::{MatchCommand, MatchSimulator, MatchTask, PlayerAction, Role, RoleView};
use crate::ws::protocol::{ServerMsg, SettingsPatch};
use crate::ws::{deliver, Outbound};

use super::room::{Room, RoomSettings, RoomStatus};
use super::SessionError;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are matched case-insensitively
fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// All rooms plus the connection table
pub struct RoomManager {
    rooms: DashMap<String, Room>,
    /// Connected participant -> room they currently sit in
    connections: RwLock<HashMap<Uuid, Option<String>>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn connect(&self, player_id: Uuid) {
        self.connections.write().insert(player_id, None);
        debug!(player_id = %player_id, "Connection registered");
    }

    /// Drop the connection and leave whatever room it was in
    pub fn disconnect(&self, player_id: Uuid) {
        self.leave_room(player_id);
        self.connections.write().remove(&player_id);
        debug!(player_id = %player_id, "Connection unregistered");
    }

    #[cfg(test)]
    pub fn current_room(&self, player_id: Uuid) -> Option<String> {
        self.connections.read().get(&player_id).cloned().flatten()
    }

    /// Point the connection at `code`, leaving the previous room if different
    fn enter(&self, player_id: Uuid, code: &str) {
        let previous = self
            .connections
            .write()
            .insert(player_id, Some(code.to_string()))
            .flatten();
        if let Some(previous) = previous.filter(|p| p != code) {
            self.remove_from_room(player_id, &previous);
        }
    }

    /// Open a room and seat its creator as the first role
    pub fn create_room(&self, player_id: Uuid, outbound: Outbound) -> Result<String, SessionError> {
        let (code, role, settings, player_count) = loop {
            let code = generate_code();
            if let Entry::Vacant(slot) = self.rooms.entry(code.clone()) {
                let mut room = Room::new();
                let role = room.add_member(player_id, outbound.clone())?;
                let settings = room.settings.clone();
                let player_count = room.player_count();
                slot.insert(room);
                break (code, role, settings, player_count);
            }
        };

        self.enter(player_id, &code);

        deliver(
            player_id,
            &outbound,
            ServerMsg::RoomCreated {
                code: code.clone(),
                role,
                role_name: role.display_name(),
                player_count,
                settings,
                maps: catalogue(),
            },
        );

        info!(room = %code, player_id = %player_id, "Room created");
        Ok(code)
    }

    /// Seat a participant in an existing lobby
    pub fn join_room(
        &self,
        player_id: Uuid,
        code: &str,
        outbound: Outbound,
    ) -> Result<Role, SessionError> {
        let code = normalize(code);
        let role = {
            let mut room = self.rooms.get_mut(&code).ok_or(SessionError::RoomNotFound)?;
            let role = room.add_member(player_id, outbound)?;
            let can_start = room.can_start();

            room.send_to(
                player_id,
                ServerMsg::RoomJoined {
                    code: code.clone(),
                    role,
                    role_name: role.display_name(),
                    player_count: room.player_count(),
                    can_start,
                    settings: room.settings.clone(),
                    maps: catalogue(),
                },
            );
            room.broadcast(&ServerMsg::PlayerJoined {
                players: room.roster(),
                can_start,
            });
            role
        };

        self.enter(player_id, &code);

        info!(room = %code, player_id = %player_id, role = ?role, "Player joined room");
        Ok(role)
    }

    /// Leave the connection's current room, if any
    pub fn leave_room(&self, player_id: Uuid) {
        let code = self
            .connections
            .write()
            .get_mut(&player_id)
            .and_then(Option::take);
        if let Some(code) = code {
            self.remove_from_room(player_id, &code);
        }
    }

    fn remove_from_room(&self, player_id: Uuid, code: &str) {
        let emptied = {
            let Some(mut room) = self.rooms.get_mut(code) else {
                return;
            };
            let Some(role) = room.remove_member(player_id) else {
                return;
            };
            info!(room = %code, player_id = %player_id, role = ?role, "Player left room");

            if let Some(handle) = room.match_handle() {
                handle.send(MatchCommand::PlayerLeft { player_id });
            }

            if room.is_empty() {
                if let Some(handle) = room.close() {
                    handle.stop();
                }
                true
            } else {
                room.broadcast(&ServerMsg::PlayerLeft {
                    player_id,
                    players: room.roster(),
                });
                false
            }
        };

        if emptied
            && self
                .rooms
                .remove_if(code, |_, room| room.status == RoomStatus::Closed)
                .is_some()
        {
            info!(room = %code, "Room emptied and removed");
        }
    }

    /// Change map or difficulty of a waiting room
    pub fn update_settings(
        &self,
        player_id: Uuid,
        code: &str,
        patch: SettingsPatch,
    ) -> Result<RoomSettings, SessionError> {
        let code = normalize(code);
        let mut room = self.rooms.get_mut(&code).ok_or(SessionError::RoomNotFound)?;
        if !room.contains(player_id) {
            return Err(SessionError::NotInRoom);
        }
        if room.status != RoomStatus::Waiting {
            return Err(SessionError::GameAlreadyStarted);
        }
        if let Some(map_id) = &patch.map_id {
            if !is_known_map(map_id) {
                return Err(SessionError::UnknownMap);
            }
        }

        if let Some(map_id) = patch.map_id {
            room.settings.map_id = map_id;
        }
        if let Some(difficulty) = patch.difficulty {
            room.settings.difficulty = difficulty;
        }

        let settings = room.settings.clone();
        room.broadcast(&ServerMsg::SettingsUpdated {
            settings: settings.clone(),
            maps: catalogue(),
        });

        info!(
            room = %code,
            map = %settings.map_id,
            difficulty = settings.difficulty.as_str(),
            "Settings updated"
        );
        Ok(settings)
    }

    /// Start the heist and hand the room to a new match task
    pub fn start_game(&self, code: &str) -> Result<(), SessionError> {
        let code = normalize(code);
        let mut room = self.rooms.get_mut(&code).ok_or(SessionError::RoomNotFound)?;
        if room.status != RoomStatus::Waiting {
            return Err(SessionError::GameAlreadyStarted);
        }
        if !room.can_start() {
            return Err(SessionError::NotEnoughPlayers);
        }

        let settings = room.settings.clone();
        room.broadcast(&ServerMsg::GameStarted {
            map_id: settings.map_id.clone(),
            difficulty: settings.difficulty,
        });

        let sim = MatchSimulator::new(&settings.map_id, settings.difficulty, rand::random());
        let handle = MatchTask::spawn(code.clone(), sim, room.participants());
        room.begin_match(handle);

        info!(
            room = %code,
            map = %settings.map_id,
            difficulty = settings.difficulty.as_str(),
            "Game started"
        );
        Ok(())
    }

    /// Forward an in-match action to the room's match task
    pub async fn route_action(
        &self,
        player_id: Uuid,
        code: &str,
        action: PlayerAction,
    ) -> Result<(), SessionError> {
        let (handle, role) = {
            let room = self
                .rooms
                .get(&normalize(code))
                .ok_or(SessionError::GameNotInProgress)?;
            let handle = room
                .match_handle()
                .filter(|_| room.status == RoomStatus::Playing)
                .cloned()
                .ok_or(SessionError::GameNotInProgress)?;
            let role = room.role_of(player_id).ok_or(SessionError::NotInRoom)?;
            (handle, role)
        };

        let (reply, rx) = oneshot::channel();
        if !handle.send(MatchCommand::Action {
            player_id,
            role,
            action,
            reply,
        }) {
            return Err(SessionError::GameNotInProgress);
        }
        rx.await.map_err(|_| SessionError::GameNotInProgress)??;
        Ok(())
    }

    /// Current projection for a member of a playing room
    pub async fn get_state(&self, player_id: Uuid, code: &str) -> Option<RoleView> {
        let handle = {
            let room = self.rooms.get(&normalize(code))?;
            if room.status != RoomStatus::Playing || !room.contains(player_id) {
                return None;
            }
            room.match_handle()?.clone()
        };

        let (reply, rx) = oneshot::channel();
        if !handle.send(MatchCommand::GetState { player_id, reply }) {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Remove rooms that are not playing and older than `max_age`
    pub fn cleanup_stale(&self, max_age: Duration) -> usize {
        self.cleanup_stale_at(std::time::Instant::now(), max_age)
    }

    fn cleanup_stale_at(&self, now: std::time::Instant, max_age: Duration) -> usize {
        let stale: Vec<String> = self
            .rooms
            .iter()
            .filter(|room| room.is_stale(now, max_age))
            .map(|room| room.key().clone())
            .collect();

        let mut removed = 0;
        for code in stale {
            if let Some((_, mut room)) = self
                .rooms
                .remove_if(&code, |_, room| room.is_stale(now, max_age))
            {
                if let Some(handle) = room.close() {
                    handle.stop();
                }
                removed += 1;
                info!(room = %code, "Removed stale room");
            }
        }

        if removed > 0 {
            let mut connections = self.connections.write();
            for current in connections.values_mut() {
                if current.as_ref().is_some_and(|c| !self.rooms.contains_key(c)) {
                    *current = None;
                }
            }
        }
        removed
    }

    /// Periodic stale-room sweep
    pub async fn run_cleanup(self: Arc<Self>, every: Duration, max_age: Duration) {
        let mut ticker = interval_at(Instant::now() + every, every);
        loop {
            ticker.tick().await;
            let removed = self.cleanup_stale(max_age);
            debug!(
                removed,
                remaining = self.room_count(),
                "Stale room sweep finished"
            );
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn playing_count(&self) -> usize {
        self.rooms
            .iter()
            .filter(|room| room.status == RoomStatus::Playing)
            .count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
