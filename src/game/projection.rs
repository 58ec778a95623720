//! Role-filtered views of the match state
//!
//! A view only carries what its role is allowed to see. The sound batch is
//! drained by the caller once per outgoing broadcast and handed to every
//! projection built for that broadcast.

use std::collections::BTreeMap;

use serde::Serialize;

use super::abilities::{AbilityKind, AbilityView};
use super::layout::{Difficulty, Facing, Grid, LootKind, Position};
use super::state::{Alarm, FinalScore, LogEntry, Loot, MatchState, MatchStats, MatchStatus, SoundEvent};
use super::Role;

/// Narrative entries shown to the alarm controller
pub const ALARM_FEED_LEN: usize = 15;

/// A projected snapshot for one participant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    pub status: MatchStatus,
    pub tick: u64,
    pub map_id: &'static str,
    pub difficulty: Difficulty,
    pub role: Role,
    #[serde(flatten)]
    pub detail: RoleDetail,
    pub ability: BTreeMap<&'static str, AbilityView>,
    pub sound_events: Vec<SoundEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<FinalScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_reason: Option<String>,
}

/// The role-specific part of a view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoleDetail {
    Navigator(NavigatorView),
    Security(SecurityView),
    LootMaster(LootMasterView),
    AlarmController(AlarmControllerView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigatorView {
    pub map: Grid,
    pub player: Position,
    pub entry: Position,
    pub exit: Position,
    pub score: u32,
    pub collected_count: usize,
    pub total_loot: usize,
    pub pinged_loot: Vec<PingedLoot>,
}

/// A pinged loot marker: where and what, never how much
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingedLoot {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: LootKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapSize {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityView {
    pub cameras: Vec<CameraView>,
    pub map_size: MapSize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraView {
    pub id: usize,
    pub x: i32,
    pub y: i32,
    pub direction: Facing,
    pub rotates: bool,
    pub current_angle: f64,
    pub fov_angle: f64,
    pub fov_range: f64,
    pub rotation_speed: f64,
    pub rotation_direction: i8,
    pub min_angle: f64,
    pub max_angle: f64,
    pub disabled: bool,
    pub disabled_until: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LootMasterView {
    pub loot: Vec<Loot>,
    pub collected_loot: Vec<Loot>,
    pub map_size: MapSize,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmControllerView {
    pub alarm: Alarm,
    pub events: Vec<LogEntry>,
    pub stats: MatchStats,
}

fn map_size(state: &MatchState) -> MapSize {
    MapSize {
        width: state.grid.width,
        height: state.grid.height,
    }
}

fn detail_for(state: &MatchState, role: Role, now: u64) -> RoleDetail {
    match role {
        Role::Navigator => RoleDetail::Navigator(NavigatorView {
            map: state.grid.clone(),
            player: state.player,
            entry: state.entry,
            exit: state.exit,
            score: state.score,
            collected_count: state.collected_count(),
            total_loot: state.loot.len(),
            pinged_loot: state
                .loot
                .iter()
                .filter(|l| l.is_pinged_at(now))
                .map(|l| PingedLoot {
                    x: l.position.x,
                    y: l.position.y,
                    kind: l.kind,
                })
                .collect(),
        }),
        Role::Security => RoleDetail::Security(SecurityView {
            cameras: state
                .cameras
                .iter()
                .map(|c| CameraView {
                    id: c.id,
                    x: c.position.x,
                    y: c.position.y,
                    direction: c.facing,
                    rotates: c.rotates,
                    current_angle: c.facing_degrees(),
                    fov_angle: c.fov_angle,
                    fov_range: c.fov_range,
                    rotation_speed: c.rotation_speed,
                    rotation_direction: c.rotation_direction,
                    min_angle: c.min_angle,
                    max_angle: c.max_angle,
                    // Recomputed so an expired disable reads as enabled
                    disabled: c.is_disabled_at(now),
                    disabled_until: c.disabled_until,
                })
                .collect(),
            map_size: map_size(state),
        }),
        Role::LootMaster => RoleDetail::LootMaster(LootMasterView {
            loot: state.loot.clone(),
            collected_loot: state.collected_items().cloned().collect(),
            map_size: map_size(state),
            score: state.score,
        }),
        Role::AlarmController => RoleDetail::AlarmController(AlarmControllerView {
            alarm: state.alarm.clone(),
            events: state.events.recent(ALARM_FEED_LEN),
            stats: state.stats.clone(),
        }),
    }
}

/// Build the view one role is allowed to see at `now`
pub fn project(state: &MatchState, role: Role, now: u64, sounds: &[SoundEvent]) -> RoleView {
    let timer = state.abilities.get(role);
    let mut ability = BTreeMap::new();
    ability.insert(AbilityKind::for_role(role).name(), timer.view(now));

    let terminal = !state.is_playing();

    RoleView {
        status: state.status,
        tick: state.tick,
        map_id: state.map_id,
        difficulty: state.difficulty,
        role,
        detail: detail_for(state, role, now),
        ability,
        sound_events: sounds.to_vec(),
        final_score: if terminal {
            state.final_score.clone()
        } else {
            None
        },
        loss_reason: if terminal {
            state.loss_reason.clone()
        } else {
            None
        },
    }
}

/// Drain the sound queue once and project it for every listed role
pub fn project_batch(
    state: &mut MatchState,
    roles: impl IntoIterator<Item = Role>,
    now: u64,
) -> Vec<(Role, RoleView)> {
    let sounds = state.drain_sounds();
    roles
        .into_iter()
        .map(|role| (role, project(state, role, now, &sounds)))
        .collect()
}
