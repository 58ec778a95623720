//! Role abilities: timers, availability and their effect on match state
//!
//! Every timer is an absolute expiry timestamp (unix millis) compared against
//! a sampled `now`; nothing is decremented per tick.

use serde::{Deserialize, Serialize};

use super::state::{EventKind, MatchState, SoundKind};
use super::Role;

/// Alarm points removed by a silence
pub const SILENCE_REDUCTION: f64 = 25.0;

/// The one ability each role carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbilityKind {
    Peek,
    DisableCamera,
    PingLoot,
    SilenceAlarm,
}

impl AbilityKind {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Navigator => AbilityKind::Peek,
            Role::Security => AbilityKind::DisableCamera,
            Role::LootMaster => AbilityKind::PingLoot,
            Role::AlarmController => AbilityKind::SilenceAlarm,
        }
    }

    /// Wire name, as sent by clients
    pub fn name(&self) -> &'static str {
        match self {
            AbilityKind::Peek => "peek",
            AbilityKind::DisableCamera => "disableCamera",
            AbilityKind::PingLoot => "pingLoot",
            AbilityKind::SilenceAlarm => "silenceAlarm",
        }
    }

    /// How long the effect lasts, in millis
    pub fn duration_ms(&self) -> u64 {
        match self {
            AbilityKind::Peek => 5_000,
            AbilityKind::DisableCamera => 10_000,
            AbilityKind::PingLoot => 8_000,
            AbilityKind::SilenceAlarm => 0,
        }
    }

    pub fn cooldown_ms(&self) -> u64 {
        match self {
            AbilityKind::Peek => 30_000,
            AbilityKind::DisableCamera => 45_000,
            AbilityKind::PingLoot => 20_000,
            AbilityKind::SilenceAlarm => 60_000,
        }
    }

    /// Resolve a wire name for the given role. Another role's ability is
    /// unknown to this one.
    pub fn resolve(role: Role, name: &str) -> Option<Self> {
        let kind = Self::for_role(role);
        (kind.name() == name).then_some(kind)
    }
}

/// Target parameters of an ability request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityParams {
    /// Anything but a non-negative integer reads as no target
    #[serde(default, deserialize_with = "super::lenient")]
    pub camera_id: Option<usize>,
    #[serde(default, deserialize_with = "super::lenient")]
    pub loot_id: Option<usize>,
}

/// Ability failures. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbilityError {
    #[error("Unknown ability")]
    UnknownAbility,

    #[error("Ability on cooldown")]
    OnCooldown,

    #[error("Invalid camera ID")]
    InvalidCamera,

    #[error("Invalid loot ID")]
    InvalidLoot,

    #[error("Loot already collected")]
    LootCollected,
}

/// Cooldown and activity window of one ability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityTimer {
    pub kind: AbilityKind,
    pub cooldown_end: u64,
    pub active: bool,
    pub active_until: u64,
}

impl AbilityTimer {
    fn new(kind: AbilityKind) -> Self {
        Self {
            kind,
            cooldown_end: 0,
            active: false,
            active_until: 0,
        }
    }

    pub fn is_ready(&self, now: u64) -> bool {
        now >= self.cooldown_end
    }

    pub fn is_active(&self, now: u64) -> bool {
        self.active && self.active_until > now
    }

    fn start_cooldown(&mut self, now: u64) {
        self.cooldown_end = now + self.kind.cooldown_ms();
    }

    fn activate(&mut self, now: u64) {
        self.active = true;
        self.active_until = now + self.kind.duration_ms();
    }

    pub fn view(&self, now: u64) -> AbilityView {
        AbilityView {
            available: self.is_ready(now),
            cooldown_remaining: ceil_secs(self.cooldown_end.saturating_sub(now)),
            active: self.is_active(now),
            active_remaining: ceil_secs(self.active_until.saturating_sub(now)),
        }
    }
}

fn ceil_secs(millis: u64) -> u64 {
    millis.div_ceil(1000)
}

/// Client-facing ability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityView {
    pub available: bool,
    pub cooldown_remaining: u64,
    pub active: bool,
    pub active_remaining: u64,
}

/// Per-role ability timers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abilities {
    timers: [AbilityTimer; 4],
}

impl Default for Abilities {
    fn default() -> Self {
        Self {
            timers: Role::ALL.map(|role| AbilityTimer::new(AbilityKind::for_role(role))),
        }
    }
}

impl Abilities {
    fn index(role: Role) -> usize {
        match role {
            Role::Navigator => 0,
            Role::Security => 1,
            Role::LootMaster => 2,
            Role::AlarmController => 3,
        }
    }

    pub fn get(&self, role: Role) -> &AbilityTimer {
        &self.timers[Self::index(role)]
    }

    pub fn get_mut(&mut self, role: Role) -> &mut AbilityTimer {
        &mut self.timers[Self::index(role)]
    }
}

/// Run an ability against the match. Validation happens before any write,
/// so a failure leaves the state untouched.
pub fn execute(
    state: &mut MatchState,
    role: Role,
    name: &str,
    params: &AbilityParams,
    now: u64,
) -> Result<AbilityKind, AbilityError> {
    let kind = AbilityKind::resolve(role, name).ok_or(AbilityError::UnknownAbility)?;

    if !state.abilities.get(role).is_ready(now) {
        return Err(AbilityError::OnCooldown);
    }

    match kind {
        AbilityKind::Peek => {
            let timer = state.abilities.get_mut(role);
            timer.activate(now);
            timer.start_cooldown(now);
            state.add_event(EventKind::Info, "Navigator activated Peek!", now);
            state.add_sound(SoundKind::AbilityActivate, now);
        }
        AbilityKind::DisableCamera => {
            let camera_id = params.camera_id.ok_or(AbilityError::InvalidCamera)?;
            let camera = state
                .cameras
                .get_mut(camera_id)
                .ok_or(AbilityError::InvalidCamera)?;
            camera.disabled = true;
            camera.disabled_until = now + kind.duration_ms();
            state.abilities.get_mut(role).start_cooldown(now);
            state.add_event(
                EventKind::Success,
                format!(
                    "Camera {} disabled for {} seconds!",
                    camera_id + 1,
                    kind.duration_ms() / 1000
                ),
                now,
            );
            state.add_sound(SoundKind::CameraDisable, now);
        }
        AbilityKind::PingLoot => {
            let loot_id = params.loot_id.ok_or(AbilityError::InvalidLoot)?;
            let loot = state.loot.get_mut(loot_id).ok_or(AbilityError::InvalidLoot)?;
            if loot.collected {
                return Err(AbilityError::LootCollected);
            }
            loot.pinged = true;
            loot.ping_until = now + kind.duration_ms();
            let loot_type = loot.kind.as_str();
            state.abilities.get_mut(role).start_cooldown(now);
            state.add_event(
                EventKind::Info,
                format!("Loot Master pinged {loot_type} location!"),
                now,
            );
            state.add_sound(SoundKind::Ping, now);
        }
        AbilityKind::SilenceAlarm => {
            let reduced = state.alarm.lower(SILENCE_REDUCTION.min(state.alarm.level));
            state.abilities.get_mut(role).start_cooldown(now);
            state.add_event(
                EventKind::Success,
                format!("Alarm silenced! Reduced by {reduced}%"),
                now,
            );
            state.add_sound(SoundKind::AlarmSilence, now);
        }
    }

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::layout::Difficulty;

    const NOW: u64 = 1_000_000;

    fn fresh() -> MatchState {
        MatchState::new("museum", Difficulty::Medium)
    }

    #[test]
    fn peek_activates_then_cools_down() {
        let mut state = fresh();
        let kind = execute(&mut state, Role::Navigator, "peek", &AbilityParams::default(), NOW);
        assert_eq!(kind, Ok(AbilityKind::Peek));

        let view = state.abilities.get(Role::Navigator).view(NOW + 1_000);
        assert!(view.active);
        assert_eq!(view.active_remaining, 4);
        assert!(!view.available);
        assert_eq!(view.cooldown_remaining, 29);

        let later = state.abilities.get(Role::Navigator).view(NOW + 30_000);
        assert!(!later.active);
        assert!(later.available);
        assert_eq!(state.pending_sounds().len(), 1);
    }

    #[test]
    fn ability_on_cooldown_changes_nothing() {
        let mut state = fresh();
        execute(&mut state, Role::AlarmController, "silenceAlarm", &AbilityParams::default(), NOW)
            .unwrap();
        state.drain_sounds();
        state.alarm.level = 50.0;
        let events_before = state.events.len();

        let result = execute(
            &mut state,
            Role::AlarmController,
            "silenceAlarm",
            &AbilityParams::default(),
            NOW + 59_999,
        );
        assert_eq!(result, Err(AbilityError::OnCooldown));
        assert_eq!(state.alarm.level, 50.0);
        assert_eq!(state.events.len(), events_before);
        assert!(state.pending_sounds().is_empty());
    }

    #[test]
    fn silence_never_goes_negative() {
        let mut state = fresh();
        state.alarm.level = 10.0;
        execute(&mut state, Role::AlarmController, "silenceAlarm", &AbilityParams::default(), NOW)
            .unwrap();
        assert_eq!(state.alarm.level, 0.0);
        assert_eq!(
            state.events.last().map(|e| e.message.as_str()),
            Some("Alarm silenced! Reduced by 10%")
        );
    }

    #[test]
    fn disable_camera_validates_target() {
        let mut state = fresh();
        let bad = AbilityParams {
            camera_id: Some(99),
            loot_id: None,
        };
        assert_eq!(
            execute(&mut state, Role::Security, "disableCamera", &bad, NOW),
            Err(AbilityError::InvalidCamera)
        );
        assert_eq!(
            execute(&mut state, Role::Security, "disableCamera", &AbilityParams::default(), NOW),
            Err(AbilityError::InvalidCamera)
        );
        // A failed attempt does not start the cooldown
        assert!(state.abilities.get(Role::Security).is_ready(NOW));

        let good = AbilityParams {
            camera_id: Some(2),
            loot_id: None,
        };
        execute(&mut state, Role::Security, "disableCamera", &good, NOW).unwrap();
        assert!(state.cameras[2].is_disabled_at(NOW + 9_999));
        assert!(!state.cameras[2].is_disabled_at(NOW + 10_000));
    }

    #[test]
    fn ping_rejects_collected_loot() {
        let mut state = fresh();
        state.loot[1].collected = true;
        let params = AbilityParams {
            camera_id: None,
            loot_id: Some(1),
        };
        assert_eq!(
            execute(&mut state, Role::LootMaster, "pingLoot", &params, NOW),
            Err(AbilityError::LootCollected)
        );

        let params = AbilityParams {
            camera_id: None,
            loot_id: Some(0),
        };
        execute(&mut state, Role::LootMaster, "pingLoot", &params, NOW).unwrap();
        assert!(state.loot[0].is_pinged_at(NOW + 7_999));
        assert!(!state.loot[0].is_pinged_at(NOW + 8_000));
    }

    #[test]
    fn roles_cannot_borrow_abilities() {
        let mut state = fresh();
        assert_eq!(
            execute(&mut state, Role::Navigator, "silenceAlarm", &AbilityParams::default(), NOW),
            Err(AbilityError::UnknownAbility)
        );
        assert_eq!(
            execute(&mut state, Role::Security, "teleport", &AbilityParams::default(), NOW),
            Err(AbilityError::UnknownAbility)
        );
    }
}
