//! Authoritative match state (owned by the match simulator)

use std::collections::VecDeque;

use serde::Serialize;

use super::abilities::Abilities;
use super::cameras::normalize_degrees;
use super::layout::{
    build_layout, Difficulty, DifficultyTuning, Facing, Grid, LootKind, Position,
};

/// Events kept in the match log
pub const EVENT_LOG_CAPACITY: usize = 50;
/// Upper bound of the alarm meter
pub const ALARM_MAX_LEVEL: f64 = 100.0;

/// Match outcome status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Playing,
    Won,
    Lost,
}

/// A security camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub id: usize,
    pub position: Position,
    /// Base direction the camera was mounted with
    pub facing: Facing,
    pub rotates: bool,
    /// Sweep angle, kept inside [min_angle, max_angle] without wrapping
    pub angle: f64,
    pub fov_angle: f64,
    pub fov_range: f64,
    pub rotation_speed: f64,
    pub rotation_direction: i8,
    pub min_angle: f64,
    pub max_angle: f64,
    pub disabled: bool,
    pub disabled_until: u64,
}

impl Camera {
    /// Current facing in [0, 360)
    pub fn facing_degrees(&self) -> f64 {
        normalize_degrees(self.angle)
    }

    /// Whether the camera is switched off at `now`
    pub fn is_disabled_at(&self, now: u64) -> bool {
        self.disabled && self.disabled_until > now
    }
}

/// A piece of loot on the map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loot {
    pub id: usize,
    #[serde(flatten)]
    pub position: Position,
    #[serde(rename = "type")]
    pub kind: LootKind,
    pub value: u32,
    pub collected: bool,
    pub pinged: bool,
    pub ping_until: u64,
}

impl Loot {
    pub fn is_pinged_at(&self, now: u64) -> bool {
        self.pinged && self.ping_until > now
    }
}

/// Alarm meter and match countdown
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub level: f64,
    pub max_level: f64,
    /// Seconds left on the clock
    pub countdown: u32,
    pub start_countdown: u32,
}

impl Alarm {
    fn new(countdown: u32) -> Self {
        Self {
            level: 0.0,
            max_level: ALARM_MAX_LEVEL,
            countdown,
            start_countdown: countdown,
        }
    }

    /// Raise the level, clamped to the max. Returns the amount applied.
    pub fn raise(&mut self, amount: f64) -> f64 {
        let before = self.level;
        self.level = (self.level + amount).min(self.max_level);
        self.level - before
    }

    /// Lower the level, floored at zero. Returns the amount applied.
    pub fn lower(&mut self, amount: f64) -> f64 {
        let before = self.level;
        self.level = (self.level - amount).max(0.0);
        before - self.level
    }

    pub fn is_maxed(&self) -> bool {
        self.level >= self.max_level
    }

    /// Seconds elapsed since the heist started
    pub fn elapsed(&self) -> u32 {
        self.start_countdown.saturating_sub(self.countdown)
    }
}

/// Narrative entry severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Info,
    Success,
    Warning,
    Danger,
}

/// One entry of the match narrative
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    pub timestamp: u64,
    pub tick: u64,
}

/// Bounded narrative log, oldest entries fall off first
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

impl EventLog {
    pub fn push(&mut self, kind: EventKind, message: String, timestamp: u64, tick: u64) {
        self.entries.push_back(LogEntry {
            id: self.next_id,
            kind,
            message,
            timestamp,
            tick,
        });
        self.next_id += 1;
        while self.entries.len() > EVENT_LOG_CAPACITY {
            self.entries.pop_front();
        }
    }

    /// Up to `n` most recent entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}

/// Running counters, read at scoring time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStats {
    pub times_detected: u32,
    pub close_call_count: u32,
    pub peak_alarm: f64,
    pub movement_count: u32,
}

/// Audio cue tags consumed by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundKind {
    GameStart,
    Warning,
    WarningUrgent,
    AlarmCritical,
    Bump,
    Footstep,
    Detected,
    CloseCall,
    LootPickup,
    AlarmSpike,
    AlertEscalate,
    AbilityActivate,
    CameraDisable,
    Ping,
    AlarmSilence,
    Victory,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundEvent {
    #[serde(rename = "type")]
    pub kind: SoundKind,
    pub timestamp: u64,
}

/// Score breakdown computed once at the end of a match
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub loot_score: u32,
    pub time_bonus: u32,
    pub stealth_bonus: u32,
    pub close_call_bonus: u32,
    pub difficulty_multiplier: f64,
    pub total: u64,
    pub stars: u8,
    pub time_used: u32,
    pub loot_collected: usize,
    pub total_loot: usize,
    pub times_detected: u32,
    pub peak_alarm: f64,
}

/// Countdown values that fire a time warning, most relaxed first
pub const TIME_WARNING_THRESHOLDS: [u32; 3] = [60, 30, 10];

/// Full authoritative state of one heist
#[derive(Debug, Clone)]
pub struct MatchState {
    pub map_id: &'static str,
    pub difficulty: Difficulty,
    pub tuning: DifficultyTuning,
    pub grid: Grid,
    pub player: Position,
    pub entry: Position,
    pub exit: Position,
    pub cameras: Vec<Camera>,
    pub loot: Vec<Loot>,
    /// Loot ids in pickup order
    pub collected_loot: Vec<usize>,
    pub alarm: Alarm,
    pub abilities: Abilities,
    pub events: EventLog,
    pub stats: MatchStats,
    pub status: MatchStatus,
    pub loss_reason: Option<String>,
    pub score: u32,
    pub tick: u64,
    pub final_score: Option<FinalScore>,
    /// Which entries of TIME_WARNING_THRESHOLDS already fired
    pub time_warnings_fired: [bool; 3],
    pending_sounds: Vec<SoundEvent>,
}

impl MatchState {
    pub fn new(map_id: &str, difficulty: Difficulty) -> Self {
        let layout = build_layout(map_id, difficulty);

        let cameras = layout
            .cameras
            .into_iter()
            .enumerate()
            .map(|(id, spawn)| Camera {
                id,
                position: spawn.position,
                facing: spawn.facing,
                rotates: spawn.rotates,
                angle: spawn.facing.degrees(),
                fov_angle: spawn.fov_angle,
                fov_range: spawn.fov_range,
                rotation_speed: spawn.rotation_speed,
                rotation_direction: 1,
                min_angle: spawn.min_angle,
                max_angle: spawn.max_angle,
                disabled: false,
                disabled_until: 0,
            })
            .collect();

        let loot = layout
            .loot
            .into_iter()
            .enumerate()
            .map(|(id, spawn)| Loot {
                id,
                position: spawn.position,
                kind: spawn.kind,
                value: spawn.kind.value(),
                collected: false,
                pinged: false,
                ping_until: 0,
            })
            .collect();

        Self {
            map_id: layout.map_id,
            difficulty,
            tuning: layout.tuning,
            grid: layout.grid,
            player: layout.entry,
            entry: layout.entry,
            exit: layout.exit,
            cameras,
            loot,
            collected_loot: Vec::new(),
            alarm: Alarm::new(layout.tuning.countdown_seconds),
            abilities: Abilities::default(),
            events: EventLog::default(),
            stats: MatchStats::default(),
            status: MatchStatus::Playing,
            loss_reason: None,
            score: 0,
            tick: 0,
            final_score: None,
            time_warnings_fired: [false; 3],
            pending_sounds: Vec::new(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == MatchStatus::Playing
    }

    pub fn add_event(&mut self, kind: EventKind, message: impl Into<String>, now: u64) {
        self.events.push(kind, message.into(), now, self.tick);
    }

    pub fn add_sound(&mut self, kind: SoundKind, now: u64) {
        self.pending_sounds.push(SoundEvent {
            kind,
            timestamp: now,
        });
    }

    /// Take every queued sound cue, leaving the queue empty
    pub fn drain_sounds(&mut self) -> Vec<SoundEvent> {
        std::mem::take(&mut self.pending_sounds)
    }

    #[cfg(test)]
    pub fn pending_sounds(&self) -> &[SoundEvent] {
        &self.pending_sounds
    }

    pub fn collected_count(&self) -> usize {
        self.collected_loot.len()
    }

    pub fn collected_items(&self) -> impl Iterator<Item = &Loot> {
        self.collected_loot.iter().filter_map(|&id| self.loot.get(id))
    }

    pub fn total_loot_value(&self) -> u32 {
        self.loot.iter().map(|l| l.value).sum()
    }

    /// Score breakdown for the current state. Pure: reads stored state only.
    pub fn calculate_final_score(&self) -> FinalScore {
        let loot_score = self.score;
        let time_bonus = self.alarm.countdown * 2;
        let stealth_bonus = 100u32.saturating_sub(self.stats.times_detected * 20);
        let close_call_bonus = self.stats.close_call_count * 10;
        let difficulty_multiplier = self.difficulty.score_multiplier();

        let subtotal = loot_score + time_bonus + stealth_bonus + close_call_bonus;
        let total = (f64::from(subtotal) * difficulty_multiplier).floor() as u64;

        let max_loot = self.total_loot_value();
        let loot_ratio = if max_loot == 0 {
            0.0
        } else {
            f64::from(loot_score) / f64::from(max_loot)
        };
        let detected = self.stats.times_detected;
        let stars = if loot_ratio >= 0.9 && detected <= 2 {
            3
        } else if loot_ratio >= 0.6 && detected <= 5 {
            2
        } else {
            1
        };

        FinalScore {
            loot_score,
            time_bonus,
            stealth_bonus,
            close_call_bonus,
            difficulty_multiplier,
            total,
            stars,
            time_used: self.alarm.elapsed(),
            loot_collected: self.collected_count(),
            total_loot: self.loot.len(),
            times_detected: detected,
            peak_alarm: self.stats.peak_alarm,
        }
    }
}
