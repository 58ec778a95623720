//! Time utilities for the match simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Simulation tick period. The countdown, decay and escalation schedules are
/// expressed in ticks of this length.
pub const TICK_INTERVAL_MILLIS: u64 = 500;

/// Tick length in seconds, for per-second rates such as camera sweep speed
pub const TICK_SECONDS: f64 = TICK_INTERVAL_MILLIS as f64 / 1000.0;

pub fn tick_interval() -> Duration {
    Duration::from_millis(TICK_INTERVAL_MILLIS)
}
